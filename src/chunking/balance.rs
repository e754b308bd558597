//! Shared brace-balance extent computation.
//!
//! Several strategies (Go, Java, JSX, CSS) delimit a block by walking from
//! an opening brace to its balanced closing brace. The walk lives here so
//! every strategy measures extents the same way.

/// Finds the byte offset one past the brace-balanced block that starts at
/// the first `{` at or after `from`.
///
/// Returns `None` when no opening brace exists at or after `from`. An
/// unbalanced block extends to the end of the content.
#[must_use]
pub fn brace_extent(content: &str, from: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    let open = bytes.iter().skip(from).position(|&b| b == b'{')? + from;

    let mut depth = 1usize;
    let mut idx = open + 1;
    while idx < bytes.len() && depth > 0 {
        match bytes[idx] {
            b'{' => depth += 1,
            b'}' => depth -= 1,
            _ => {}
        }
        idx += 1;
    }
    Some(idx)
}

/// Extends a block end past trailing whitespace and semicolons, the way a
/// declaration reads in source.
#[must_use]
pub fn consume_trailer(content: &str, mut idx: usize) -> usize {
    let bytes = content.as_bytes();
    while idx < bytes.len() && matches!(bytes[idx], b' ' | b'\t' | b'\n' | b';') {
        idx += 1;
    }
    idx
}

/// Returns the 1-based line number containing the byte offset.
#[must_use]
pub fn line_of_offset(content: &str, offset: usize) -> usize {
    let upto = offset.min(content.len());
    content[..upto].bytes().filter(|&b| b == b'\n').count() + 1
}

/// Computes the 1-based inclusive line span covered by a byte range.
///
/// `end` is exclusive; a range ending exactly on a newline does not claim
/// the following line.
#[must_use]
pub fn line_span(content: &str, start: usize, end: usize) -> (usize, usize) {
    let start_line = line_of_offset(content, start);
    let last = end.min(content.len()).saturating_sub(1).max(start);
    let end_line = line_of_offset(content, last);
    (start_line, end_line.max(start_line))
}

/// Finds the byte offset of the start of the line containing `offset`.
#[must_use]
pub fn line_start(content: &str, offset: usize) -> usize {
    let upto = offset.min(content.len());
    content[..upto].rfind('\n').map_or(0, |pos| pos + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brace_extent_simple() {
        let src = "func f() { return 1 }";
        let end = brace_extent(src, 0).unwrap();
        assert_eq!(&src[..end], src);
    }

    #[test]
    fn test_brace_extent_nested() {
        let src = "f() { if x { y } } tail";
        let end = brace_extent(src, 0).unwrap();
        assert_eq!(&src[..end], "f() { if x { y } }");
    }

    #[test]
    fn test_brace_extent_unbalanced_runs_to_end() {
        let src = "f() { if x {";
        let end = brace_extent(src, 0).unwrap();
        assert_eq!(end, src.len());
    }

    #[test]
    fn test_brace_extent_no_brace() {
        assert!(brace_extent("no braces here", 0).is_none());
    }

    #[test]
    fn test_brace_extent_respects_from() {
        let src = "{a} {b}";
        let end = brace_extent(src, 3).unwrap();
        assert_eq!(&src[4..end], "{b}");
    }

    #[test]
    fn test_consume_trailer() {
        let src = "} ;\n\nnext";
        assert_eq!(consume_trailer(src, 1), 5);
    }

    #[test]
    fn test_line_of_offset() {
        let src = "a\nb\nc";
        assert_eq!(line_of_offset(src, 0), 1);
        assert_eq!(line_of_offset(src, 2), 2);
        assert_eq!(line_of_offset(src, 4), 3);
    }

    #[test]
    fn test_line_span_inclusive() {
        let src = "a\nbb\nccc\n";
        // "bb\n" occupies line 2 only.
        let (start, end) = line_span(src, 2, 5);
        assert_eq!((start, end), (2, 2));
        // Whole content spans lines 1-3.
        let (start, end) = line_span(src, 0, src.len());
        assert_eq!((start, end), (1, 3));
    }

    #[test]
    fn test_line_start() {
        let src = "a\nbb\nccc";
        assert_eq!(line_start(src, 0), 0);
        assert_eq!(line_start(src, 3), 2);
        assert_eq!(line_start(src, 7), 5);
    }
}
