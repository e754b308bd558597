//! Patch application to the working tree.
//!
//! Parses the aggregate unified diff produced by the diffing adapter and
//! applies it file by file. Hunks are verified against the on-disk
//! content line by line; any mismatch fails the whole request with
//! `PatchApplyFailed` and removes the temporary files already staged.
//! Applying an empty patch is a no-op, so the applier is idempotent for
//! empty diffs. No write ever targets a path outside the project root.

use crate::core::Patch;
use crate::error::{ModifyError, Result};
use crate::modify::resolve_in_root;
use std::path::{Path, PathBuf};

/// One parsed hunk.
struct Hunk {
    old_start: usize,
    old_len: usize,
    lines: Vec<HunkLine>,
}

/// One parsed hunk body line.
enum HunkLine {
    Context(String),
    Delete(String),
    Insert(String),
}

/// One parsed per-file section.
struct FileSection {
    path: String,
    hunks: Vec<Hunk>,
}

/// Applies aggregate patches to the working tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchApplier;

impl PatchApplier {
    /// Creates a patch applier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Applies a patch under `project_root`.
    ///
    /// Returns the project-relative paths written, in patch order.
    ///
    /// # Errors
    ///
    /// Fails with `PathEscape` for targets outside the root and
    /// `PatchApplyFailed` on any context mismatch; staged temporary files
    /// are removed before returning the error.
    pub fn apply(&self, project_root: &Path, patch: &Patch) -> Result<Vec<String>> {
        if patch.is_empty() {
            return Ok(Vec::new());
        }

        let sections = parse_patch(&patch.unified_diff)?;
        let mut written = Vec::new();
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();

        let outcome = (|| -> Result<()> {
            for section in &sections {
                let target = resolve_in_root(project_root, &section.path)?;
                let original = if target.exists() {
                    std::fs::read_to_string(&target).map_err(|e| {
                        ModifyError::PatchApplyFailed {
                            path: section.path.clone(),
                            reason: format!("read failed: {e}"),
                        }
                    })?
                } else {
                    String::new()
                };

                let updated = apply_hunks(&original, &section.hunks, &section.path)?;

                if let Some(parent) = target.parent()
                    && !parent.exists()
                {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ModifyError::PatchApplyFailed {
                            path: section.path.clone(),
                            reason: format!("mkdir failed: {e}"),
                        }
                    })?;
                }

                let temp_name = target
                    .file_name()
                    .map_or_else(|| "patch-tmp".to_string(), |n| {
                        format!("{}.patch-tmp", n.to_string_lossy())
                    });
                let temp = target.with_file_name(temp_name);
                std::fs::write(&temp, &updated).map_err(|e| ModifyError::PatchApplyFailed {
                    path: section.path.clone(),
                    reason: format!("write failed: {e}"),
                })?;
                staged.push((temp, target));
            }

            // All sections verified and staged; commit with renames.
            for (temp, target) in &staged {
                std::fs::rename(temp, target).map_err(|e| ModifyError::PatchApplyFailed {
                    path: target.display().to_string(),
                    reason: format!("rename failed: {e}"),
                })?;
            }
            staged.clear();
            Ok(())
        })();

        match outcome {
            Ok(()) => {
                for section in sections {
                    written.push(section.path);
                }
                Ok(written)
            }
            Err(err) => {
                for (temp, _) in staged {
                    let _ = std::fs::remove_file(temp);
                }
                Err(err)
            }
        }
    }
}

/// Parses the aggregate patch text into per-file sections.
fn parse_patch(diff: &str) -> Result<Vec<FileSection>> {
    let mut sections: Vec<FileSection> = Vec::new();
    let mut lines = diff.lines().peekable();

    while let Some(line) = lines.next() {
        if line.starts_with("# ===") || line.is_empty() {
            continue;
        }
        if let Some(old_path) = line.strip_prefix("--- ") {
            let Some(new_line) = lines.next() else {
                return Err(ModifyError::MalformedPatch("dangling --- header".to_string()).into());
            };
            let Some(new_path) = new_line.strip_prefix("+++ ") else {
                return Err(
                    ModifyError::MalformedPatch(format!("expected +++ after --- {old_path}"))
                        .into(),
                );
            };

            let mut section = FileSection {
                path: new_path.trim().to_string(),
                hunks: Vec::new(),
            };

            while let Some(peek) = lines.peek() {
                if !peek.starts_with("@@") {
                    break;
                }
                let header = lines.next().unwrap_or_default();
                let (old_start, old_len, new_len) = parse_hunk_header(header)?;
                let mut hunk = Hunk {
                    old_start,
                    old_len,
                    lines: Vec::new(),
                };

                // Consume exactly the line counts the header declared, so
                // body lines that begin with '-' or '+' stay unambiguous.
                let mut old_remaining = old_len;
                let mut new_remaining = new_len;
                while old_remaining > 0 || new_remaining > 0 {
                    let Some(line) = lines.next() else {
                        return Err(ModifyError::MalformedPatch(format!(
                            "truncated hunk in {}",
                            section.path
                        ))
                        .into());
                    };
                    let parsed = match line.chars().next() {
                        Some(' ') | None => {
                            old_remaining = old_remaining.saturating_sub(1);
                            new_remaining = new_remaining.saturating_sub(1);
                            HunkLine::Context(line.get(1..).unwrap_or_default().to_string())
                        }
                        Some('-') => {
                            old_remaining = old_remaining.saturating_sub(1);
                            HunkLine::Delete(line[1..].to_string())
                        }
                        Some('+') => {
                            new_remaining = new_remaining.saturating_sub(1);
                            HunkLine::Insert(line[1..].to_string())
                        }
                        _ => {
                            return Err(ModifyError::MalformedPatch(format!(
                                "unexpected hunk line: {line}"
                            ))
                            .into());
                        }
                    };

                    // A no-newline marker amends the line just parsed.
                    let no_newline = lines
                        .peek()
                        .is_some_and(|l| l.starts_with("\\ No newline"));
                    if no_newline {
                        lines.next();
                    }
                    hunk.lines.push(finish_line(parsed, no_newline));
                }
                section.hunks.push(hunk);
            }
            sections.push(section);
        }
    }

    Ok(sections)
}

/// Re-attaches the implicit newline unless the marker said otherwise.
fn finish_line(line: HunkLine, no_newline: bool) -> HunkLine {
    let attach = |mut text: String| {
        if !no_newline {
            text.push('\n');
        }
        text
    };
    match line {
        HunkLine::Context(text) => HunkLine::Context(attach(text)),
        HunkLine::Delete(text) => HunkLine::Delete(attach(text)),
        HunkLine::Insert(text) => HunkLine::Insert(attach(text)),
    }
}

/// Parses `@@ -a,b +c,d @@` into (old start, old length, new length).
fn parse_hunk_header(header: &str) -> Result<(usize, usize, usize)> {
    let malformed = || ModifyError::MalformedPatch(format!("bad hunk header: {header}"));
    let mut parts = header.split_whitespace();
    let old = parts
        .nth(1)
        .and_then(|part| part.strip_prefix('-'))
        .ok_or_else(malformed)?;
    let new = parts
        .next()
        .and_then(|part| part.strip_prefix('+'))
        .ok_or_else(malformed)?;

    let parse_range = |range: &str| -> Result<(usize, usize)> {
        let (start, len) = range.split_once(',').ok_or_else(malformed)?;
        Ok((
            start.parse().map_err(|_| malformed())?,
            len.parse().map_err(|_| malformed())?,
        ))
    };
    let (old_start, old_len) = parse_range(old)?;
    let (_, new_len) = parse_range(new)?;
    Ok((old_start, old_len, new_len))
}

/// Applies a file's hunks to its original content.
fn apply_hunks(original: &str, hunks: &[Hunk], path: &str) -> Result<String> {
    let tokens: Vec<&str> = crate::modify::diffing::split_keep_newlines(original);
    let mut output = String::with_capacity(original.len());
    let mut cursor = 0usize;

    for hunk in hunks {
        // Header starts are 1-based for non-empty ranges, insertion points
        // for empty ones.
        let position = if hunk.old_len == 0 {
            hunk.old_start
        } else {
            hunk.old_start.saturating_sub(1)
        };
        if position < cursor || position > tokens.len() {
            return Err(ModifyError::PatchApplyFailed {
                path: path.to_string(),
                reason: format!("hunk at line {} out of order", hunk.old_start),
            }
            .into());
        }
        for token in &tokens[cursor..position] {
            output.push_str(token);
        }
        cursor = position;

        for line in &hunk.lines {
            match line {
                HunkLine::Context(expected) | HunkLine::Delete(expected) => {
                    let actual = tokens.get(cursor).copied().unwrap_or_default();
                    if actual != expected {
                        return Err(ModifyError::PatchApplyFailed {
                            path: path.to_string(),
                            reason: format!(
                                "context mismatch at line {}: expected {expected:?}, found {actual:?}",
                                cursor + 1
                            ),
                        }
                        .into());
                    }
                    if matches!(line, HunkLine::Context(_)) {
                        output.push_str(actual);
                    }
                    cursor += 1;
                }
                HunkLine::Insert(text) => output.push_str(text),
            }
        }
    }

    for token in &tokens[cursor..] {
        output.push_str(token);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FilePayload, ModificationPlan};
    use crate::modify::diffing::DiffingAdapter;
    use std::fs;

    fn diff_for(path: &str, original: &str, modified: &str) -> Patch {
        DiffingAdapter::new().diff_plan(&ModificationPlan {
            payloads: vec![FilePayload::new(
                path,
                original.to_string(),
                modified.to_string(),
            )],
        })
    }

    #[test]
    fn test_apply_creates_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let patch = diff_for("utils/math.py", "", "def square(x):\n    return x * x\n");

        let written = PatchApplier::new().apply(dir.path(), &patch).unwrap();
        assert_eq!(written, vec!["utils/math.py".to_string()]);

        let content = fs::read_to_string(dir.path().join("utils/math.py")).unwrap();
        assert!(content.contains("def square"));
    }

    #[test]
    fn test_round_trip_matches_modified_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let original = "def greet(name):\n    return f\"Hello, {name}!\"\n";
        let modified = "def greet(name, title=None):\n    if title:\n        return f\"Hello, {title} {name}!\"\n    return f\"Hello, {name}!\"\n";
        fs::write(dir.path().join("module.py"), original).unwrap();

        let patch = diff_for("module.py", original, modified);
        PatchApplier::new().apply(dir.path(), &patch).unwrap();

        let content = fs::read_to_string(dir.path().join("module.py")).unwrap();
        assert_eq!(content, modified);
    }

    #[test]
    fn test_round_trip_without_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let original = "alpha\nbeta";
        let modified = "alpha\ngamma";
        fs::write(dir.path().join("f.txt"), original).unwrap();

        let patch = diff_for("f.txt", original, modified);
        PatchApplier::new().apply(dir.path(), &patch).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("f.txt")).unwrap(), modified);
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let written = PatchApplier::new()
            .apply(dir.path(), &Patch::default())
            .unwrap();
        assert!(written.is_empty());
    }

    #[test]
    fn test_context_mismatch_fails_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let original = "line one\nline two\n";
        fs::write(dir.path().join("f.txt"), "entirely different\n").unwrap();

        let patch = diff_for("f.txt", original, "line one\nline 2\n");
        let err = PatchApplier::new().apply(dir.path(), &patch).unwrap_err();
        assert!(err.to_string().contains("patch apply failed"));

        // No temp file left behind and the target is untouched.
        assert!(!dir.path().join("f.txt.patch-tmp").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("f.txt")).unwrap(),
            "entirely different\n"
        );
    }

    #[test]
    fn test_path_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let patch = diff_for("../outside.txt", "", "escaped\n");
        let err = PatchApplier::new().apply(dir.path(), &patch).unwrap_err();
        assert!(err.to_string().contains("escapes project root"));
    }

    #[test]
    fn test_multi_file_patch_applies_all() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();

        let plan = ModificationPlan {
            payloads: vec![
                FilePayload::new("a.py", "x = 1\n".to_string(), "x = 2\n".to_string()),
                FilePayload::new("b.py", String::new(), "y = 3\n".to_string()),
            ],
        };
        let patch = DiffingAdapter::new().diff_plan(&plan);
        let written = PatchApplier::new().apply(dir.path(), &patch).unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(fs::read_to_string(dir.path().join("a.py")).unwrap(), "x = 2\n");
        assert_eq!(fs::read_to_string(dir.path().join("b.py")).unwrap(), "y = 3\n");
    }

    #[test]
    fn test_middle_of_file_modification() {
        let dir = tempfile::tempdir().unwrap();
        let original: String = (1..=20).map(|i| format!("line {i}\n")).collect();
        let modified = original.replace("line 10\n", "line ten\n");
        fs::write(dir.path().join("long.txt"), &original).unwrap();

        let patch = diff_for("long.txt", &original, &modified);
        PatchApplier::new().apply(dir.path(), &patch).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("long.txt")).unwrap(),
            modified
        );
    }
}
