//! Deterministic unified diff generation.
//!
//! Pure function of the plan payload list: no LLM, no filesystem. Diffs
//! are computed over newline-inclusive line tokens with Myers' algorithm,
//! so identical inputs produce byte-identical output. Context size shrinks
//! as files grow; binary extensions get a single marker line instead of a
//! body.

use crate::core::{FilePayload, ModificationPlan, Patch, PatchSummary};
use similar::{Algorithm, DiffOp, capture_diff_slices, group_diff_ops};
use std::fmt::Write as _;

/// Extensions treated as binary: their payloads diff to one marker line.
pub const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "pdf", "zip", "tar", "gz", "exe", "dll", "so",
    "dylib", "bin", "woff", "woff2", "ttf", "eot", "mp3", "mp4",
];

/// Computes unified diffs from a modification plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffingAdapter;

impl DiffingAdapter {
    /// Creates a diffing adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Context radius for a file, by the larger side's line count.
    #[must_use]
    pub const fn context_radius(max_lines: usize) -> usize {
        if max_lines < 50 {
            3
        } else if max_lines < 200 {
            2
        } else {
            1
        }
    }

    fn is_binary_path(path: &str) -> bool {
        std::path::Path::new(path)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Renders the aggregate patch for a plan.
    ///
    /// Entries carrying an `error` are skipped; no-op entries produce no
    /// section. When nothing produced a diff the patch is empty.
    #[must_use]
    pub fn diff_plan(&self, plan: &ModificationPlan) -> Patch {
        let mut sections = Vec::new();
        let mut summary = PatchSummary::default();

        for payload in plan.effective_payloads() {
            if Self::is_binary_path(&payload.file_path) {
                summary.files_changed += 1;
                sections.push(format!(
                    "# === Binary file {} has been modified ===",
                    payload.file_path
                ));
                continue;
            }
            if let Some((body, insertions, deletions)) = Self::diff_payload(payload) {
                summary.files_changed += 1;
                summary.insertions += insertions;
                summary.deletions += deletions;
                sections.push(body);
            }
        }

        if sections.is_empty() {
            return Patch::default();
        }

        let header = format!(
            "# === Modification Summary: {} file(s) changed, +{}/-{} ===",
            summary.files_changed, summary.insertions, summary.deletions
        );
        let mut unified_diff = header;
        for section in sections {
            unified_diff.push_str("\n\n");
            unified_diff.push_str(&section);
        }
        unified_diff.push('\n');

        Patch {
            unified_diff,
            summary,
        }
    }

    /// Diffs one payload into a per-file section. Returns `None` when the
    /// contents are identical.
    fn diff_payload(payload: &FilePayload) -> Option<(String, usize, usize)> {
        if payload.original == payload.modified {
            return None;
        }

        let old: Vec<&str> = split_keep_newlines(&payload.original);
        let new: Vec<&str> = split_keep_newlines(&payload.modified);
        let radius = Self::context_radius(old.len().max(new.len()));

        let ops = capture_diff_slices(Algorithm::Myers, &old, &new);
        let groups = group_diff_ops(ops, radius);
        if groups.is_empty() {
            return None;
        }

        let mut insertions = 0usize;
        let mut deletions = 0usize;
        let mut hunks = String::new();

        for group in &groups {
            let first = group.first()?;
            let last = group.last()?;
            let old_start = first.old_range().start;
            let old_len = last.old_range().end - old_start;
            let new_start = first.new_range().start;
            let new_len = last.new_range().end - new_start;

            let _ = writeln!(
                hunks,
                "@@ -{},{} +{},{} @@",
                if old_len == 0 { old_start } else { old_start + 1 },
                old_len,
                if new_len == 0 { new_start } else { new_start + 1 },
                new_len,
            );

            for op in group {
                match op {
                    DiffOp::Equal { old_index, len, .. } => {
                        for token in &old[*old_index..old_index + len] {
                            push_diff_line(&mut hunks, ' ', token);
                        }
                    }
                    DiffOp::Delete { old_index, old_len, .. } => {
                        for token in &old[*old_index..old_index + old_len] {
                            push_diff_line(&mut hunks, '-', token);
                            deletions += 1;
                        }
                    }
                    DiffOp::Insert { new_index, new_len, .. } => {
                        for token in &new[*new_index..new_index + new_len] {
                            push_diff_line(&mut hunks, '+', token);
                            insertions += 1;
                        }
                    }
                    DiffOp::Replace {
                        old_index,
                        old_len,
                        new_index,
                        new_len,
                    } => {
                        for token in &old[*old_index..old_index + old_len] {
                            push_diff_line(&mut hunks, '-', token);
                            deletions += 1;
                        }
                        for token in &new[*new_index..new_index + new_len] {
                            push_diff_line(&mut hunks, '+', token);
                            insertions += 1;
                        }
                    }
                }
            }
        }

        let body = format!(
            "# === Diff for {} (+{}/-{}) ===\n--- {}\n+++ {}\n{}",
            payload.file_path,
            insertions,
            deletions,
            payload.file_path,
            payload.file_path,
            hunks.trim_end_matches('\n'),
        );
        Some((body, insertions, deletions))
    }
}

/// Splits content into newline-inclusive tokens; a final line without a
/// trailing newline is kept as its own token.
#[must_use]
pub fn split_keep_newlines(content: &str) -> Vec<&str> {
    if content.is_empty() {
        return Vec::new();
    }
    content.split_inclusive('\n').collect()
}

/// Appends one diff body line, adding the no-newline marker for tokens
/// that do not end with a newline.
fn push_diff_line(out: &mut String, prefix: char, token: &str) {
    out.push(prefix);
    out.push_str(token);
    if !token.ends_with('\n') {
        out.push_str("\n\\ No newline at end of file\n");
    }
}
