//! Deterministic changelog rendering.
//!
//! A pure function of the patch text: parses the per-file headers and
//! hunk markers the diffing adapter emits, classifies each file's change
//! by keyword heuristics, and renders a markdown changelog. Never calls
//! the language model.

use crate::core::{DocumentationUpdate, Patch};
use std::fmt::Write as _;

/// Change classifications, rendered in this order.
pub const CHANGE_KINDS: &[&str] = &[
    "feature", "fix", "refactor", "docs", "style", "perf", "test", "build", "other",
];

/// Minimum classified changes before the "by type" section renders.
const BY_TYPE_THRESHOLD: usize = 5;

/// One parsed file change.
#[derive(Debug)]
struct FileChange {
    path: String,
    insertions: usize,
    deletions: usize,
    hunks: usize,
    kind: &'static str,
    binary: bool,
}

/// Renders changelogs from patches.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentationAdapter;

impl DocumentationAdapter {
    /// Creates a documentation adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Renders the changelog for a patch.
    ///
    /// An empty patch renders an explicit "no changes" document so the
    /// artifact is always present.
    #[must_use]
    pub fn render(&self, patch: &Patch) -> DocumentationUpdate {
        if patch.is_empty() {
            return DocumentationUpdate {
                markdown: "# Changelog\n\nNo changes were produced by this request.\n".to_string(),
            };
        }

        let changes = parse_changes(&patch.unified_diff);
        let mut markdown = String::from("# Changelog\n\n");
        let _ = writeln!(
            markdown,
            "{} file(s) changed: +{} insertions, -{} deletions.",
            patch.summary.files_changed, patch.summary.insertions, patch.summary.deletions
        );

        if changes.len() >= BY_TYPE_THRESHOLD {
            markdown.push_str("\n## Changes by Type\n\n");
            for kind in CHANGE_KINDS {
                let count = changes.iter().filter(|c| c.kind == *kind).count();
                if count > 0 {
                    let _ = writeln!(markdown, "- **{kind}**: {count}");
                }
            }
        }

        markdown.push_str("\n## Files\n");
        for change in &changes {
            let _ = write!(markdown, "\n### {}\n\n", change.path);
            if change.binary {
                markdown.push_str("- binary file modified\n");
                continue;
            }
            let _ = writeln!(
                markdown,
                "- {}: {} hunk(s), +{}/-{}",
                change.kind, change.hunks, change.insertions, change.deletions
            );
        }

        DocumentationUpdate { markdown }
    }
}

/// Parses per-file sections out of the aggregate diff text.
fn parse_changes(diff: &str) -> Vec<FileChange> {
    let mut changes: Vec<FileChange> = Vec::new();
    let mut added_lines: Vec<String> = Vec::new();

    let flush_kind = |changes: &mut Vec<FileChange>, added: &mut Vec<String>| {
        if let Some(last) = changes.last_mut()
            && !last.binary
        {
            last.kind = classify(&last.path, added, last.insertions, last.deletions);
        }
        added.clear();
    };

    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("# === Binary file ") {
            flush_kind(&mut changes, &mut added_lines);
            let path = rest
                .strip_suffix(" has been modified ===")
                .unwrap_or(rest)
                .to_string();
            changes.push(FileChange {
                path,
                insertions: 0,
                deletions: 0,
                hunks: 0,
                kind: "other",
                binary: true,
            });
        } else if let Some(rest) = line.strip_prefix("# === Diff for ") {
            flush_kind(&mut changes, &mut added_lines);
            let (path, counts) = rest
                .rsplit_once(" (")
                .map_or((rest, ""), |(p, c)| (p, c));
            let (insertions, deletions) = parse_counts(counts);
            changes.push(FileChange {
                path: path.to_string(),
                insertions,
                deletions,
                hunks: 0,
                kind: "other",
                binary: false,
            });
        } else if line.starts_with("@@") {
            if let Some(last) = changes.last_mut() {
                last.hunks += 1;
            }
        } else if let Some(added) = line.strip_prefix('+') {
            if !added.starts_with("++") {
                added_lines.push(added.to_string());
            }
        }
    }
    flush_kind(&mut changes, &mut added_lines);

    changes
}

/// Parses `+i/-d) ===` from a per-file header.
fn parse_counts(counts: &str) -> (usize, usize) {
    let trimmed = counts.trim_end_matches(" ===").trim_end_matches(')');
    let mut insertions = 0;
    let mut deletions = 0;
    if let Some((plus, minus)) = trimmed.split_once('/') {
        insertions = plus.trim_start_matches('+').parse().unwrap_or(0);
        deletions = minus.trim_start_matches('-').parse().unwrap_or(0);
    }
    (insertions, deletions)
}

/// Classifies one file change from its path and added lines.
fn classify(path: &str, added_lines: &[String], insertions: usize, deletions: usize) -> &'static str {
    let lower_path = path.to_lowercase();
    let file_name = std::path::Path::new(&lower_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if file_name.starts_with("test_")
        || file_name.contains(".test.")
        || file_name.ends_with("_test.go")
        || file_name.ends_with("test.java")
    {
        return "test";
    }
    if file_name == "dockerfile"
        || file_name == "docker-compose.yml"
        || file_name == "requirements.txt"
        || file_name == "package.json"
        || file_name.ends_with(".toml")
        || file_name == ".dockerignore"
    {
        return "build";
    }
    if lower_path.ends_with(".md") || lower_path.ends_with(".rst") {
        return "docs";
    }

    let added = added_lines.join("\n").to_lowercase();
    if added.contains("fix") || added.contains("bug") {
        return "fix";
    }
    if added.contains("cache") || added.contains("optimiz") {
        return "perf";
    }
    if added.contains("assert") || added.contains("unittest") || added.contains("def test_") {
        return "test";
    }
    if insertions > 0 && deletions == 0 {
        return "feature";
    }
    if insertions > 0 && deletions > 0 {
        return "refactor";
    }
    if insertions == 0 && deletions > 0 {
        return "refactor";
    }
    "other"
}
