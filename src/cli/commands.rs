//! CLI command execution.
//!
//! Each command opens the vector store, runs the corresponding library
//! surface, and renders the result in the requested output format.

use crate::cli::output::{OutputFormat, render_json, render_kv};
use crate::cli::parser::{Cli, Commands};
use crate::embedding::{DEFAULT_DIMENSIONS, create_embedder};
use crate::error::Result;
use crate::graph::SemanticGraph;
use crate::index::{IncrementalIndexer, IndexerConfig};
use crate::sre::SreLead;
use crate::storage::{SqliteStore, VectorStore};

/// Executes a parsed CLI invocation and returns the rendered output.
///
/// # Errors
///
/// Returns an error when the command fails; the binary maps it to a
/// non-zero exit code.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Index { root } => {
            let mut store = SqliteStore::open(cli.get_db_path(), DEFAULT_DIMENSIONS)?;
            store.init()?;
            let embedder = create_embedder();
            let indexer = IncrementalIndexer::new(root.clone(), IndexerConfig::default());
            let report = indexer.index_project(&mut store, embedder.as_ref())?;

            match format {
                OutputFormat::Json => render_json(&report),
                OutputFormat::Text => Ok(render_kv(&[
                    ("files checked", report.files_checked.to_string()),
                    ("files indexed", report.files_indexed.to_string()),
                    ("files unchanged", report.files_unchanged.to_string()),
                    ("files skipped", report.files_skipped.to_string()),
                    ("chunks indexed", report.chunks_indexed.to_string()),
                    ("errors", report.errors.len().to_string()),
                ])),
            }
        }

        Commands::Ops { root } => {
            let lead = SreLead::probe();
            let report = lead.validate_changes(root)?;

            match format {
                OutputFormat::Json => render_json(&report),
                OutputFormat::Text => {
                    let mut rows = vec![
                        ("operational score", report.summary.operational_score.clone()),
                        (
                            "deployment ready",
                            report.summary.deployment_ready.to_string(),
                        ),
                        ("docker ready", report.summary.docker_ready.to_string()),
                        ("total issues", report.summary.total_issues.to_string()),
                    ];
                    for issue in &report.issues {
                        rows.push(("issue", issue.clone()));
                    }
                    Ok(render_kv(&rows))
                }
            }
        }

        Commands::Ripple {
            root: _,
            symbol,
            depth,
        } => {
            let mut store = SqliteStore::open(cli.get_db_path(), DEFAULT_DIMENSIONS)?;
            store.init()?;
            let graph = SemanticGraph::from_store(&store)?;
            let entries = graph.ripple_risk(&[symbol.clone()], *depth);

            match format {
                OutputFormat::Json => render_json(&entries),
                OutputFormat::Text => {
                    if entries.is_empty() {
                        return Ok(format!("no dependents of {symbol} within depth {depth}\n"));
                    }
                    let rows: Vec<(&str, String)> = entries
                        .iter()
                        .map(|e| {
                            (
                                e.symbol.as_str(),
                                format!("{} ({})", e.risk_level, e.reason),
                            )
                        })
                        .collect();
                    Ok(render_kv(&rows))
                }
            }
        }

        Commands::Status { root } => {
            let mut store = SqliteStore::open(cli.get_db_path(), DEFAULT_DIMENSIONS)?;
            store.init()?;
            let stats = store.stats()?;

            match format {
                OutputFormat::Json => render_json(&stats),
                OutputFormat::Text => {
                    let mut rows = Vec::new();
                    if let Some(root) = root {
                        rows.push(("project", root.display().to_string()));
                    }
                    rows.push(("chunks", stats.chunk_count.to_string()));
                    rows.push(("knowledge chunks", stats.knowledge_count.to_string()));
                    rows.push(("files tracked", stats.file_count.to_string()));
                    rows.push(("vector dimensions", stats.dimensions.to_string()));
                    Ok(render_kv(&rows))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn cli_for(dir: &std::path::Path, command: Commands) -> Cli {
        Cli {
            db_path: Some(dir.join("state.db")),
            verbose: false,
            format: "text".to_string(),
            command,
        }
    }

    #[test]
    fn test_index_command_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("proj");
        fs::create_dir(&project).unwrap();
        fs::write(project.join("app.py"), "def f():\n    return 1\n").unwrap();

        let cli = cli_for(dir.path(), Commands::Index { root: project });
        let output = execute(&cli).unwrap();
        assert!(output.contains("files indexed: 1"));
    }

    #[test]
    fn test_status_command_after_index() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("proj");
        fs::create_dir(&project).unwrap();
        fs::write(project.join("app.py"), "def f():\n    return 1\n").unwrap();

        execute(&cli_for(
            dir.path(),
            Commands::Index {
                root: project.clone(),
            },
        ))
        .unwrap();
        let output = execute(&cli_for(dir.path(), Commands::Status { root: None })).unwrap();
        assert!(output.contains("files tracked: 1"));
    }

    #[test]
    fn test_ripple_command_no_dependents() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("proj");
        fs::create_dir(&project).unwrap();

        // Empty store: the query answers cleanly.
        let cli = cli_for(
            dir.path(),
            Commands::Ripple {
                root: project,
                symbol: "ghost".to_string(),
                depth: 2,
            },
        );
        let output = execute(&cli).unwrap();
        assert!(output.contains("no dependents"));
    }

    #[test]
    fn test_json_format() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("proj");
        fs::create_dir(&project).unwrap();
        fs::write(project.join("app.py"), "x = 1\n").unwrap();

        let mut cli = cli_for(
            dir.path(),
            Commands::Index {
                root: project.clone(),
            },
        );
        cli.format = "json".to_string();
        let output = execute(&cli).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["files_indexed"], 1);
    }
}
