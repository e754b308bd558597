//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros. The binary
//! exposes the non-model surfaces of the pipeline: indexing, the
//! operational pipeline, ripple queries, and store status. The
//! modification pipeline itself is driven through the library API by
//! whatever session layer binds a language model provider.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// LLM-driven code modification and validation pipeline.
#[derive(Parser, Debug)]
#[command(name = "codefactory-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the vector store database file.
    ///
    /// Defaults to `.codefactory/state.db` in the current directory.
    #[arg(short, long, env = "CODEFACTORY_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Incrementally index a project tree into the vector store.
    Index {
        /// Project root to index.
        root: PathBuf,
    },

    /// Run the operational (SRE) pipeline over a project.
    Ops {
        /// Project root to validate.
        root: PathBuf,
    },

    /// Query ripple risk for a symbol from the indexed project.
    Ripple {
        /// Project root the store was built from.
        root: PathBuf,

        /// Symbol to analyze.
        symbol: String,

        /// Depth bound for the dependency walk.
        #[arg(short, long, default_value = "3")]
        depth: usize,
    },

    /// Show vector store statistics.
    Status {
        /// Project root (used only for display).
        root: Option<PathBuf>,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::storage::DEFAULT_DB_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_db_path() {
        let cli = Cli {
            db_path: None,
            verbose: false,
            format: "text".to_string(),
            command: Commands::Status { root: None },
        };
        assert_eq!(
            cli.get_db_path(),
            PathBuf::from(crate::storage::DEFAULT_DB_PATH)
        );
    }

    #[test]
    fn test_custom_db_path() {
        let cli = Cli {
            db_path: Some(PathBuf::from("/custom/state.db")),
            verbose: false,
            format: "text".to_string(),
            command: Commands::Status { root: None },
        };
        assert_eq!(cli.get_db_path(), PathBuf::from("/custom/state.db"));
    }

    #[test]
    fn test_ripple_defaults() {
        let cli = Cli::try_parse_from(["codefactory-rs", "ripple", ".", "greet"]).unwrap();
        match cli.command {
            Commands::Ripple { depth, symbol, .. } => {
                assert_eq!(depth, 3);
                assert_eq!(symbol, "greet");
            }
            _ => unreachable!("parsed wrong command"),
        }
    }
}
