//! Command-line interface.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::{OutputFormat, format_error};
pub use parser::{Cli, Commands};
