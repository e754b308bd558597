//! CLI output formatting.

use crate::error::{Error, Result};
use serde::Serialize;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable key/value lines.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; unknown names fall back to text.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Serializes a value as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map(|s| s + "\n")
        .map_err(|e| Error::InvalidState {
            message: format!("json render: {e}"),
        })
}

/// Renders key/value rows as aligned text lines.
#[must_use]
pub fn render_kv(rows: &[(&str, String)]) -> String {
    let mut out = String::new();
    for (key, value) in rows {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Formats an error for the chosen output format.
#[must_use]
pub fn format_error(err: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::json!({ "error": err.to_string() }).to_string()
        }
        OutputFormat::Text => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("bogus"), OutputFormat::Text);
    }

    #[test]
    fn test_render_kv() {
        let out = render_kv(&[("a", "1".to_string()), ("b", "two".to_string())]);
        assert_eq!(out, "a: 1\nb: two\n");
    }

    #[test]
    fn test_render_json() {
        #[derive(Serialize)]
        struct Row {
            count: usize,
        }
        let out = render_json(&Row { count: 3 }).unwrap();
        assert!(out.contains("\"count\": 3"));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_format_error_json() {
        let err = Error::InvalidState {
            message: "boom".to_string(),
        };
        let out = format_error(&err, OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(parsed["error"].as_str().unwrap().contains("boom"));
    }
}
