//! Multi-language unit test generation.
//!
//! For each supported source file, extracts its function or method names
//! (structural scan for Python, regexes elsewhere), asks the language
//! model for one test per symbol, strips markdown fences, and
//! consolidates everything into a single test file at the conventional
//! path for the language. Python consolidation leaves exactly one
//! `unittest.main()` block at the file end. Existing test files are
//! never regenerated.

use crate::llm::{LanguageModel, strip_code_fences};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Per-language prompt templates, `{func}` and `{module}` substituted.
fn template_for(language: &str) -> &'static str {
    match language {
        "python" => {
            "Write a Python unittest test method class for `{func}` from module `{module}`. \
             Use unittest.TestCase."
        }
        "typescript" | "javascript" => {
            "Write a vitest test for `{func}` exported from `{module}`."
        }
        "go" => "Write a Go test function for `{func}` in package `{module}`.",
        "java" => "Generate a JUnit 5 test method for `{func}` in class `{module}`.",
        _ => "Generate a test for `{func}` from `{module}`.",
    }
}

/// Generates per-language unit tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestGenerator;

impl TestGenerator {
    /// Creates a test generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Generates test files for every supported source in the map.
    ///
    /// Returns only the new test files: path to content. Test files and
    /// unsupported languages are skipped.
    #[must_use]
    pub fn generate(
        &self,
        code_map: &BTreeMap<String, String>,
        model: &dyn LanguageModel,
    ) -> BTreeMap<String, String> {
        let mut generated = BTreeMap::new();

        for (path, content) in code_map {
            if is_test_file(path) {
                tracing::debug!(%path, "skipping existing test file");
                continue;
            }
            let Some(language) = language_for(path) else {
                continue;
            };
            let functions = extract_functions(content, language);
            if functions.is_empty() {
                continue;
            }
            tracing::info!(%path, count = functions.len(), "generating tests");

            let module = std::path::Path::new(path)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();

            let mut parts = Vec::new();
            for function in &functions {
                let template = template_for(language);
                let prompt = format!(
                    "Source code from {path}:\n```{language}\n{content}\n```\n\n{}",
                    template
                        .replace("{func}", function)
                        .replace("{module}", &module),
                );
                match model.ask(&prompt) {
                    Ok(reply) => {
                        let cleaned = strip_code_fences(&reply.text);
                        if !cleaned.is_empty() {
                            parts.push(cleaned);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%path, %function, %err, "test generation failed");
                    }
                }
            }

            if parts.is_empty() {
                continue;
            }
            let consolidated = consolidate(&parts, language);
            generated.insert(test_file_path(path, language), consolidated);
        }

        generated
    }
}

/// Maps an extension to a supported language.
#[must_use]
pub fn language_for(path: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())?;
    match ext.as_str() {
        "py" => Some("python"),
        "ts" => Some("typescript"),
        "js" => Some("javascript"),
        "go" => Some("go"),
        "java" => Some("java"),
        _ => None,
    }
}

/// Conventional test file path next to the source.
#[must_use]
pub fn test_file_path(path: &str, language: &str) -> String {
    let p = std::path::Path::new(path);
    let stem = p.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let parent = p.parent().map(|d| d.to_string_lossy().to_string()).unwrap_or_default();
    let name = match language {
        "python" => format!("test_{stem}.py"),
        "typescript" => format!("{stem}.test.ts"),
        "javascript" => format!("{stem}.test.js"),
        "go" => format!("{stem}_test.go"),
        "java" => format!("{stem}Test.java"),
        _ => format!("test_{stem}.txt"),
    };
    if parent.is_empty() {
        name
    } else {
        format!("{parent}/{name}")
    }
}

/// True for files that already are tests.
#[must_use]
pub fn is_test_file(path: &str) -> bool {
    let name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.starts_with("test_")
        || name.contains(".test.")
        || name.ends_with("_test.go")
        || name.ends_with("test.java")
}

#[allow(clippy::unwrap_used)]
fn py_def_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(?:async\s+)?def\s+(\w+)\s*\(").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn go_func_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"func\s+(\w+)\s*\(").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn js_patterns() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?m)^(?:export\s+)?function\s+(\w+)\s*\(",
            r"(?m)^(?:export\s+)?const\s+(\w+)\s*=\s*\([^)]*\)\s*=>",
            r"(\w+)\s*:\s*function\s*\(",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

#[allow(clippy::unwrap_used)]
fn java_method_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)(?:public|private|protected)\s+(?:static\s+)?[\w<>\[\]]+\s+(\w+)\s*\([^)]*\)\s*\{")
            .unwrap()
    })
}

/// Extracts symbol names to generate tests for.
#[must_use]
pub fn extract_functions(content: &str, language: &str) -> Vec<String> {
    let mut names: Vec<String> = match language {
        "python" => py_def_pattern()
            .captures_iter(content)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .filter(|name| !name.starts_with('_'))
            .collect(),
        "go" => go_func_pattern()
            .captures_iter(content)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .filter(|name| !name.starts_with("Test"))
            .collect(),
        "javascript" | "typescript" => js_patterns()
            .iter()
            .flat_map(|re| re.captures_iter(content))
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect(),
        "java" => java_method_pattern()
            .captures_iter(content)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect(),
        _ => Vec::new(),
    };
    names.sort();
    names.dedup();
    names
}

/// Joins generated tests; Python gets exactly one trailing main block.
#[must_use]
pub fn consolidate(parts: &[String], language: &str) -> String {
    let combined = parts.join("\n\n");
    if language != "python" {
        return combined + "\n";
    }

    if combined.matches("unittest.main()").count() <= 1 {
        let mut out = combined;
        if !out.contains("unittest.main()") {
            out.push_str("\n\nif __name__ == \"__main__\":\n    unittest.main()");
        }
        return out + "\n";
    }

    // Strip every main invocation, then re-add a single one at the end.
    let mut kept: Vec<&str> = Vec::new();
    let mut lines = combined.lines().peekable();
    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if trimmed.starts_with("if __name__") && trimmed.contains("__main__") {
            // Drop the guard and its indented body.
            while lines
                .peek()
                .is_some_and(|next| next.starts_with([' ', '\t']) || next.trim().is_empty())
            {
                let Some(body) = lines.next() else { break };
                if body.trim().is_empty() && !lines.peek().is_some_and(|n| n.starts_with([' ', '\t'])) {
                    break;
                }
            }
            continue;
        }
        if trimmed == "unittest.main()" {
            continue;
        }
        kept.push(line);
    }

    let mut out = kept.join("\n").trim_end().to_string();
    out.push_str("\n\nif __name__ == \"__main__\":\n    unittest.main()\n");
    out
}
