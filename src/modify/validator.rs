//! Two-phase validation of modification plans.
//!
//! Phase 1 runs local syntax checks per payload; any failure
//! short-circuits the run and the report carries only the `syntax`
//! category. Phase 2 asks the language model for a structured review
//! across seven fixed categories; the aggregate is `ok` only when every
//! check of every category passed.

use crate::core::{CheckStat, ModificationPlan, ValidationReport};
use crate::error::LlmError;
use crate::llm::{LanguageModel, strip_code_fences};
use serde::Deserialize;

/// Review categories requested from the model in phase 2.
pub const CHECK_CATEGORIES: &[&str] = &[
    "syntax",
    "style",
    "security",
    "compatibility",
    "performance",
    "error_handling",
    "documentation",
];

/// One structured check in the model's review reply.
#[derive(Debug, Deserialize)]
struct ReviewCheck {
    #[serde(rename = "type")]
    check_type: String,
    #[serde(default)]
    name: String,
    passed: bool,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ReviewReply {
    checks: Vec<ReviewCheck>,
}

/// Validates modification plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatorAdapter;

impl ValidatorAdapter {
    /// Creates a validator adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs both validation phases over a plan.
    ///
    /// Phase-1 syntax failure returns immediately with `ok=false` and only
    /// the `syntax` category populated. A model reply that cannot be
    /// parsed degrades to a single failed `error_handling` check.
    #[must_use]
    pub fn validate(&self, plan: &ModificationPlan, model: &dyn LanguageModel) -> ValidationReport {
        let mut report = ValidationReport::default();

        // Phase 1: local syntax checks.
        let mut syntax = CheckStat::default();
        for payload in plan.effective_payloads() {
            let verdict = check_syntax(&payload.file_path, &payload.modified);
            match verdict {
                Ok(()) => syntax.record(true, None),
                Err(reason) => {
                    let message = format!("{}: {reason}", payload.file_path);
                    report.messages.push(message.clone());
                    syntax.record(false, Some(message));
                }
            }
        }
        let syntax_failed = syntax.failed > 0;
        report.checks_by_type.insert("syntax".to_string(), syntax);
        if syntax_failed {
            report.ok = false;
            return report;
        }

        // Phase 2: structured model review.
        match self.review(plan, model) {
            Ok(checks) => {
                for check in checks {
                    let category = if CHECK_CATEGORIES.contains(&check.check_type.as_str()) {
                        check.check_type.clone()
                    } else {
                        "style".to_string()
                    };
                    let failure = if check.passed {
                        None
                    } else {
                        let message = if check.message.is_empty() {
                            format!("{category} check '{}' failed", check.name)
                        } else {
                            format!("{category}: {}", check.message)
                        };
                        report.messages.push(message.clone());
                        Some(message)
                    };
                    report
                        .checks_by_type
                        .entry(category)
                        .or_default()
                        .record(check.passed, failure);
                }
            }
            Err(err) => {
                let message = format!("review degraded: {err}");
                report.messages.push(message.clone());
                report
                    .checks_by_type
                    .entry("error_handling".to_string())
                    .or_default()
                    .record(false, Some(message));
            }
        }

        report.finalize();
        report
    }

    /// Phase 2: ask the model for structured checks.
    fn review(
        &self,
        plan: &ModificationPlan,
        model: &dyn LanguageModel,
    ) -> std::result::Result<Vec<ReviewCheck>, LlmError> {
        let mut prompt = String::from(
            "Review the following modified files. For each category in \
             [syntax, style, security, compatibility, performance, error_handling, documentation] \
             return at least one check.\n\
             Respond ONLY with JSON: {\"checks\": [{\"type\": \"style\", \"name\": \"...\", \
             \"passed\": true, \"message\": \"...\"}]}\n",
        );
        for payload in plan.effective_payloads() {
            prompt.push_str(&format!(
                "\n## {}\n```\n{}\n```\n",
                payload.file_path, payload.modified
            ));
        }

        let reply = model.ask(&prompt)?;
        let body = strip_code_fences(&reply.text);
        let parsed: ReviewReply = serde_json::from_str(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("review reply: {e}")))?;
        Ok(parsed.checks)
    }
}

/// Dispatches the phase-1 syntax check by extension.
fn check_syntax(path: &str, content: &str) -> std::result::Result<(), String> {
    let ext = std::path::Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "py" => check_python(content),
        "json" => serde_json::from_str::<serde_json::Value>(content)
            .map(|_| ())
            .map_err(|e| format!("invalid JSON: {e}")),
        "js" | "jsx" | "ts" | "tsx" => check_balance(content),
        "yaml" | "yml" => check_yaml(content),
        _ => Ok(()),
    }
}

/// Surface checks for Python: bracket balance outside strings, block
/// introducers ending with a colon, and terminated triple quotes.
fn check_python(content: &str) -> std::result::Result<(), String> {
    check_balance(content)?;

    if content.matches("\"\"\"").count() % 2 != 0 || content.matches("'''").count() % 2 != 0 {
        return Err("unterminated triple-quoted string".to_string());
    }

    for (i, line) in content.lines().enumerate() {
        let code = line.split('#').next().unwrap_or("").trim_end();
        let trimmed = code.trim_start();
        let is_block_introducer = ["def ", "class ", "if ", "elif ", "for ", "while ", "with "]
            .iter()
            .any(|kw| trimmed.starts_with(kw))
            || trimmed == "else"
            || trimmed == "try";
        // Multi-line signatures keep their colon on a later line.
        if is_block_introducer
            && !code.ends_with(':')
            && !code.ends_with('(')
            && !code.ends_with(',')
            && !code.ends_with('\\')
            && bracket_delta(code) == 0
        {
            return Err(format!("line {}: missing ':' on block statement", i + 1));
        }
    }
    Ok(())
}

/// Bracket/brace/paren balance check that ignores string and comment
/// content, shared by the Python and JS/TS checks.
fn check_balance(content: &str) -> std::result::Result<(), String> {
    let mut stack: Vec<char> = Vec::new();
    let mut chars = content.chars().peekable();
    let mut in_string: Option<char> = None;
    let mut in_line_comment = false;

    while let Some(c) = chars.next() {
        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
            }
            continue;
        }
        if let Some(quote) = in_string {
            if c == '\\' {
                chars.next();
            } else if c == quote {
                in_string = None;
            } else if c == '\n' && (quote == '"' || quote == '\'') {
                // Unterminated single-line string; tolerated here, the
                // model review catches real cases.
                in_string = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => in_string = Some(c),
            '#' => in_line_comment = true,
            '/' if chars.peek() == Some(&'/') => in_line_comment = true,
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return Err(format!("unbalanced '{c}'"));
                }
            }
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed '{open}'"));
    }
    Ok(())
}

/// Returns open-minus-close bracket count for one line of code.
#[allow(clippy::cast_possible_wrap)]
fn bracket_delta(code: &str) -> i64 {
    let opens = code.matches(['(', '[', '{']).count() as i64;
    let closes = code.matches([')', ']', '}']).count() as i64;
    opens - closes
}

/// Indentation heuristics for YAML: no tabs, no odd-space indents.
fn check_yaml(content: &str) -> std::result::Result<(), String> {
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
        if indent.contains('\t') {
            return Err(format!("line {}: tab indentation", i + 1));
        }
    }
    Ok(())
}
