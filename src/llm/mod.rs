//! Language model port.
//!
//! The pipeline consumes "a language model" through the [`LanguageModel`]
//! trait: one `ask` operation returning text plus usage figures. The
//! concrete provider binding lives outside this crate. [`BudgetedModel`]
//! wraps any model with session budget accounting, and [`ScriptedModel`]
//! is the deterministic double used by tests and offline runs.

use crate::budget::SessionBudget;
use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Result type for model calls.
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Suggested time bound for a single model call, in seconds.
pub const SINGLE_CALL_TIMEOUT_SECS: u64 = 30;

/// Token usage reported for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens consumed.
    pub tokens_in: u64,
    /// Completion tokens produced.
    pub tokens_out: u64,
    /// Provider cost estimate for the call.
    pub cost_estimate: f64,
}

/// One model reply: text plus usage accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmReply {
    /// Reply text.
    pub text: String,
    /// Usage figures for the call.
    pub usage: Usage,
}

/// Trait for language model providers.
///
/// Implementations must be thread-safe. Callers are expected to handle
/// `InvalidResponse` by degrading to a minimal fallback artifact rather
/// than failing the request.
pub trait LanguageModel: Send + Sync {
    /// Sends a prompt and returns the reply with usage accounting.
    ///
    /// # Errors
    ///
    /// Fails typed: `Timeout`, `Rejected`, `BudgetExceeded`, or
    /// `InvalidResponse`.
    fn ask(&self, prompt: &str) -> LlmResult<LlmReply>;
}

/// Estimates prompt tokens with the ~4 characters per token heuristic.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    u64::try_from(text.len()).unwrap_or(u64::MAX).div_ceil(4)
}

/// Wraps a model with session budget enforcement.
///
/// The wrapper refuses calls once the budget is spent and records every
/// reply's usage. Adapters receive this wrapper, never the raw budget,
/// so they stay testable with any budget state.
#[derive(Clone)]
pub struct BudgetedModel {
    inner: Arc<dyn LanguageModel>,
    budget: Arc<SessionBudget>,
}

impl BudgetedModel {
    /// Wraps a model with a shared session budget.
    #[must_use]
    pub fn new(inner: Arc<dyn LanguageModel>, budget: Arc<SessionBudget>) -> Self {
        Self { inner, budget }
    }

    /// Returns the shared budget handle.
    #[must_use]
    pub fn budget(&self) -> &SessionBudget {
        &self.budget
    }
}

impl LanguageModel for BudgetedModel {
    fn ask(&self, prompt: &str) -> LlmResult<LlmReply> {
        self.budget.check()?;
        let reply = self.inner.ask(prompt)?;

        let usage = if reply.usage == Usage::default() {
            // Provider reported nothing; estimate so the budget still moves.
            Usage {
                tokens_in: estimate_tokens(prompt),
                tokens_out: estimate_tokens(&reply.text),
                cost_estimate: 0.0,
            }
        } else {
            reply.usage
        };
        self.budget
            .charge(usage.tokens_in, usage.tokens_out, usage.cost_estimate);
        Ok(LlmReply {
            text: reply.text,
            usage,
        })
    }
}

/// Deterministic model double that replays a queue of canned replies.
///
/// Used by tests and offline runs. An exhausted queue fails with
/// `InvalidResponse`, which consumers degrade on.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    /// Creates a scripted model from replies, returned in order.
    #[must_use]
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Returns the prompts received so far.
    #[must_use]
    pub fn received_prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl LanguageModel for ScriptedModel {
    fn ask(&self, prompt: &str) -> LlmResult<LlmReply> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let text = self
            .replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .ok_or_else(|| LlmError::InvalidResponse("scripted replies exhausted".to_string()))?;
        Ok(LlmReply {
            text,
            usage: Usage::default(),
        })
    }
}

/// Strips markdown code fences from a model reply, returning the inner
/// code. Replies without fences pass through trimmed.
#[must_use]
pub fn strip_code_fences(reply: &str) -> String {
    let trimmed = reply.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    lines.remove(0);
    if lines.last().is_some_and(|line| line.trim() == "```") {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_model_replays_in_order() {
        let model = ScriptedModel::new(["first", "second"]);
        assert_eq!(model.ask("a").unwrap().text, "first");
        assert_eq!(model.ask("b").unwrap().text, "second");
        assert!(matches!(
            model.ask("c").unwrap_err(),
            LlmError::InvalidResponse(_)
        ));
        assert_eq!(model.received_prompts(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_budgeted_model_charges_usage() {
        let budget = Arc::new(SessionBudget::new(10_000));
        let model = BudgetedModel::new(
            Arc::new(ScriptedModel::new(["reply text here"])),
            Arc::clone(&budget),
        );
        model.ask("a prompt of some length").unwrap();
        assert!(budget.used_tokens() > 0);
    }

    #[test]
    fn test_budgeted_model_refuses_once_spent() {
        let budget = Arc::new(SessionBudget::new(1));
        budget.charge(5, 0, 0.0);
        let model = BudgetedModel::new(
            Arc::new(ScriptedModel::new(["never returned"])),
            Arc::clone(&budget),
        );
        assert!(matches!(
            model.ask("prompt").unwrap_err(),
            LlmError::BudgetExceeded { .. }
        ));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_strip_code_fences_with_language() {
        let reply = "```python\ndef f():\n    pass\n```";
        assert_eq!(strip_code_fences(reply), "def f():\n    pass");
    }

    #[test]
    fn test_strip_code_fences_passthrough() {
        assert_eq!(strip_code_fences("  plain code  "), "plain code");
    }

    #[test]
    fn test_strip_code_fences_unclosed() {
        let reply = "```\ncode without closing fence";
        assert_eq!(strip_code_fences(reply), "code without closing fence");
    }
}
