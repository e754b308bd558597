//! Session token budget.
//!
//! One budget value exists per session. It is initialized when the session
//! starts, charged after every language-model call, read before every
//! LLM-driven stage, and summarized when the session ends. Adapters never
//! see the budget directly; they receive a budget-charging model wrapper.

use crate::error::LlmError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default session limit in tokens.
pub const DEFAULT_SESSION_TOKENS: u64 = 200_000;

/// Process-wide token budget with atomic accounting.
///
/// # Examples
///
/// ```
/// use codefactory_rs::budget::SessionBudget;
///
/// let budget = SessionBudget::new(1000);
/// budget.charge(100, 50, 0.002);
/// assert_eq!(budget.used_tokens(), 150);
/// assert!(budget.check().is_ok());
/// ```
#[derive(Debug)]
pub struct SessionBudget {
    limit: u64,
    tokens_in: AtomicU64,
    tokens_out: AtomicU64,
    /// Cost in millionths of a currency unit, to stay atomic.
    cost_micros: AtomicU64,
}

impl SessionBudget {
    /// Creates a budget with the given token limit.
    #[must_use]
    pub const fn new(limit: u64) -> Self {
        Self {
            limit,
            tokens_in: AtomicU64::new(0),
            tokens_out: AtomicU64::new(0),
            cost_micros: AtomicU64::new(0),
        }
    }

    /// Returns the session limit in tokens.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Records consumption from one language-model call.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn charge(&self, tokens_in: u64, tokens_out: u64, cost_estimate: f64) {
        self.tokens_in.fetch_add(tokens_in, Ordering::Relaxed);
        self.tokens_out.fetch_add(tokens_out, Ordering::Relaxed);
        let micros = (cost_estimate.max(0.0) * 1_000_000.0) as u64;
        self.cost_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Total tokens consumed so far.
    #[must_use]
    pub fn used_tokens(&self) -> u64 {
        self.tokens_in.load(Ordering::Relaxed) + self.tokens_out.load(Ordering::Relaxed)
    }

    /// Tokens still available before the limit.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used_tokens())
    }

    /// Fails with `BudgetExceeded` once the limit has been reached.
    ///
    /// Callers check before issuing a language-model call; once the budget
    /// is spent no further call is issued.
    pub fn check(&self) -> Result<(), LlmError> {
        let used = self.used_tokens();
        if used >= self.limit {
            return Err(LlmError::BudgetExceeded {
                used,
                limit: self.limit,
            });
        }
        Ok(())
    }

    /// Produces the end-of-session summary.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(&self) -> BudgetSummary {
        BudgetSummary {
            limit: self.limit,
            tokens_in: self.tokens_in.load(Ordering::Relaxed),
            tokens_out: self.tokens_out.load(Ordering::Relaxed),
            cost_estimate: self.cost_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}

impl Default for SessionBudget {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TOKENS)
    }
}

/// Final consumption figures for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetSummary {
    /// Session limit in tokens.
    pub limit: u64,
    /// Prompt tokens consumed.
    pub tokens_in: u64,
    /// Completion tokens consumed.
    pub tokens_out: u64,
    /// Accumulated cost estimate.
    pub cost_estimate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_budget_passes_check() {
        let budget = SessionBudget::new(100);
        assert!(budget.check().is_ok());
        assert_eq!(budget.remaining(), 100);
    }

    #[test]
    fn test_charge_accumulates() {
        let budget = SessionBudget::new(1000);
        budget.charge(10, 20, 0.001);
        budget.charge(5, 5, 0.001);
        assert_eq!(budget.used_tokens(), 40);
        assert_eq!(budget.remaining(), 960);
    }

    #[test]
    fn test_check_fails_once_exhausted() {
        let budget = SessionBudget::new(30);
        budget.charge(20, 10, 0.0);
        let err = budget.check().unwrap_err();
        assert!(matches!(
            err,
            LlmError::BudgetExceeded {
                used: 30,
                limit: 30
            }
        ));
    }

    #[test]
    fn test_check_fails_when_over() {
        let budget = SessionBudget::new(10);
        budget.charge(100, 0, 0.0);
        assert!(budget.check().is_err());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_summary_cost_accumulation() {
        let budget = SessionBudget::new(1000);
        budget.charge(100, 100, 0.25);
        budget.charge(100, 100, 0.25);
        let summary = budget.summary();
        assert_eq!(summary.tokens_in, 200);
        assert_eq!(summary.tokens_out, 200);
        assert!((summary.cost_estimate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_default_limit() {
        let budget = SessionBudget::default();
        assert_eq!(budget.limit(), DEFAULT_SESSION_TOKENS);
    }
}
