//! Modify-code interactor.
//!
//! Sequences the pipeline stages for one request: analyze, plan,
//! validate (with bounded retries carrying validation feedback back into
//! planning), diff, and document. The stage order is never changed. The
//! budget is checked before every model-driven stage; exhaustion returns
//! a degraded outcome carrying whatever artifacts exist. The interactor
//! always returns all artifact slots; it never panics on a failed
//! request.

use crate::core::{ModificationRequest, ModifyOutcome};
use crate::error::{Error, LlmError};
use crate::graph::SemanticGraph;
use crate::llm::LanguageModel;
use crate::modify::analyzer::AnalyzerAdapter;
use crate::modify::diffing::DiffingAdapter;
use crate::modify::docs::DocumentationAdapter;
use crate::modify::modifier::ModifierAdapter;
use crate::modify::validator::ValidatorAdapter;
use crate::storage::VectorStore;

/// Default validation retry bound.
pub const DEFAULT_MAX_RETRIES: usize = 2;

/// Orchestrates one modification request end to end.
pub struct ModifyCodeInteractor {
    analyzer: AnalyzerAdapter,
    modifier: ModifierAdapter,
    validator: ValidatorAdapter,
    differ: DiffingAdapter,
    documenter: DocumentationAdapter,
    max_retries: usize,
}

impl Default for ModifyCodeInteractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ModifyCodeInteractor {
    /// Creates an interactor with the default retry bound.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            analyzer: AnalyzerAdapter::new(),
            modifier: ModifierAdapter::new(),
            validator: ValidatorAdapter::new(),
            differ: DiffingAdapter::new(),
            documenter: DocumentationAdapter::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Overrides the validation retry bound.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Assembles retrieval context for the request, then runs the
    /// pipeline. Requests that already carry context are run as-is.
    #[must_use]
    pub fn run_with_retrieval(
        &self,
        request: &ModificationRequest,
        store: &dyn VectorStore,
        embedder: &dyn crate::embedding::Embedder,
        model: &dyn LanguageModel,
    ) -> ModifyOutcome {
        if !request.rag_context.is_empty() {
            return self.run(request, store, model);
        }
        let query = crate::context::ContextQuery::new(&request.user_prompt.describe());
        let context = crate::context::ContextBuilder::new()
            .build(store, embedder, &query)
            .unwrap_or_else(|err| {
                tracing::warn!(%err, "context assembly failed, continuing without");
                String::new()
            });
        let enriched = request.clone().with_context(context);
        self.run(&enriched, store, model)
    }

    /// Runs the pipeline for one request.
    ///
    /// Exactly one analysis, one plan (per attempt), one patch, and at
    /// most one documentation update are produced. The return value is
    /// complete even when a stage degraded; inspect `outcome.error`.
    #[must_use]
    pub fn run(
        &self,
        request: &ModificationRequest,
        store: &dyn VectorStore,
        model: &dyn LanguageModel,
    ) -> ModifyOutcome {
        let mut outcome = ModifyOutcome::default();

        // Stage 1: analysis over the semantic graph.
        let graph = match SemanticGraph::from_store(store) {
            Ok(graph) => graph,
            Err(err) => {
                tracing::warn!(%err, "graph build failed, analyzing without one");
                SemanticGraph::build(&[])
            }
        };
        match self.analyzer.analyze(request, &graph, model) {
            Ok(analysis) => outcome.analysis = analysis,
            Err(LlmError::BudgetExceeded { used, limit }) => {
                return Self::degrade(outcome, &LlmError::BudgetExceeded { used, limit });
            }
            Err(err) => {
                outcome.error = Some(format!("analysis failed: {err}"));
            }
        }

        // Stages 2+3: plan, validate, and retry with feedback.
        let mut feedback: Option<String> = None;
        let mut attempt = 0usize;
        loop {
            let plan = match self.modifier.build_plan(request, model, feedback.as_deref()) {
                Ok(plan) => plan,
                Err(Error::Llm(LlmError::BudgetExceeded { used, limit })) => {
                    return Self::degrade(outcome, &LlmError::BudgetExceeded { used, limit });
                }
                Err(err) => {
                    outcome.error = Some(format!("planning failed: {err}"));
                    return outcome;
                }
            };
            outcome.plan = plan;

            outcome.validation = self.validator.validate(&outcome.plan, model);
            if outcome.validation.ok {
                break;
            }

            if attempt >= self.max_retries {
                tracing::warn!(
                    attempts = attempt + 1,
                    failures = outcome.validation.failure_count(),
                    "validation retries exhausted"
                );
                // Degraded return: plan and report but no patch, nothing
                // is written to the tree.
                return outcome;
            }
            attempt += 1;
            let messages = outcome.validation.failure_messages().join("\n- ");
            feedback = Some(format!("- {messages}"));
            tracing::info!(attempt, "re-planning with validation feedback");
        }

        // Stage 4: deterministic diff.
        outcome.patch = self.differ.diff_plan(&outcome.plan);

        // Stage 5: deterministic changelog.
        outcome.docs = Some(self.documenter.render(&outcome.patch));

        outcome
    }

    /// Builds the degraded return for budget exhaustion.
    fn degrade(mut outcome: ModifyOutcome, err: &LlmError) -> ModifyOutcome {
        outcome.error = Some(err.to_string());
        tracing::warn!(%err, "returning degraded outcome");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::SessionBudget;
    use crate::core::{Action, ModificationStep};
    use crate::llm::{BudgetedModel, ScriptedModel};
    use crate::storage::{SqliteStore, VectorStore as _};
    use crate::modify::validator::CHECK_CATEGORIES;
    use std::sync::Arc;

    fn empty_store() -> SqliteStore {
        let mut store = SqliteStore::in_memory(crate::embedding::DEFAULT_DIMENSIONS).unwrap();
        store.init().unwrap();
        store
    }

    fn all_pass_review() -> String {
        let checks: Vec<serde_json::Value> = CHECK_CATEGORIES
            .iter()
            .map(|cat| serde_json::json!({"type": cat, "name": "auto", "passed": true, "message": ""}))
            .collect();
        serde_json::json!({ "checks": checks }).to_string()
    }

    fn create_request(dir: &std::path::Path) -> ModificationRequest {
        ModificationRequest::from_step(
            dir.to_path_buf(),
            ModificationStep::new(Action::Create, "utils/math.py")
                .what("add square function")
                .how("def square(x): return x*x"),
        )
    }

    #[test]
    fn test_full_pipeline_produces_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::new([
            r#"{"target_files": ["utils/math.py"], "summary": "new module", "complexity": 1}"#.to_string(),
            r#"{"complexity": 1, "maintainability": 9, "coupling": 0}"#.to_string(),
            "def square(x):\n    return x * x".to_string(),
            all_pass_review(),
        ]);
        let store = empty_store();

        let outcome = ModifyCodeInteractor::new().run(&create_request(dir.path()), &store, &model);

        assert!(outcome.error.is_none());
        assert_eq!(outcome.plan.payloads.len(), 1);
        assert!(outcome.validation.ok);
        assert!(outcome.patch.unified_diff.contains("# === Diff for utils/math.py"));
        assert!(outcome.docs.unwrap().markdown.contains("utils/math.py"));
    }

    #[test]
    fn test_validation_failure_retries_with_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let failing_review = serde_json::json!({"checks": [
            {"type": "style", "name": "naming", "passed": false, "message": "bad name"}
        ]})
        .to_string();
        let model = ScriptedModel::new([
            r#"{"target_files": [], "summary": "s", "complexity": 1}"#.to_string(),
            r#"{"complexity": 1, "maintainability": 9, "coupling": 0}"#.to_string(),
            "def square(x):\n    return x * x".to_string(),
            failing_review,
            "def square(value):\n    return value * value".to_string(),
            all_pass_review(),
        ]);
        let store = empty_store();

        let outcome = ModifyCodeInteractor::new().run(&create_request(dir.path()), &store, &model);

        assert!(outcome.validation.ok);
        assert!(outcome.plan.payloads[0].modified.contains("value * value"));
        // The retry prompt carried the validation feedback.
        let prompts = model.received_prompts();
        assert!(prompts.iter().any(|p| p.contains("Validation feedback") && p.contains("bad name")));
    }

    #[test]
    fn test_retry_exhaustion_returns_empty_patch() {
        let dir = tempfile::tempdir().unwrap();
        let failing_review = serde_json::json!({"checks": [
            {"type": "security", "name": "s", "passed": false, "message": "still bad"}
        ]})
        .to_string();
        // Analysis (2) + 3 attempts of (plan, review).
        let model = ScriptedModel::new([
            r#"{"target_files": [], "summary": "s", "complexity": 1}"#.to_string(),
            r#"{"complexity": 1, "maintainability": 9, "coupling": 0}"#.to_string(),
            "bad = True".to_string(),
            failing_review.clone(),
            "bad = True".to_string(),
            failing_review.clone(),
            "bad = True".to_string(),
            failing_review,
        ]);
        let store = empty_store();

        let outcome = ModifyCodeInteractor::new().run(&create_request(dir.path()), &store, &model);

        assert!(!outcome.validation.ok);
        assert!(outcome.patch.is_empty());
        assert!(outcome.docs.is_none());
    }

    #[test]
    fn test_syntax_invalid_modification_scenario() {
        let dir = tempfile::tempdir().unwrap();
        // Every attempt produces syntactically broken Python.
        let model = ScriptedModel::new([
            r#"{"target_files": [], "summary": "s", "complexity": 1}"#.to_string(),
            r#"{"complexity": 1, "maintainability": 9, "coupling": 0}"#.to_string(),
            "def broken(:\n    pass".to_string(),
            "def broken(:\n    pass".to_string(),
            "def broken(:\n    pass".to_string(),
        ]);
        let store = empty_store();

        let outcome = ModifyCodeInteractor::new().run(&create_request(dir.path()), &store, &model);

        assert!(!outcome.validation.ok);
        assert_eq!(outcome.validation.checks_by_type.len(), 1);
        assert!(outcome.validation.checks_by_type.contains_key("syntax"));
        assert!(outcome.patch.is_empty());
    }

    #[test]
    fn test_budget_exhaustion_degrades_before_llm_stage() {
        let dir = tempfile::tempdir().unwrap();
        let budget = Arc::new(SessionBudget::new(1));
        budget.charge(10, 0, 0.0);
        let model = BudgetedModel::new(
            Arc::new(ScriptedModel::new(["never used"])),
            Arc::clone(&budget),
        );
        let store = empty_store();

        let outcome = ModifyCodeInteractor::new().run(&create_request(dir.path()), &store, &model);

        assert!(outcome.error.as_deref().unwrap().contains("budget exceeded"));
        assert!(outcome.patch.is_empty());
        assert!(outcome.plan.is_empty());
    }

    #[test]
    fn test_path_escape_fatal_no_patch() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::new([
            r#"{"target_files": [], "summary": "s", "complexity": 1}"#.to_string(),
            r#"{"complexity": 1, "maintainability": 9, "coupling": 0}"#.to_string(),
        ]);
        let store = empty_store();
        let request = ModificationRequest::from_step(
            dir.path().to_path_buf(),
            ModificationStep::new(Action::Create, "../../etc/passwd").what("escape"),
        );

        let outcome = ModifyCodeInteractor::new().run(&request, &store, &model);
        assert!(outcome.error.as_deref().unwrap().contains("planning failed"));
        assert!(outcome.patch.is_empty());
    }
}
