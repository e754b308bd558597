//! Structured analysis of a modification request.
//!
//! Three sub-analyses run in order: target-file analysis, semantic-graph
//! dependency analysis, and (only when the request mentions a security
//! keyword) a security analysis. Each sub-reply is validated as JSON; a
//! parse failure degrades that sub-record but the analysis still
//! proceeds. The overall risk is the mean of four factors.

use crate::core::{
    AnalysisResult, CodeQuality, DependencyAnalysis, ModificationRequest, RiskAssessment,
    UserPrompt,
};
use crate::error::LlmError;
use crate::graph::SemanticGraph;
use crate::llm::{LanguageModel, strip_code_fences};

/// Keywords that trigger the security sub-analysis.
pub const SECURITY_KEYWORDS: &[&str] = &[
    "auth",
    "password",
    "crypt",
    "secret",
    "token",
    "key",
    "permission",
    "access",
];

/// Depth bound for ripple-risk walks.
pub const RIPPLE_DEPTH: usize = 3;

/// Produces the analysis artifact for a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzerAdapter;

impl AnalyzerAdapter {
    /// Creates an analyzer adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs the three sub-analyses for a request.
    ///
    /// `BudgetExceeded` aborts the stage; every other model failure
    /// degrades the affected sub-record and analysis continues.
    ///
    /// # Errors
    ///
    /// Returns `BudgetExceeded` only.
    pub fn analyze(
        &self,
        request: &ModificationRequest,
        graph: &SemanticGraph,
        model: &dyn LanguageModel,
    ) -> std::result::Result<AnalysisResult, LlmError> {
        let mut result = AnalysisResult::default();
        let task = request.user_prompt.describe();

        // Sub-analysis 1: structured target-file analysis.
        match self.ask_json(
            model,
            &format!(
                "Analyze the target of this modification request. Respond ONLY with a JSON \
                 object with keys: target_files (array of paths), summary (string), \
                 complexity (0-10 number).\n\nRequest:\n{task}"
            ),
        ) {
            Ok(value) => result.initial_analysis = value,
            Err(LlmError::BudgetExceeded { used, limit }) => {
                return Err(LlmError::BudgetExceeded { used, limit });
            }
            Err(err) => {
                result.initial_analysis = serde_json::Value::Null;
                result.error = Some(format!("initial analysis degraded: {err}"));
            }
        }

        // Sub-analysis 2: dependency analysis over the semantic graph.
        let target_symbols = Self::target_symbols(request);
        let ripple = graph.ripple_risk(&target_symbols, RIPPLE_DEPTH);
        let quality = match self.ask_json(
            model,
            &format!(
                "Given these dependents of the symbols being modified:\n{}\n\
                 Rate the change. Respond ONLY with JSON: \
                 {{\"complexity\": 0-10, \"maintainability\": 0-10, \"coupling\": 0-10}}",
                serde_json::to_string(&ripple).unwrap_or_else(|_| "[]".to_string()),
            ),
        ) {
            Ok(value) => serde_json::from_value::<CodeQuality>(value).unwrap_or_default(),
            Err(LlmError::BudgetExceeded { used, limit }) => {
                return Err(LlmError::BudgetExceeded { used, limit });
            }
            Err(err) => {
                if result.error.is_none() {
                    result.error = Some(format!("dependency analysis degraded: {err}"));
                }
                CodeQuality::default()
            }
        };
        result.dependency_analysis = DependencyAnalysis {
            ripple_risk: ripple,
            code_quality: quality,
        };

        // Sub-analysis 3: security, only for security-flavored requests.
        let lowered = task.to_lowercase();
        let security_relevant = SECURITY_KEYWORDS.iter().any(|kw| lowered.contains(kw));
        if security_relevant {
            match self.ask_json(
                model,
                &format!(
                    "Security-analyze this modification request. Respond ONLY with JSON: \
                     {{\"vulnerabilities\": [{{\"issue\": \"...\", \"severity\": \
                     \"low|medium|high\"}}], \"summary\": \"...\"}}\n\nRequest:\n{task}"
                ),
            ) {
                Ok(value) => result.security_analysis = value,
                Err(LlmError::BudgetExceeded { used, limit }) => {
                    return Err(LlmError::BudgetExceeded { used, limit });
                }
                Err(err) => {
                    result.security_analysis = serde_json::Value::Null;
                    if result.error.is_none() {
                        result.error = Some(format!("security analysis degraded: {err}"));
                    }
                }
            }
        }

        result.risk_assessment = RiskAssessment {
            overall_risk: Self::overall_risk(&result),
        };
        Ok(result)
    }

    /// Sends a prompt and parses the reply as a JSON object.
    fn ask_json(
        &self,
        model: &dyn LanguageModel,
        prompt: &str,
    ) -> std::result::Result<serde_json::Value, LlmError> {
        let reply = model.ask(prompt)?;
        let body = strip_code_fences(&reply.text);
        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("not a JSON object: {e}")))?;
        if value.is_object() {
            Ok(value)
        } else {
            Err(LlmError::InvalidResponse("reply is not a JSON object".to_string()))
        }
    }

    /// Symbols the request names directly.
    fn target_symbols(request: &ModificationRequest) -> Vec<String> {
        match &request.user_prompt {
            UserPrompt::Step(step) => {
                let mut symbols = Vec::new();
                if let Some(function) = &step.function {
                    symbols.push(function.clone());
                }
                if let Some(stem) = std::path::Path::new(&step.file).file_stem() {
                    symbols.push(stem.to_string_lossy().to_string());
                }
                symbols
            }
            UserPrompt::Text(_) => Vec::new(),
        }
    }

    /// Mean of ripple impact (capped at 10), complexity, vulnerability
    /// count, and target-file count, clamped to [0, 10].
    #[allow(clippy::cast_precision_loss)]
    fn overall_risk(result: &AnalysisResult) -> f64 {
        let ripple_impact = (result.dependency_analysis.ripple_risk.len() as f64).min(10.0);
        let complexity = result.dependency_analysis.code_quality.complexity;
        let vulnerabilities = result
            .security_analysis
            .get("vulnerabilities")
            .and_then(|v| v.as_array())
            .map_or(0.0, |a| a.len() as f64);
        let target_files = result
            .initial_analysis
            .get("target_files")
            .and_then(|v| v.as_array())
            .map_or(1.0, |a| a.len().max(1) as f64);

        let mean = (ripple_impact + complexity + vulnerabilities + target_files) / 4.0;
        mean.clamp(0.0, 10.0)
    }
}
