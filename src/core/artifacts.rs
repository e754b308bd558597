//! Pipeline artifacts produced by the modify-code stages.
//!
//! Every stage emits one of these artifacts; the interactor threads them
//! through in order and returns all of them, empty or error-annotated
//! where a stage degraded. The serialized shapes keep the `error` field
//! for wire compatibility with downstream consumers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured output of the analyzer stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Structured target-file analysis.
    pub initial_analysis: serde_json::Value,

    /// Semantic-graph dependency analysis, including ripple risks.
    pub dependency_analysis: DependencyAnalysis,

    /// Security analysis; `Value::Null` when not requested.
    #[serde(default)]
    pub security_analysis: serde_json::Value,

    /// Aggregate risk assessment.
    pub risk_assessment: RiskAssessment,

    /// Set when a sub-analysis degraded; the record is still usable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Dependency analysis portion of an [`AnalysisResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyAnalysis {
    /// Symbols whose change propagates to dependents.
    #[serde(default)]
    pub ripple_risk: Vec<RippleEntry>,

    /// Coarse code-quality triple, each on a 0-10 scale.
    #[serde(default)]
    pub code_quality: CodeQuality,
}

/// One ripple-risk entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RippleEntry {
    /// Affected symbol name.
    pub symbol: String,

    /// Risk level: "high", "medium", or "low".
    pub risk_level: String,

    /// Why the symbol is at risk.
    pub reason: String,
}

/// Coarse code-quality triple reported by the dependency analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeQuality {
    /// Structural complexity, 0-10.
    #[serde(default)]
    pub complexity: f64,
    /// Maintainability, 0-10.
    #[serde(default)]
    pub maintainability: f64,
    /// Coupling, 0-10.
    #[serde(default)]
    pub coupling: f64,
}

/// Aggregate risk assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Mean of the four risk factors, clamped to [0, 10].
    pub overall_risk: f64,
}

/// One per-file payload of the modification plan.
///
/// An entry either carries the full original and modified content, or an
/// `error` describing why the file could not be processed. Error entries
/// are skipped by the diffing stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    /// Project-relative target path.
    pub file_path: String,

    /// Content before the change (empty for new files).
    #[serde(default)]
    pub original: String,

    /// Content after the change.
    #[serde(default)]
    pub modified: String,

    /// Set when the payload could not be produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FilePayload {
    /// Creates a successful payload.
    #[must_use]
    pub fn new(file_path: &str, original: String, modified: String) -> Self {
        Self {
            file_path: file_path.to_string(),
            original,
            modified,
            error: None,
        }
    }

    /// Creates an error payload; the diffing stage skips these.
    #[must_use]
    pub fn error(file_path: &str, message: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            original: String::new(),
            modified: String::new(),
            error: Some(message.to_string()),
        }
    }

    /// True when the payload represents no effective change.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.error.is_none() && self.original == self.modified
    }
}

/// The modifier's output: one payload per target file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationPlan {
    /// Per-file payloads, in target order.
    pub payloads: Vec<FilePayload>,
}

impl ModificationPlan {
    /// Returns payloads that are usable by the diffing stage.
    #[must_use]
    pub fn effective_payloads(&self) -> Vec<&FilePayload> {
        self.payloads.iter().filter(|p| p.error.is_none()).collect()
    }

    /// True when no payload carries content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

/// Totals carried by the aggregate patch header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSummary {
    /// Number of files with at least one hunk or binary marker.
    pub files_changed: usize,
    /// Total inserted lines.
    pub insertions: usize,
    /// Total deleted lines.
    pub deletions: usize,
}

/// The diffing stage's output: one aggregate unified diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Aggregate unified diff text (empty when nothing changed).
    pub unified_diff: String,

    /// Parsed totals from the summary header.
    pub summary: PatchSummary,
}

impl Patch {
    /// True when no file produced a diff.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unified_diff.is_empty()
    }
}

/// Per-category counters in a validation report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStat {
    /// Checks run in this category.
    pub total: usize,
    /// Checks that passed.
    pub passed: usize,
    /// Checks that failed.
    pub failed: usize,
    /// Failure messages, in order.
    pub failures: Vec<String>,
}

impl CheckStat {
    /// Records one check outcome.
    pub fn record(&mut self, passed: bool, failure: Option<String>) {
        self.total += 1;
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
            if let Some(msg) = failure {
                self.failures.push(msg);
            }
        }
    }
}

/// The validator's output.
///
/// `ok` holds iff no check of any category failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Overall verdict.
    pub ok: bool,

    /// Human-readable messages, in order.
    pub messages: Vec<String>,

    /// Per-category counters keyed by check type.
    pub checks_by_type: BTreeMap<String, CheckStat>,
}

impl ValidationReport {
    /// Recomputes `ok` from the per-category counters.
    pub fn finalize(&mut self) {
        self.ok = self.checks_by_type.values().all(|stat| stat.failed == 0);
    }

    /// Total failing checks across all categories.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.checks_by_type.values().map(|s| s.failed).sum()
    }

    /// Collects failure messages for validation-feedback retries.
    #[must_use]
    pub fn failure_messages(&self) -> Vec<String> {
        self.checks_by_type
            .values()
            .flat_map(|s| s.failures.iter().cloned())
            .collect()
    }
}

/// The documentation stage's output: one markdown changelog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationUpdate {
    /// Rendered markdown.
    pub markdown: String,
}

/// The interactor's return value.
///
/// All four slots are always present; on failure a slot carries an empty
/// or error-annotated value rather than being absent (degraded return).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModifyOutcome {
    /// Analysis produced for the request.
    pub analysis: AnalysisResult,

    /// The modification plan (may contain error payloads).
    pub plan: ModificationPlan,

    /// The aggregate patch (empty when validation failed).
    pub patch: Patch,

    /// The final validation report.
    pub validation: ValidationReport,

    /// The changelog, when the pipeline reached documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<DocumentationUpdate>,

    /// Set when the run degraded before completing all stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_noop_detection() {
        let same = FilePayload::new("m.py", "x\n".to_string(), "x\n".to_string());
        assert!(same.is_noop());
        let changed = FilePayload::new("m.py", "x\n".to_string(), "y\n".to_string());
        assert!(!changed.is_noop());
        let err = FilePayload::error("m.py", "boom");
        assert!(!err.is_noop());
    }

    #[test]
    fn test_plan_skips_error_payloads() {
        let plan = ModificationPlan {
            payloads: vec![
                FilePayload::new("a.py", String::new(), "pass\n".to_string()),
                FilePayload::error("b.py", "unreadable"),
            ],
        };
        let effective = plan.effective_payloads();
        assert_eq!(effective.len(), 1);
        assert_eq!(effective[0].file_path, "a.py");
    }

    #[test]
    fn test_check_stat_record() {
        let mut stat = CheckStat::default();
        stat.record(true, None);
        stat.record(false, Some("missing docstring".to_string()));
        assert_eq!(stat.total, 2);
        assert_eq!(stat.passed, 1);
        assert_eq!(stat.failed, 1);
        assert_eq!(stat.failures, vec!["missing docstring".to_string()]);
    }

    #[test]
    fn test_validation_report_finalize() {
        let mut report = ValidationReport::default();
        report
            .checks_by_type
            .entry("syntax".to_string())
            .or_default()
            .record(true, None);
        report.finalize();
        assert!(report.ok);

        report
            .checks_by_type
            .entry("style".to_string())
            .or_default()
            .record(false, Some("long line".to_string()));
        report.finalize();
        assert!(!report.ok);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.failure_messages(), vec!["long line".to_string()]);
    }

    #[test]
    fn test_error_field_on_wire_only_when_set() {
        let ok = FilePayload::new("a.py", String::new(), "pass\n".to_string());
        let json = serde_json::to_string(&ok).unwrap();
        assert!(!json.contains("\"error\""));

        let bad = FilePayload::error("a.py", "boom");
        let json = serde_json::to_string(&bad).unwrap();
        assert!(json.contains("\"error\":\"boom\""));
    }

    #[test]
    fn test_outcome_default_is_degraded_empty() {
        let outcome = ModifyOutcome::default();
        assert!(outcome.patch.is_empty());
        assert!(outcome.plan.is_empty());
        assert!(!outcome.validation.ok);
        assert!(outcome.docs.is_none());
    }

    #[test]
    fn test_analysis_result_wire_shape() {
        let json = r#"{
            "initial_analysis": {"target": "m.py"},
            "dependency_analysis": {
                "ripple_risk": [{"symbol": "greet", "risk_level": "low", "reason": "1 dependent"}],
                "code_quality": {"complexity": 2.0, "maintainability": 8.0, "coupling": 1.0}
            },
            "security_analysis": null,
            "risk_assessment": {"overall_risk": 1.5}
        }"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.dependency_analysis.ripple_risk.len(), 1);
        assert!((result.risk_assessment.overall_risk - 1.5).abs() < f64::EPSILON);
        assert!(result.error.is_none());
    }
}
