//! Modification request types.
//!
//! A request is the immutable input to the modify-code interactor. The
//! user's intent arrives either as free text or as a structured step
//! naming an action, a target file, and what/how instructions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The kind of change a structured step asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Create a new file.
    Create,
    /// Modify an existing file (or a named function within it).
    Modify,
    /// Delete a named function from a file.
    Delete,
    /// Add a new function to an existing file.
    Add,
}

impl Action {
    /// Returns the wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
            Self::Add => "add",
        }
    }
}

/// A structured modification step.
///
/// # Examples
///
/// ```
/// use codefactory_rs::core::{Action, ModificationStep};
///
/// let step = ModificationStep::new(Action::Create, "utils/math.py")
///     .what("add square function")
///     .how("def square(x): return x*x");
/// assert_eq!(step.file, "utils/math.py");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationStep {
    /// The requested action.
    pub action: Action,

    /// Project-relative target file.
    pub file: String,

    /// Short description of the change.
    #[serde(default)]
    pub what: String,

    /// Implementation guidance for the change.
    #[serde(default)]
    pub how: String,

    /// Target function for function-level actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

impl ModificationStep {
    /// Creates a step targeting `file` with empty what/how.
    #[must_use]
    pub fn new(action: Action, file: &str) -> Self {
        Self {
            action,
            file: file.to_string(),
            what: String::new(),
            how: String::new(),
            function: None,
        }
    }

    /// Sets the change description.
    #[must_use]
    pub fn what(mut self, what: &str) -> Self {
        self.what = what.to_string();
        self
    }

    /// Sets the implementation guidance.
    #[must_use]
    pub fn how(mut self, how: &str) -> Self {
        self.how = how.to_string();
        self
    }

    /// Sets the target function for function-level actions.
    #[must_use]
    pub fn function(mut self, function: &str) -> Self {
        self.function = Some(function.to_string());
        self
    }
}

/// The user's intent: free text or a structured step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserPrompt {
    /// A structured step with action/file/what/how fields.
    Step(ModificationStep),
    /// Free-form natural language.
    Text(String),
}

impl UserPrompt {
    /// Returns the structured step, if this prompt is one.
    #[must_use]
    pub const fn as_step(&self) -> Option<&ModificationStep> {
        match self {
            Self::Step(step) => Some(step),
            Self::Text(_) => None,
        }
    }

    /// Renders the prompt as task text for an LLM.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Step(step) => {
                let mut out = format!(
                    "Action: {}\nFile: {}\nWhat: {}\nHow: {}",
                    step.action.as_str(),
                    step.file,
                    step.what,
                    step.how
                );
                if let Some(func) = &step.function {
                    out.push_str("\nFunction: ");
                    out.push_str(func);
                }
                out
            }
        }
    }
}

/// Immutable input to one interactor run.
#[derive(Debug, Clone)]
pub struct ModificationRequest {
    /// Root of the project tree all paths resolve against.
    pub project_root: PathBuf,

    /// The user's intent.
    pub user_prompt: UserPrompt,

    /// Retrieval context assembled for this request (may be empty).
    pub rag_context: String,
}

impl ModificationRequest {
    /// Creates a request from a structured step.
    #[must_use]
    pub fn from_step(project_root: PathBuf, step: ModificationStep) -> Self {
        Self {
            project_root,
            user_prompt: UserPrompt::Step(step),
            rag_context: String::new(),
        }
    }

    /// Creates a request from free text.
    #[must_use]
    pub fn from_text(project_root: PathBuf, text: &str) -> Self {
        Self {
            project_root,
            user_prompt: UserPrompt::Text(text.to_string()),
            rag_context: String::new(),
        }
    }

    /// Attaches retrieval context to the request.
    #[must_use]
    pub fn with_context(mut self, rag_context: String) -> Self {
        self.rag_context = rag_context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_builder() {
        let step = ModificationStep::new(Action::Delete, "m.py").function("a");
        assert_eq!(step.action, Action::Delete);
        assert_eq!(step.function.as_deref(), Some("a"));
        assert!(step.what.is_empty());
    }

    #[test]
    fn test_step_deserializes_from_wire_shape() {
        let json = r#"{"action":"create","file":"utils/math.py","what":"add square function","how":"def square(x): return x*x"}"#;
        let step: ModificationStep = serde_json::from_str(json).unwrap();
        assert_eq!(step.action, Action::Create);
        assert_eq!(step.file, "utils/math.py");
        assert!(step.function.is_none());
    }

    #[test]
    fn test_user_prompt_untagged_round_trip() {
        let prompt: UserPrompt = serde_json::from_str(r#""add logging to the api""#).unwrap();
        assert!(matches!(prompt, UserPrompt::Text(_)));

        let prompt: UserPrompt =
            serde_json::from_str(r#"{"action":"modify","file":"m.py","what":"w","how":"h"}"#)
                .unwrap();
        assert!(prompt.as_step().is_some());
    }

    #[test]
    fn test_describe_includes_function() {
        let step = ModificationStep::new(Action::Delete, "m.py").function("a");
        let prompt = UserPrompt::Step(step);
        let text = prompt.describe();
        assert!(text.contains("Action: delete"));
        assert!(text.contains("Function: a"));
    }

    #[test]
    fn test_request_with_context() {
        let req = ModificationRequest::from_text(PathBuf::from("/tmp/p"), "do things")
            .with_context("chunk text".to_string());
        assert_eq!(req.rag_context, "chunk text");
    }
}
