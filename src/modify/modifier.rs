//! Modifier adapter: produces per-file modification payloads.
//!
//! For each target file the adapter emits exactly one payload carrying
//! the full original and modified content — never a diff; diffs are the
//! diffing adapter's job. Deterministic file-type transforms run first;
//! files without one get their full modified source from the language
//! model. Target paths are resolved against the project root and any
//! path that escapes it fails the request.

use crate::context::apply_context;
use crate::core::{
    Action, FilePayload, ModificationPlan, ModificationRequest, ModificationStep, UserPrompt,
};
use crate::error::{LlmError, Result};
use crate::llm::{LanguageModel, strip_code_fences};
use crate::modify::resolve_in_root;
use crate::modify::transforms::apply_transform;

/// Produces modification payloads for a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModifierAdapter;

impl ModifierAdapter {
    /// Creates a modifier adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the plan for a request.
    ///
    /// `feedback` carries validation failure messages from a previous
    /// attempt and is appended to every model prompt.
    ///
    /// # Errors
    ///
    /// Fails with `PathEscape` when a target leaves the project root and
    /// propagates `BudgetExceeded`; other model failures degrade to error
    /// payloads.
    pub fn build_plan(
        &self,
        request: &ModificationRequest,
        model: &dyn LanguageModel,
        feedback: Option<&str>,
    ) -> Result<ModificationPlan> {
        let steps = match &request.user_prompt {
            UserPrompt::Step(step) => vec![step.clone()],
            UserPrompt::Text(text) => match self.derive_steps(text, model) {
                Ok(steps) => steps,
                Err(LlmError::BudgetExceeded { used, limit }) => {
                    return Err(LlmError::BudgetExceeded { used, limit }.into());
                }
                Err(err) => {
                    return Ok(ModificationPlan {
                        payloads: vec![FilePayload::error(
                            "",
                            &format!("could not derive modification steps: {err}"),
                        )],
                    });
                }
            },
        };

        let mut payloads = Vec::with_capacity(steps.len());
        for step in &steps {
            match self.payload_for_step(request, step, model, feedback)? {
                Some(payload) => payloads.push(payload),
                None => tracing::debug!(file = %step.file, "no-change payload suppressed"),
            }
        }
        Ok(ModificationPlan { payloads })
    }

    /// Asks the model to turn a free-text request into structured steps.
    fn derive_steps(
        &self,
        text: &str,
        model: &dyn LanguageModel,
    ) -> std::result::Result<Vec<ModificationStep>, LlmError> {
        let prompt = format!(
            "Turn this modification request into a JSON array of steps.\n\
             Each step: {{\"action\": \"create|modify|delete|add\", \"file\": \"path\", \
             \"what\": \"...\", \"how\": \"...\", \"function\": \"optional\"}}.\n\
             Return ONLY the JSON array.\n\nRequest: {text}"
        );
        let reply = model.ask(&prompt)?;
        let body = strip_code_fences(&reply.text);
        let steps: Vec<ModificationStep> = serde_json::from_str(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("step list: {e}")))?;
        if steps.is_empty() {
            return Err(LlmError::InvalidResponse("empty step list".to_string()));
        }
        Ok(steps)
    }

    /// Produces the payload for one step; `None` means suppressed no-op.
    fn payload_for_step(
        &self,
        request: &ModificationRequest,
        step: &ModificationStep,
        model: &dyn LanguageModel,
        feedback: Option<&str>,
    ) -> Result<Option<FilePayload>> {
        let target = resolve_in_root(&request.project_root, &step.file)?;
        let exists = target.exists();

        match step.action {
            Action::Create if exists => {
                return Ok(Some(FilePayload::error(
                    &step.file,
                    "file already exists; use the modify action",
                )));
            }
            Action::Modify | Action::Delete | Action::Add if !exists => {
                return Ok(Some(FilePayload::error(
                    &step.file,
                    "file does not exist; use the create action",
                )));
            }
            _ => {}
        }

        let original = if exists {
            match std::fs::read_to_string(&target) {
                Ok(content) => content,
                Err(err) => {
                    return Ok(Some(FilePayload::error(
                        &step.file,
                        &format!("read failed: {err}"),
                    )));
                }
            }
        } else {
            String::new()
        };

        // Deterministic transforms first; the model is the fallback.
        match apply_transform(&original, step) {
            Ok(Some(modified)) => {
                return Ok(Some(FilePayload::new(&step.file, original, modified)));
            }
            Ok(None) => {}
            Err(message) => {
                return Ok(Some(FilePayload::error(&step.file, &message)));
            }
        }

        let prompt = self.modification_prompt(request, step, &original, feedback);
        match model.ask(&prompt) {
            Ok(reply) => {
                let modified = strip_code_fences(&reply.text);
                if modified.is_empty() && !original.is_empty() {
                    // Empty output for an existing file means "no change".
                    return Ok(None);
                }
                let modified = ensure_trailing_newline(modified);
                Ok(Some(FilePayload::new(&step.file, original, modified)))
            }
            Err(LlmError::BudgetExceeded { used, limit }) => {
                Err(LlmError::BudgetExceeded { used, limit }.into())
            }
            Err(err) => Ok(Some(FilePayload::error(&step.file, &err.to_string()))),
        }
    }

    /// Builds the full-source prompt for one step.
    fn modification_prompt(
        &self,
        request: &ModificationRequest,
        step: &ModificationStep,
        original: &str,
        feedback: Option<&str>,
    ) -> String {
        let mut prompt = format!(
            "# Task\nFile to {}: {}\nWhat: {}\nHow: {}\n",
            step.action.as_str(),
            step.file,
            step.what,
            step.how,
        );
        if let Some(function) = &step.function {
            prompt.push_str(&format!("Function: {function}\n"));
        }

        if original.is_empty() {
            prompt.push_str("\n# New File\nProduce the complete content for this new file.\n");
        } else {
            prompt.push_str(&format!(
                "\n# Existing Code\n```\n{original}```\n\nApply the change while preserving all unrelated behavior.\n"
            ));
        }

        if let Some(feedback) = feedback {
            prompt.push_str(&format!("\n# Validation feedback\n{feedback}\n"));
        }

        prompt.push_str(
            "\n# Output\nReturn ONLY the complete modified source for the file. \
             No explanations, no markdown fences, no diffs.\n",
        );
        apply_context(&prompt, &request.rag_context)
    }
}

/// Guarantees generated source ends with a newline.
fn ensure_trailing_newline(mut content: String) -> String {
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content
}
