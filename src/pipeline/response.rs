use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ChatError;

/// A span answer from an extractive QA model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaAnswer {
    pub answer: String,
    #[serde(default)]
    pub score: f32,
}

/// Raw output of a model backend, by backend shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// Free text, possibly with the prompt echoed in front of it.
    Generated(String),
    /// Span copied out of the supplied context.
    Extracted(QaAnswer),
}

/// Turn raw model output into the text shown to the user. Never fails: when
/// the expected delimiter is missing the trimmed raw text is returned.
pub fn extract_response(output: &ModelOutput, turn_delimiter: &str) -> String {
    match output {
        ModelOutput::Extracted(qa) => qa.answer.clone(),
        ModelOutput::Generated(text) => match after_last_delimiter(text, turn_delimiter) {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "returning raw completion");
                text.trim().to_string()
            }
        },
    }
}

fn after_last_delimiter(text: &str, delimiter: &str) -> Result<String, ChatError> {
    if delimiter.is_empty() {
        return Err(ChatError::ResponsePostprocess("empty turn delimiter".into()));
    }
    let idx = text.rfind(delimiter).ok_or_else(|| {
        ChatError::ResponsePostprocess(format!("turn delimiter {:?} not found", delimiter))
    })?;
    Ok(text[idx + delimiter.len()..].trim().to_string())
}
