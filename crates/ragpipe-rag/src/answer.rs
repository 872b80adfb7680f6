use std::sync::Arc;

use tracing::debug;

use ragpipe_core::traits::CompletionService;
use ragpipe_core::types::ChatMessage;
use ragpipe_core::{Error, Result};

/// Render the context+question prompt. Both parts are interpolated verbatim.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!("Context: {context}\nQuestion: {query}\nAnswer:")
}

pub struct AnswerComposer {
    service: Arc<dyn CompletionService>,
}

impl AnswerComposer {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Send the prompt as one user message and return the first choice's
    /// text. No choices, or a first choice without content, is an error.
    pub fn compose_answer(&self, query: &str, context: &str) -> Result<String> {
        let prompt = build_prompt(query, context);
        debug!(prompt_chars = prompt.chars().count(), "composing answer");
        let completion = self
            .service
            .complete(&[ChatMessage::user(prompt)])
            .map_err(|e| Error::Completion(format!("{e:#}")))?;
        let first = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Completion("completion returned no choices".into()))?;
        first
            .message
            .content
            .ok_or_else(|| Error::Completion("first choice has no message content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_layout() {
        assert_eq!(build_prompt("Why?", "a\nb"), "Context: a\nb\nQuestion: Why?\nAnswer:");
    }

    #[test]
    fn prompt_keeps_long_context_intact() {
        let context = "z".repeat(50_000);
        let prompt = build_prompt("q", &context);
        assert!(prompt.contains(&context));
        assert!(prompt.starts_with("Context: ") && prompt.contains("\nQuestion: q\n") && prompt.ends_with("Answer:"));
    }
}
