//! Dummy LLM provider: returns a canned reply without any network access.
//! Used for tests and for running the pipeline without an API key.

use crate::llm::ProviderError;

/// Reply used when none is configured: a valid, empty extraction result.
pub const EMPTY_EXTRACTION: &str = r#"{"entities": []}"#;

#[derive(Debug, Clone)]
pub struct DummyProvider {
    reply: String,
}

impl DummyProvider {
    /// Provider that always answers with `reply`.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }

    pub async fn complete(&self, _system: Option<&str>, _content: &str) -> Result<String, ProviderError> {
        Ok(self.reply.clone())
    }
}

impl Default for DummyProvider {
    fn default() -> Self {
        Self::with_reply(EMPTY_EXTRACTION)
    }
}
