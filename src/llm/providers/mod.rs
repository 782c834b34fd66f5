//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory, called at startup.

pub mod dummy;
pub mod openai_compatible;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and an optional API key.
///
/// `api_key` is sourced from `LLM_API_KEY` env (never TOML) and is `None`
/// for keyless local models.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider::default())),
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.timeout_seconds,
                api_key,
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::Path;

    #[test]
    fn builds_dummy_and_openai() {
        let mut cfg = Config::test_default(Path::new("/tmp")).llm;
        assert_eq!(build(&cfg, None).unwrap().name(), "dummy");
        cfg.provider = "openai".into();
        assert_eq!(build(&cfg, Some("k".into())).unwrap().name(), "openai");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let mut cfg = Config::test_default(Path::new("/tmp")).llm;
        cfg.provider = "nope".into();
        assert!(matches!(build(&cfg, None), Err(ProviderError::UnknownProvider(p)) if p == "nope"));
    }
}
