//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory — called at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod huggingface;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and an optional API key.
///
/// `api_key` is sourced from the environment (never TOML) and is `None`
/// for keyless endpoints.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "huggingface" | "hf" => {
            let p = huggingface::HuggingFaceProvider::new(&config.huggingface, api_key)?;
            Ok(LlmProvider::HuggingFace(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn builds_dummy() {
        let cfg = Config::test_default();
        let p = build(&cfg.llm, None).unwrap();
        assert_eq!(p.name(), "dummy");
    }

    #[test]
    fn builds_huggingface_with_alias() {
        let mut cfg = Config::test_default();
        cfg.llm.provider = "hf".into();
        let p = build(&cfg.llm, Some("key".into())).unwrap();
        assert_eq!(p.name(), "huggingface");
    }

    #[test]
    fn unknown_provider_errors() {
        let mut cfg = Config::test_default();
        cfg.llm.provider = "openai".into();
        match build(&cfg.llm, None) {
            Err(ProviderError::UnknownProvider(name)) => assert_eq!(name, "openai"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
