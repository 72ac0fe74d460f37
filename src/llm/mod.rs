//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities; clone them freely.
//! The `complete` method is `async fn` on the enum so callers need no
//! trait-object machinery.

pub mod providers;

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    /// Transport failure, timeout, non-JSON body, or an error payload from
    /// the endpoint.  Never retried.
    #[error("provider request failed: {0}")]
    Request(String),
    /// The endpoint answered with JSON but no recognisable generated text.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    HuggingFace(providers::huggingface::HuggingFaceProvider),
}

impl LlmProvider {
    /// Send `prompt` to the provider and return its generated text.
    pub async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(prompt).await,
            LlmProvider::HuggingFace(p) => p.complete(prompt).await,
        }
    }

    /// Short provider name for logs and the startup banner.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            LlmProvider::HuggingFace(_) => "huggingface",
        }
    }
}
