//! LLM subsystem — routes `llm/*` bus requests to the configured provider.
//!
//! Implements [`BusHandler`] with prefix `"llm"` so the supervisor can
//! register it generically.  Each request is resolved in a spawned task;
//! the supervisor loop is never blocked on I/O.

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::llm::providers;
use crate::llm::{LlmProvider, ProviderError};
use crate::supervisor::bus::{
    BusError, BusPayload, BusResult, ERR_INTERNAL, ERR_MALFORMED_RESPONSE, ERR_METHOD_NOT_FOUND,
};
use crate::supervisor::dispatch::BusHandler;

pub struct LlmSubsystem {
    provider: LlmProvider,
}

impl LlmSubsystem {
    /// Construct the subsystem. `api_key` comes from the environment, never TOML.
    pub fn new(config: &LlmConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        let provider = providers::build(config, api_key)?;
        Ok(Self { provider })
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

/// Map a provider failure onto the bus error vocabulary.
fn to_bus_error(e: ProviderError) -> BusError {
    match e {
        ProviderError::MalformedResponse(msg) => BusError::new(ERR_MALFORMED_RESPONSE, msg),
        ProviderError::Request(msg) => BusError::new(ERR_INTERNAL, msg),
        other => BusError::new(ERR_INTERNAL, other.to_string()),
    }
}

impl BusHandler for LlmSubsystem {
    fn prefix(&self) -> &str {
        "llm"
    }

    /// Route an `llm/*` request. Ownership of `reply_tx` is moved into a
    /// spawned task so the supervisor loop returns immediately.
    fn handle_request(&self, method: &str, payload: BusPayload, reply_tx: oneshot::Sender<BusResult>) {
        match payload {
            BusPayload::LlmRequest { channel_id, content } => {
                let provider = self.provider.clone();
                debug!(%method, %channel_id, provider = provider.name(), "dispatching to llm provider");
                tokio::spawn(async move {
                    let result = provider
                        .complete(&content)
                        .await
                        .map(|text| BusPayload::LlmReply { content: text })
                        .map_err(|e| {
                            warn!(%channel_id, error = %e, "llm completion failed");
                            to_bus_error(e)
                        });
                    let _ = reply_tx.send(result);
                });
            }
            _ => {
                let _ = reply_tx.send(Err(BusError::new(
                    ERR_METHOD_NOT_FOUND,
                    format!("unsupported payload for method: {method}"),
                )));
            }
        }
    }
}
