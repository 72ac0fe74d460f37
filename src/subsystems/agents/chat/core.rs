//! Shared chat logic used by all chat-family plugins.
//!
//! [`ChatCore`] turns the raw bus result of an LLM call into a
//! [`Completion`], so every chat variant reports failures to the user the
//! same way.

use crate::subsystems::agents::AgentsState;
use crate::supervisor::bus::{BusPayload, BusResult, ERR_MALFORMED_RESPONSE};

/// Outcome of one LLM round-trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Generated text, trimmed.
    Reply(String),
    /// The request failed (transport, HTTP status, or an API `error` field).
    Failed(String),
    /// The service answered, but without usable generated text.
    Malformed,
}

impl Completion {
    pub fn from_bus_result(result: BusResult) -> Self {
        match result {
            Ok(BusPayload::LlmReply { content }) => Completion::Reply(content),
            Ok(_) => Completion::Malformed,
            Err(e) if e.code == ERR_MALFORMED_RESPONSE => Completion::Malformed,
            Err(e) => Completion::Failed(e.message),
        }
    }

    /// The text shown to the user for this outcome.
    pub fn into_user_text(self, fallback: &str) -> String {
        match self {
            Completion::Reply(text) => text,
            Completion::Failed(msg) => format!("Error: {msg}"),
            Completion::Malformed => fallback.to_string(),
        }
    }
}

/// Reusable core for chat-family plugins.
///
/// Holds no state of its own; it operates on the shared [`AgentsState`]
/// passed into each call.
pub struct ChatCore;

impl ChatCore {
    /// Forward `prompt` to the LLM and classify the result.
    pub async fn complete(state: &AgentsState, channel_id: &str, prompt: &str) -> Completion {
        Completion::from_bus_result(state.complete_via_llm(channel_id, prompt).await)
    }
}
