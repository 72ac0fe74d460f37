//! Shared state for the comms subsystem — capability boundary for channels.
//!
//! Channels receive an `Arc<CommsState>` and are restricted to the typed
//! methods below.  The raw [`BusHandle`] is private; channels cannot call
//! arbitrary bus methods.
//!
//! [`CommsState::report_event`] lets a running channel signal the comms
//! manager (e.g. "I shut down") without going through the supervisor bus.

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::AppError;
use crate::subsystems::memory::ConversationId;
use crate::supervisor::bus::{BusHandle, BusPayload};

/// Generic reply when the agents subsystem could not be reached.
pub const INTERNAL_ERROR_REPLY: &str = "Internal error processing message.";

// ── Events ────────────────────────────────────────────────────────────────────

/// Events a channel sends back to the comms manager.
#[derive(Debug)]
pub enum CommsEvent {
    /// Channel has stopped (clean exit or EOF).
    ChannelShutdown { channel_id: String },
    /// A user started (or restarted) a conversation on the channel.
    SessionStarted { channel_id: String, conversation_id: ConversationId },
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Shared state passed as `Arc<CommsState>` to every channel task.
pub struct CommsState {
    bus: BusHandle,
    event_tx: mpsc::Sender<CommsEvent>,
    /// Notice sent before a potentially slow model call.
    pub thinking_message: String,
}

impl CommsState {
    pub fn new(bus: BusHandle, event_tx: mpsc::Sender<CommsEvent>, thinking_message: impl Into<String>) -> Self {
        Self { bus, event_tx, thinking_message: thinking_message.into() }
    }

    /// Send a user message to the agents subsystem and await the reply text.
    pub async fn send_message(
        &self,
        channel_id: &str,
        conversation_id: ConversationId,
        content: String,
    ) -> Result<String, AppError> {
        self.call_agents(BusPayload::CommsMessage {
            channel_id: channel_id.to_string(),
            conversation_id,
            content,
        })
        .await
    }

    /// Ask the agents subsystem to start the conversation over; returns the
    /// greeting to show.
    pub async fn reset_session(&self, channel_id: &str, conversation_id: ConversationId) -> Result<String, AppError> {
        self.report_event(CommsEvent::SessionStarted {
            channel_id: channel_id.to_string(),
            conversation_id: conversation_id.clone(),
        });
        self.call_agents(BusPayload::SessionReset { channel_id: channel_id.to_string(), conversation_id })
            .await
    }

    async fn call_agents(&self, payload: BusPayload) -> Result<String, AppError> {
        match self.bus.request("agents", payload).await {
            Err(e) => Err(AppError::Comms(format!("bus error: {e}"))),
            Ok(Err(e)) => Err(AppError::Comms(format!("agent error {}: {}", e.code, e.message))),
            Ok(Ok(BusPayload::CommsMessage { content, .. })) => Ok(content),
            Ok(Ok(_)) => Err(AppError::Comms("unexpected reply payload".to_string())),
        }
    }

    /// Report an event to the comms manager.
    ///
    /// Non-blocking: drops the event and logs a warning if the manager is
    /// not keeping up or has already exited.
    pub fn report_event(&self, event: CommsEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("comms event dropped: {e}");
        }
    }
}
