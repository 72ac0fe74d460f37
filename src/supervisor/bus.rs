//! Supervisor event bus — typed request/reply messages between subsystems.
//!
//! Every request carries a `method` string (`"prefix/component/action"`)
//! and a [`BusPayload`], plus a oneshot slot for the [`BusResult`].  The
//! supervisor routes on the first `/`-delimited segment; see
//! [`crate::supervisor::run`].

use std::{error::Error, fmt};

use tokio::sync::{mpsc, oneshot};

use crate::subsystems::memory::ConversationId;

// ── Error codes ───────────────────────────────────────────────────────────────

/// No handler (or agent) owns the requested method.
pub const ERR_METHOD_NOT_FOUND: i32 = -32601;
/// Downstream failure (provider request failed, bus dropped, …).
pub const ERR_INTERNAL: i32 = -32000;
/// The LLM answered but without usable generated text.
pub const ERR_MALFORMED_RESPONSE: i32 = -32001;

// ── Payloads ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum BusPayload {
    /// A user message from a comms channel, or the text reply to one.
    CommsMessage {
        channel_id: String,
        conversation_id: ConversationId,
        content: String,
    },
    /// Start a fresh session for a conversation (e.g. Telegram `/start`).
    SessionReset {
        channel_id: String,
        conversation_id: ConversationId,
    },
    /// Prompt text for the LLM subsystem.
    LlmRequest {
        channel_id: String,
        content: String,
    },
    /// Generated text from the LLM subsystem.
    LlmReply {
        content: String,
    },
}

/// Application-level error carried back over the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusError {
    pub code: i32,
    pub message: String,
}

impl BusError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for BusError {}

pub type BusResult = Result<BusPayload, BusError>;

// ── Messages ──────────────────────────────────────────────────────────────────

/// Internal messages delivered to the supervisor loop.
#[derive(Debug)]
pub enum BusMessage {
    Request {
        method: String,
        payload: BusPayload,
        reply_tx: oneshot::Sender<BusResult>,
    },
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Client-facing handle for the bus.  Cheap to clone.
#[derive(Clone)]
pub struct BusHandle {
    tx: mpsc::Sender<BusMessage>,
}

impl BusHandle {
    pub fn new(tx: mpsc::Sender<BusMessage>) -> Self {
        Self { tx }
    }

    /// Send a request and await its reply.
    pub async fn request(
        &self,
        method: impl Into<String>,
        payload: BusPayload,
    ) -> Result<BusResult, BusCallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(BusMessage::Request { method: method.into(), payload, reply_tx })
            .await
            .map_err(|_| BusCallError::Send)?;

        reply_rx.await.map_err(|_| BusCallError::Recv)
    }
}

/// Owns the supervisor-side bus receiver.
pub struct SupervisorBus {
    pub rx: mpsc::Receiver<BusMessage>,
    pub handle: BusHandle,
}

impl SupervisorBus {
    pub fn new(buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer);
        Self { rx, handle: BusHandle::new(tx) }
    }
}

/// Call-level transport errors for bus requests.
#[derive(Debug)]
pub enum BusCallError {
    Send,
    Recv,
}

impl fmt::Display for BusCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusCallError::Send => write!(f, "bus send failed: supervisor is not running"),
            BusCallError::Recv => write!(f, "bus recv failed: handler dropped reply sender"),
        }
    }
}

impl Error for BusCallError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_round_trip() {
        let mut bus = SupervisorBus::new(4);
        let handle = bus.handle.clone();

        tokio::spawn(async move {
            if let Some(BusMessage::Request { method, payload, reply_tx }) = bus.rx.recv().await {
                assert_eq!(method, "llm/complete");
                let BusPayload::LlmRequest { content, .. } = payload else {
                    panic!("unexpected payload");
                };
                let _ = reply_tx.send(Ok(BusPayload::LlmReply { content: content.to_uppercase() }));
            }
        });

        let reply = handle
            .request("llm/complete", BusPayload::LlmRequest { channel_id: "t".into(), content: "hi".into() })
            .await
            .unwrap();
        assert_eq!(reply, Ok(BusPayload::LlmReply { content: "HI".into() }));
    }

    #[tokio::test]
    async fn request_after_supervisor_gone_is_send_error() {
        let bus = SupervisorBus::new(1);
        let handle = bus.handle.clone();
        drop(bus);
        let err = handle
            .request("agents", BusPayload::LlmReply { content: String::new() })
            .await
            .unwrap_err();
        assert!(matches!(err, BusCallError::Send));
    }

    #[tokio::test]
    async fn dropped_reply_is_recv_error() {
        let mut bus = SupervisorBus::new(1);
        let handle = bus.handle.clone();
        tokio::spawn(async move {
            // Receive and drop the reply sender without answering.
            let _ = bus.rx.recv().await;
        });
        let err = handle
            .request("agents", BusPayload::LlmReply { content: String::new() })
            .await
            .unwrap_err();
        assert!(matches!(err, BusCallError::Recv));
    }

    #[test]
    fn bus_error_display() {
        let e = BusError::new(ERR_METHOD_NOT_FOUND, "method not found: x");
        assert_eq!(e.to_string(), "[-32601] method not found: x");
    }
}
