//! `basic_chat` agent plugin — minimal LLM pass-through.
//!
//! Sends the user's text as the whole prompt; no history is kept.

use std::sync::Arc;

use tokio::sync::oneshot;

use super::super::{Agent, AgentRequest, AgentsState};
use super::core::ChatCore;
use crate::supervisor::bus::{BusPayload, BusResult};

pub(crate) struct BasicChatPlugin;

impl Agent for BasicChatPlugin {
    fn id(&self) -> &str { "basic_chat" }

    fn handle(&self, request: AgentRequest, reply_tx: oneshot::Sender<BusResult>, state: Arc<AgentsState>) {
        match request {
            AgentRequest::Reset { channel_id, conversation_id } => {
                let _ = reply_tx.send(Ok(BusPayload::CommsMessage {
                    channel_id,
                    conversation_id,
                    content: state.chat.greeting.clone(),
                }));
            }
            AgentRequest::Message { channel_id, conversation_id, content } => {
                // Spawn so the supervisor loop is not blocked on the LLM round-trip.
                tokio::spawn(async move {
                    let completion = ChatCore::complete(&state, &channel_id, &content).await;
                    let content = completion.into_user_text(&state.chat.fallback_reply);
                    let _ = reply_tx.send(Ok(BusPayload::CommsMessage { channel_id, conversation_id, content }));
                });
            }
        }
    }
}
