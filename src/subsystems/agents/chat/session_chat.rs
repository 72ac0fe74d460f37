//! `chat` agent plugin — history-aware chat built on [`ChatCore`].
//!
//! Each exchange holds the conversation's exchange lock from prompt
//! construction until the reply is recorded, so two messages in the same
//! conversation never interleave.  Only successful replies become `Bot`
//! turns.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::debug;

use super::super::{Agent, AgentRequest, AgentsState};
use super::core::{ChatCore, Completion};
use crate::supervisor::bus::{BusPayload, BusResult};

pub(crate) struct SessionChatPlugin;

impl Agent for SessionChatPlugin {
    fn id(&self) -> &str { "chat" }

    fn handle(&self, request: AgentRequest, reply_tx: oneshot::Sender<BusResult>, state: Arc<AgentsState>) {
        tokio::spawn(async move {
            let reply = match request {
                AgentRequest::Reset { channel_id, conversation_id } => {
                    let gate = state.history.exchange_lock(&conversation_id);
                    let _guard = gate.lock().await;
                    state.history.reset(&conversation_id);
                    debug!(%conversation_id, "conversation reset");
                    BusPayload::CommsMessage {
                        channel_id,
                        conversation_id,
                        content: state.chat.greeting.clone(),
                    }
                }
                AgentRequest::Message { channel_id, conversation_id, content } => {
                    let gate = state.history.exchange_lock(&conversation_id);
                    let _guard = gate.lock().await;

                    let prompt = state.history.build_prompt(&conversation_id, &content);
                    let completion = ChatCore::complete(&state, &channel_id, &prompt).await;
                    if let Completion::Reply(text) = &completion {
                        state.history.record_response(&conversation_id, text);
                    } else {
                        debug!(%conversation_id, "exchange failed; no bot turn recorded");
                    }

                    BusPayload::CommsMessage {
                        channel_id,
                        conversation_id,
                        content: completion.into_user_text(&state.chat.fallback_reply),
                    }
                }
            };
            let _ = reply_tx.send(Ok(reply));
        });
    }
}
