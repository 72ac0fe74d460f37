//! Telegram comms channel — long-polls the Bot API, forwards text to the
//! agents subsystem and replies in the same chat.
//!
//! Each Telegram chat is one conversation, keyed by the chat id.

use std::env;
use std::sync::Arc;

use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::state::{CommsState, INTERNAL_ERROR_REPLY};
use super::{Inbound, classify};
use crate::error::AppError;
use crate::subsystems::memory::ConversationId;
use crate::subsystems::runtime::{Component, ComponentFuture};

/// Telegram has a 4096 character limit per message.
/// We chunk at 4000 to be safe.
const MAX_MESSAGE_LENGTH: usize = 4000;

pub struct TelegramChannel {
    channel_id: String,
    state: Arc<CommsState>,
}

impl TelegramChannel {
    pub fn new(channel_id: impl Into<String>, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), state }
    }
}

impl Component for TelegramChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_telegram(self.channel_id, self.state, shutdown))
    }
}

async fn run_telegram(channel_id: String, state: Arc<CommsState>, shutdown: CancellationToken) -> Result<(), AppError> {
    let token = match env::var("TELEGRAM_BOT_TOKEN") {
        Ok(t) if !t.trim().is_empty() => t,
        _ => {
            warn!(%channel_id, "TELEGRAM_BOT_TOKEN not set, telegram channel exiting");
            return Ok(());
        }
    };

    info!(%channel_id, "telegram channel starting");

    let bot = Bot::new(token);

    let handler_state = state.clone();
    let handler_channel = channel_id.clone();

    let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
        let state = handler_state.clone();
        let channel_id = handler_channel.clone();
        async move {
            handle_message(&bot, &msg, &channel_id, &state).await;
            respond(())
        }
    });

    let mut dispatcher = Dispatcher::builder(bot, handler).build();

    tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
            info!(%channel_id, "shutdown signal received — closing telegram channel");
        }
        _ = dispatcher.dispatch() => {
            warn!(%channel_id, "telegram dispatcher exited unexpectedly");
        }
    }

    Ok(())
}

async fn handle_message(bot: &Bot, msg: &Message, channel_id: &str, state: &CommsState) {
    let Some(text) = msg.text() else {
        return;
    };

    let user_id = msg.from.as_ref().map(|u| u.id.0);
    let username = msg.from.as_ref().and_then(|u| u.username.clone());
    let conversation_id = ConversationId::from(msg.chat.id.0);

    let reply = match classify(text) {
        Inbound::Ignore => return,
        Inbound::Start => {
            info!(%channel_id, ?user_id, ?username, "start command");
            state.reset_session(channel_id, conversation_id).await
        }
        Inbound::Text(text) => {
            info!(%channel_id, ?user_id, ?username, message = %text, "telegram received message");
            if let Err(e) = bot.send_message(msg.chat.id, state.thinking_message.as_str()).await {
                warn!("failed to send thinking notice: {e}");
            }
            state.send_message(channel_id, conversation_id, text.to_string()).await
        }
    };

    let reply = reply.unwrap_or_else(|e| {
        warn!(%channel_id, "send_message error: {e}");
        INTERNAL_ERROR_REPLY.to_string()
    });

    for chunk in chunk_message(&reply) {
        if let Err(e) = bot.send_message(msg.chat.id, chunk).await {
            warn!("failed to send telegram reply: {e}");
        }
    }
}

/// Split `text` into Telegram-sized pieces on char boundaries.
fn chunk_message(text: &str) -> Vec<String> {
    if text.is_empty() {
        return vec!["(empty response)".to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(MAX_MESSAGE_LENGTH).map(|c| c.iter().collect()).collect()
}
