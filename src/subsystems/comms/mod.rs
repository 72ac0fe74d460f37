//! Comms subsystem — manages all external I/O channels.
//!
//! Each channel (PTY, Telegram) implements [`Component`] and is spawned as an
//! independent task by [`start`] via [`spawn_components`].  Channels capture
//! their shared [`Arc<CommsState>`] at construction time.
//!
//! An intra-subsystem [`mpsc`] channel lets running channels signal the comms
//! manager (lifecycle events, session starts).  It is drained by a
//! background task that ends once every channel sender is dropped.

mod state;
#[cfg(feature = "channel-pty")]
pub mod pty;
#[cfg(feature = "channel-telegram")]
pub mod telegram;

pub use state::{CommsEvent, CommsState, INTERNAL_ERROR_REPLY};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};
use crate::supervisor::bus::BusHandle;

/// What an inbound line of user text asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// `/start` — reset the conversation and greet.
    Start,
    /// Plain text for the agent.
    Text(&'a str),
    /// Blank input or an unsupported command.
    Ignore,
}

/// Classify raw user input.  Accepts the Telegram `/start@botname` form.
///
/// Whitespace is ignored when detecting commands and blank input; text is
/// passed through untouched.
pub fn classify(input: &str) -> Inbound<'_> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Inbound::Ignore;
    }
    if let Some(command) = trimmed.strip_prefix('/') {
        let name = command.split(|c: char| c.is_whitespace() || c == '@').next().unwrap_or_default();
        return if name == "start" { Inbound::Start } else { Inbound::Ignore };
    }
    Inbound::Text(input)
}

/// Spawn all configured comms channels and return a [`SubsystemHandle`].
///
/// Synchronous: returns as soon as the tasks are spawned.  If any channel
/// exits with an error the shared `shutdown` token is cancelled.
pub fn start(config: &Config, bus: BusHandle, shutdown: CancellationToken) -> SubsystemHandle {
    let (event_tx, event_rx) = mpsc::channel::<CommsEvent>(32);
    let state = Arc::new(CommsState::new(bus, event_tx, config.chat.thinking_message.clone()));

    let mut components: Vec<Box<dyn Component>> = Vec::new();

    #[cfg(feature = "channel-pty")]
    {
        if config.comms_pty_should_load() {
            info!("loading pty channel");
            components.push(Box::new(pty::PtyChannel::new("pty0", config.bot_name.clone(), state.clone())));
        }
    }

    #[cfg(feature = "channel-telegram")]
    {
        if config.comms_telegram_should_load() {
            info!("loading telegram channel");
            components.push(Box::new(telegram::TelegramChannel::new("telegram0", state.clone())));
        }
    }

    if components.is_empty() {
        info!("no comms channels configured");
    }

    // Dropping our copy leaves the channels as the only senders.
    drop(state);

    tokio::spawn(async move {
        let mut rx = event_rx;
        while let Some(event) = rx.recv().await {
            match event {
                CommsEvent::ChannelShutdown { channel_id } => {
                    debug!(%channel_id, "channel reported shutdown");
                }
                CommsEvent::SessionStarted { channel_id, conversation_id } => {
                    debug!(%channel_id, %conversation_id, "conversation started");
                }
            }
        }
    });

    spawn_components(components, shutdown)
}
