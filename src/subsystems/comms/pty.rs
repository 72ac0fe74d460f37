//! PTY (console) comms channel — reads lines from stdin, sends them to the
//! agents subsystem, prints the reply to stdout.
//!
//! The whole console is one conversation keyed by the channel id.  `/start`
//! resets it.  Runs until the `shutdown` token is cancelled (Ctrl-C) or
//! stdin is closed.

use std::io::Write as _;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{CommsEvent, CommsState};
use super::{Inbound, classify};
use crate::error::AppError;
use crate::subsystems::memory::ConversationId;
use crate::subsystems::runtime::{Component, ComponentFuture};

pub struct PtyChannel {
    channel_id: String,
    bot_name: String,
    state: Arc<CommsState>,
}

impl PtyChannel {
    pub fn new(channel_id: impl Into<String>, bot_name: impl Into<String>, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), bot_name: bot_name.into(), state }
    }
}

impl Component for PtyChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_pty(self.channel_id, self.bot_name, self.state, shutdown))
    }
}

async fn run_pty(
    channel_id: String,
    bot_name: String,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(%channel_id, "pty channel started");
    println!("─────────────────────────────────");
    println!(" {bot_name} console  (/start resets, Ctrl-C quits)");
    println!("─────────────────────────────────");

    let conversation_id = ConversationId::new(channel_id.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!(%channel_id, "pty channel shutting down");
                break;
            }

            line = lines.next_line() => {
                let input = match line {
                    Err(e) => {
                        warn!(%channel_id, "pty read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!(%channel_id, "pty stdin closed");
                        break;
                    }
                    Ok(Some(input)) => input,
                };

                let reply = match classify(&input) {
                    Inbound::Ignore => continue,
                    Inbound::Start => state.reset_session(&channel_id, conversation_id.clone()).await,
                    Inbound::Text(text) => {
                        debug!(%channel_id, input = %text, "pty received line");
                        println!("{}", state.thinking_message);
                        state.send_message(&channel_id, conversation_id.clone(), text.to_string()).await
                    }
                };

                match reply {
                    Ok(text) if text.is_empty() => println!("(empty response)"),
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        warn!(%channel_id, "send_message error: {e}, pty exiting");
                        break;
                    }
                }
            }
        }
    }

    state.report_event(CommsEvent::ChannelShutdown { channel_id });
    Ok(())
}
