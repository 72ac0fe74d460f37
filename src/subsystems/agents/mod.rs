//! Agents subsystem — receives agent-targeted requests and routes to agents.
//!
//! [`Agent`] is the extension trait: each agent is a `Send + Sync` struct
//! registered in the subsystem by name.  Built-in agents are the chat family
//! (`basic_chat`, `chat`), which share logic through
//! [`chat::core::ChatCore`].
//!
//! [`AgentsSubsystem`] implements [`BusHandler`] with prefix `"agents"` and
//! is never blocked: agents spawn a task per request and resolve the reply
//! slot when done.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::{AgentsConfig, ChatConfig};
use crate::error::AppError;
use crate::subsystems::memory::{ConversationId, HistoryStore};
use crate::supervisor::bus::{
    BusError, BusHandle, BusPayload, BusResult, ERR_INTERNAL, ERR_METHOD_NOT_FOUND,
};
use crate::supervisor::dispatch::BusHandler;

#[cfg(any(feature = "plugin-basic-chat", feature = "plugin-chat"))]
mod chat;

// ── AgentsState ───────────────────────────────────────────────────────────────

/// Shared capability surface passed to agents.
///
/// The raw [`BusHandle`] is private; agents call typed methods and cannot
/// address arbitrary bus targets.
pub struct AgentsState {
    bus: BusHandle,
    /// Conversation history shared by history-aware agents.
    pub history: Arc<HistoryStore>,
    /// Canned user-facing replies.
    pub chat: ChatConfig,
}

impl AgentsState {
    pub fn new(bus: BusHandle, history: Arc<HistoryStore>, chat: ChatConfig) -> Self {
        Self { bus, history, chat }
    }

    /// Forward `prompt` to the LLM subsystem and return the completion.
    pub async fn complete_via_llm(&self, channel_id: &str, prompt: &str) -> BusResult {
        let result = self
            .bus
            .request(
                "llm/complete",
                BusPayload::LlmRequest {
                    channel_id: channel_id.to_string(),
                    content: prompt.to_string(),
                },
            )
            .await;
        match result {
            Ok(r) => r,
            Err(e) => Err(BusError::new(ERR_INTERNAL, e.to_string())),
        }
    }
}

// ── Agent trait ───────────────────────────────────────────────────────────────

/// What a comms channel asked an agent to do.
#[derive(Debug, Clone)]
pub enum AgentRequest {
    /// A user message to answer.
    Message {
        channel_id: String,
        conversation_id: ConversationId,
        content: String,
    },
    /// Start over: forget the conversation and greet.
    Reset {
        channel_id: String,
        conversation_id: ConversationId,
    },
}

impl AgentRequest {
    pub fn channel_id(&self) -> &str {
        match self {
            AgentRequest::Message { channel_id, .. } | AgentRequest::Reset { channel_id, .. } => channel_id,
        }
    }
}

/// An agent loaded by the agents subsystem.
///
/// Implementations must be `Send + Sync` and must not block the caller:
/// async work spawns a task and resolves `reply_tx` when done.
pub trait Agent: Send + Sync {
    /// Unique agent identifier (matches config name, e.g. `"chat"`).
    fn id(&self) -> &str;

    /// Handle an incoming request.
    fn handle(
        &self,
        request: AgentRequest,
        reply_tx: oneshot::Sender<BusResult>,
        state: Arc<AgentsState>,
    );
}

// ── AgentsSubsystem ───────────────────────────────────────────────────────────

/// Agents subsystem.
///
/// Method grammar:
/// - `agents`              -> routed agent (channel map, then default)
/// - `agents/{agent_id}`   -> explicit agent
pub struct AgentsSubsystem {
    state: Arc<AgentsState>,
    agents: HashMap<String, Box<dyn Agent>>,
    default_agent: String,
    channel_map: HashMap<String, String>,
}

impl AgentsSubsystem {
    /// Register the compiled-in agents that `config` enables.
    ///
    /// An empty enabled set enables every compiled-in agent.  Fails if the
    /// default agent ends up unavailable.
    pub fn new(config: AgentsConfig, state: AgentsState) -> Result<Self, AppError> {
        let mut available: Vec<Box<dyn Agent>> = Vec::new();

        #[cfg(feature = "plugin-basic-chat")]
        available.push(Box::new(chat::BasicChatPlugin));

        #[cfg(feature = "plugin-chat")]
        available.push(Box::new(chat::SessionChatPlugin));

        let enabled: HashSet<String> = config.enabled;
        for id in &enabled {
            if !available.iter().any(|a| a.id() == id) {
                warn!(agent = %id, "agent enabled in config but not compiled in — ignored");
            }
        }

        let agents: HashMap<String, Box<dyn Agent>> = available
            .into_iter()
            .filter(|a| enabled.is_empty() || enabled.contains(a.id()))
            .map(|a| (a.id().to_string(), a))
            .collect();

        if !agents.contains_key(&config.default_agent) {
            return Err(AppError::Config(format!(
                "default agent '{}' is not enabled (available: {})",
                config.default_agent,
                sorted_ids(&agents).join(", ")
            )));
        }

        info!(
            agents = ?sorted_ids(&agents),
            default = %config.default_agent,
            "agents ready"
        );

        Ok(Self {
            state: Arc::new(state),
            agents,
            default_agent: config.default_agent,
            channel_map: config.channel_map,
        })
    }

    /// Sorted ids of the loaded agents.
    pub fn agent_ids(&self) -> Vec<String> {
        sorted_ids(&self.agents)
    }

    fn resolve_agent(&self, method_agent_id: Option<&str>, channel_id: &str) -> Result<&dyn Agent, BusError> {
        if let Some(agent_id) = method_agent_id {
            return self
                .agents
                .get(agent_id)
                .map(|a| a.as_ref())
                .ok_or_else(|| BusError::new(ERR_METHOD_NOT_FOUND, format!("agent not found: {agent_id}")));
        }

        if let Some(mapped) = self.channel_map.get(channel_id)
            && let Some(agent) = self.agents.get(mapped)
        {
            return Ok(agent.as_ref());
        }

        self.agents
            .get(&self.default_agent)
            .map(|a| a.as_ref())
            .ok_or_else(|| BusError::new(ERR_METHOD_NOT_FOUND, format!("agent not found: {}", self.default_agent)))
    }
}

impl BusHandler for AgentsSubsystem {
    fn prefix(&self) -> &str {
        "agents"
    }

    fn handle_request(&self, method: &str, payload: BusPayload, reply_tx: oneshot::Sender<BusResult>) {
        let method_agent_id = match parse_method(method) {
            Ok(id) => id,
            Err(e) => {
                let _ = reply_tx.send(Err(e));
                return;
            }
        };

        let request = match payload {
            BusPayload::CommsMessage { channel_id, conversation_id, content } => {
                AgentRequest::Message { channel_id, conversation_id, content }
            }
            BusPayload::SessionReset { channel_id, conversation_id } => {
                AgentRequest::Reset { channel_id, conversation_id }
            }
            _ => {
                let _ = reply_tx.send(Err(BusError::new(
                    ERR_METHOD_NOT_FOUND,
                    format!("unsupported payload for method: {method}"),
                )));
                return;
            }
        };

        match self.resolve_agent(method_agent_id, request.channel_id()) {
            Ok(agent) => {
                debug!(agent = agent.id(), channel_id = request.channel_id(), "dispatching to agent");
                agent.handle(request, reply_tx, self.state.clone());
            }
            Err(e) => {
                let _ = reply_tx.send(Err(e));
            }
        }
    }
}

fn parse_method(method: &str) -> Result<Option<&str>, BusError> {
    let mut parts = method.split('/');
    let not_found = || BusError::new(ERR_METHOD_NOT_FOUND, format!("method not found: {method}"));

    if parts.next() != Some("agents") {
        return Err(not_found());
    }
    let agent_id = parts.next().filter(|s| !s.is_empty());
    if parts.next().is_some() {
        return Err(not_found());
    }
    Ok(agent_id)
}

fn sorted_ids(agents: &HashMap<String, Box<dyn Agent>>) -> Vec<String> {
    let mut ids: Vec<String> = agents.keys().cloned().collect();
    ids.sort();
    ids
}
