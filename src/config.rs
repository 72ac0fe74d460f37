//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `RELAY_LOG_LEVEL` and `RELAY_LOG_FILE` env overrides.
//! Secrets (`LLM_API_KEY`, `TELEGRAM_BOT_TOKEN`) are never read from TOML.

use std::{
    collections::{HashMap, HashSet},
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

/// PTY (console) channel configuration.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Whether the PTY channel is explicitly enabled.
    pub enabled: bool,
}

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Whether the Telegram channel is explicitly enabled.
    pub enabled: bool,
}

/// Comms subsystem configuration.
#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub pty: PtyConfig,
    pub telegram: TelegramConfig,
}

/// Hugging Face Inference API provider configuration.
/// Populated from `[llm.huggingface]` in the TOML.
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    /// Full model endpoint URL (`.../models/<owner>/<model>`).
    pub api_base_url: String,
    /// `parameters.max_new_tokens` in the request body.
    pub max_new_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Ask the API to block until a cold model is loaded instead of failing.
    pub wait_for_model: bool,
    /// Sent as `parameters.return_full_text` only when set.
    pub return_full_text: Option<bool>,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"`, `"huggingface"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    /// Config for the Hugging Face provider (`[llm.huggingface]`).
    pub huggingface: HuggingFaceConfig,
}

/// Agents subsystem configuration.
#[derive(Debug, Clone)]
pub struct AgentsConfig {
    /// Agent that handles messages with no explicit routing.
    pub default_agent: String,
    /// channel_id -> agent_id overrides (from `[agents.routing]`).
    pub channel_map: HashMap<String, String>,
    /// Set of agent IDs whose config section has `enabled` != false.
    pub enabled: HashSet<String>,
}

/// User-facing canned replies (`[chat]`).
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Reply to `/start`.
    pub greeting: String,
    /// Sent by channels that acknowledge a message before the model answers.
    pub thinking_message: String,
    /// Reply when the model answer has no recognisable generated text.
    pub fallback_reply: String,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    /// Append logs here instead of stderr (already expanded, no `~`).
    pub log_file: Option<PathBuf>,
    pub comms: CommsConfig,
    pub agents: AgentsConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` (or `HF_API_KEY`) — `None` for keyless
    /// endpoints. Never sourced from TOML.
    pub llm_api_key: Option<String>,
    /// History caps (from `[memory.history]`).
    pub memory_max_turns: Option<usize>,
    pub memory_max_conversations: Option<usize>,
    pub chat: ChatConfig,
}

impl Config {
    /// Returns `true` if the PTY channel should be loaded.
    pub fn comms_pty_should_load(&self) -> bool {
        self.comms.pty.enabled
    }

    /// Returns `true` if the Telegram channel should be loaded.
    pub fn comms_telegram_should_load(&self) -> bool {
        self.comms.telegram.enabled
    }
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    supervisor: RawSupervisor,
    #[serde(default)]
    comms: RawComms,
    #[serde(default)]
    agents: RawAgents,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    memory: RawMemory,
    #[serde(default)]
    chat: RawChat,
}

#[derive(Deserialize)]
struct RawSupervisor {
    bot_name: String,
    log_level: String,
    #[serde(default)]
    log_file: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawComms {
    #[serde(default)]
    pty: RawPty,
    #[serde(default)]
    telegram: RawTelegram,
}

#[derive(Deserialize)]
struct RawPty {
    /// Defaults to `true`: a console is available unless switched off.
    #[serde(default = "default_true")]
    enabled: bool,
}

#[derive(Deserialize)]
struct RawTelegram {
    /// Defaults to `false`: Telegram must be explicitly enabled.
    #[serde(default = "default_false")]
    enabled: bool,
}

impl Default for RawPty {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for RawTelegram {
    fn default() -> Self {
        Self { enabled: false }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    huggingface: RawHuggingFaceConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), huggingface: RawHuggingFaceConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawHuggingFaceConfig {
    #[serde(default = "default_hf_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_hf_max_new_tokens")]
    max_new_tokens: u32,
    #[serde(default = "default_hf_temperature")]
    temperature: f32,
    #[serde(default = "default_true")]
    wait_for_model: bool,
    #[serde(default)]
    return_full_text: Option<bool>,
    #[serde(default = "default_hf_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawHuggingFaceConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_hf_api_base_url(),
            max_new_tokens: default_hf_max_new_tokens(),
            temperature: default_hf_temperature(),
            wait_for_model: true,
            return_full_text: None,
            timeout_seconds: default_hf_timeout_seconds(),
        }
    }
}

fn default_llm_provider() -> String { "dummy".to_string() }
fn default_hf_api_base_url() -> String {
    "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct-v0.3".to_string()
}
fn default_hf_max_new_tokens() -> u32 { 512 }
fn default_hf_temperature() -> f32 { 0.7 }
fn default_hf_timeout_seconds() -> u64 { 120 }

#[derive(Deserialize)]
struct RawAgents {
    /// `default = "..."` in `[agents]` — which agent handles unrouted messages.
    #[serde(rename = "default", default = "default_agent_name")]
    default_agent: String,
    /// `[agents.routing]` — channel_id -> agent_id overrides.
    #[serde(default)]
    routing: HashMap<String, String>,
    /// All other `[agents.<id>]` subsections — one entry per configured agent.
    #[serde(flatten)]
    entries: HashMap<String, RawAgentEntry>,
}

#[derive(Deserialize)]
struct RawAgentEntry {
    /// Defaults to `true`; set to `false` to disable without removing the section.
    #[serde(default = "default_true")]
    enabled: bool,
}

impl Default for RawAgents {
    fn default() -> Self {
        Self { default_agent: default_agent_name(), routing: HashMap::new(), entries: HashMap::new() }
    }
}

fn default_agent_name() -> String { "chat".to_string() }

#[derive(Deserialize, Default)]
struct RawMemory {
    #[serde(default)]
    history: RawHistoryConfig,
}

#[derive(Deserialize, Default)]
struct RawHistoryConfig {
    max_turns: Option<usize>,
    max_conversations: Option<usize>,
}

#[derive(Deserialize)]
struct RawChat {
    #[serde(default = "default_greeting")]
    greeting: String,
    #[serde(default = "default_thinking_message")]
    thinking_message: String,
    #[serde(default = "default_fallback_reply")]
    fallback_reply: String,
}

impl Default for RawChat {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            thinking_message: default_thinking_message(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

fn default_greeting() -> String {
    "Hi! I'm an AI bot powered by Mistral-7B-Instruct. Ask me anything.".to_string()
}
fn default_thinking_message() -> String { "Please wait, I'm thinking...".to_string() }
fn default_fallback_reply() -> String { "I can't answer that.".to_string() }

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

/// Load config from `config/default.toml`, then apply env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let log_level_override = env::var("RELAY_LOG_LEVEL").ok();
    let log_file_override = env::var("RELAY_LOG_FILE").ok();
    load_from(
        Path::new("config/default.toml"),
        log_level_override.as_deref(),
        log_file_override.as_deref(),
    )
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    log_level_override: Option<&str>,
    log_file_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    parse(&raw, path, log_level_override, log_file_override)
}

fn parse(
    raw: &str,
    path: &Path,
    log_level_override: Option<&str>,
    log_file_override: Option<&str>,
) -> Result<Config, AppError> {
    let parsed: RawConfig = toml::from_str(raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let s = parsed.supervisor;

    let log_level = log_level_override.unwrap_or(&s.log_level).to_string();
    let log_file = log_file_override
        .map(str::to_string)
        .or(s.log_file)
        .filter(|p| !p.is_empty())
        .map(|p| expand_home(&p));

    let hf = parsed.llm.huggingface;
    if hf.timeout_seconds == 0 {
        return Err(AppError::Config("llm.huggingface.timeout_seconds must be > 0".into()));
    }

    Ok(Config {
        bot_name: s.bot_name,
        log_level,
        log_file,
        comms: CommsConfig {
            pty: PtyConfig { enabled: parsed.comms.pty.enabled },
            telegram: TelegramConfig { enabled: parsed.comms.telegram.enabled },
        },
        agents: AgentsConfig {
            default_agent: parsed.agents.default_agent,
            channel_map: parsed.agents.routing,
            enabled: parsed.agents.entries
                .into_iter()
                .filter(|(_, e)| e.enabled)
                .map(|(id, _)| id)
                .collect(),
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            huggingface: HuggingFaceConfig {
                api_base_url: hf.api_base_url.trim().to_string(),
                max_new_tokens: hf.max_new_tokens,
                temperature: hf.temperature,
                wait_for_model: hf.wait_for_model,
                return_full_text: hf.return_full_text,
                timeout_seconds: hf.timeout_seconds,
            },
        },
        llm_api_key: env::var("LLM_API_KEY")
            .or_else(|_| env::var("HF_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty()),
        memory_max_turns: parsed.memory.history.max_turns,
        memory_max_conversations: parsed.memory.history.max_conversations,
        chat: ChatConfig {
            greeting: parsed.chat.greeting,
            thinking_message: parsed.chat.thinking_message,
            fallback_reply: parsed.chat.fallback_reply,
        },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return home;
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — dummy LLM, no API keys, no external calls.
#[cfg(test)]
impl Config {
    pub fn test_default() -> Self {
        Self {
            bot_name: "test".into(),
            log_level: "info".into(),
            log_file: None,
            comms: CommsConfig {
                pty: PtyConfig { enabled: true },
                telegram: TelegramConfig { enabled: false },
            },
            agents: AgentsConfig {
                default_agent: "chat".into(),
                enabled: HashSet::from(["chat".to_string(), "basic_chat".to_string()]),
                channel_map: HashMap::new(),
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                huggingface: HuggingFaceConfig {
                    api_base_url: "http://localhost:0/models/test".into(),
                    max_new_tokens: 16,
                    temperature: 0.0,
                    wait_for_model: false,
                    return_full_text: None,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
            memory_max_turns: None,
            memory_max_conversations: None,
            chat: ChatConfig {
                greeting: default_greeting(),
                thinking_message: default_thinking_message(),
                fallback_reply: default_fallback_reply(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[supervisor]
bot_name = "test-bot"
log_level = "info"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_basic_config() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.bot_name, "test-bot");
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.log_file.is_none());
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert!(cfg.comms_pty_should_load());
        assert!(!cfg.comms_telegram_should_load());
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.llm.huggingface.max_new_tokens, 512);
        assert!((cfg.llm.huggingface.temperature - 0.7).abs() < f32::EPSILON);
        assert!(cfg.llm.huggingface.wait_for_model);
        assert!(cfg.llm.huggingface.return_full_text.is_none());
        assert!(cfg.llm.huggingface.api_base_url.ends_with("Mistral-7B-Instruct-v0.3"));
        assert_eq!(cfg.agents.default_agent, "chat");
        assert!(cfg.agents.enabled.is_empty());
        assert!(cfg.memory_max_turns.is_none());
        assert_eq!(cfg.chat.fallback_reply, "I can't answer that.");
    }

    #[test]
    fn full_config_parses() {
        let f = write_toml(
            r#"
[supervisor]
bot_name = "relay"
log_level = "debug"
log_file = "bot.log"

[comms.pty]
enabled = false

[comms.telegram]
enabled = true

[agents]
default = "basic_chat"

[agents.routing]
pty0 = "chat"

[agents.chat]

[agents.basic_chat]

[agents.retired]
enabled = false

[llm]
default = "huggingface"

[llm.huggingface]
api_base_url = " https://example.test/models/m "
max_new_tokens = 64
temperature = 0.1
wait_for_model = false
return_full_text = false
timeout_seconds = 30

[memory.history]
max_turns = 6
max_conversations = 100

[chat]
greeting = "hey"
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.log_file, Some(PathBuf::from("bot.log")));
        assert!(!cfg.comms_pty_should_load());
        assert!(cfg.comms_telegram_should_load());
        assert_eq!(cfg.agents.default_agent, "basic_chat");
        assert_eq!(cfg.agents.channel_map.get("pty0").map(String::as_str), Some("chat"));
        assert!(cfg.agents.enabled.contains("chat"));
        assert!(cfg.agents.enabled.contains("basic_chat"));
        assert!(!cfg.agents.enabled.contains("retired"));
        assert_eq!(cfg.llm.provider, "huggingface");
        assert_eq!(cfg.llm.huggingface.api_base_url, "https://example.test/models/m");
        assert_eq!(cfg.llm.huggingface.max_new_tokens, 64);
        assert!(!cfg.llm.huggingface.wait_for_model);
        assert_eq!(cfg.llm.huggingface.return_full_text, Some(false));
        assert_eq!(cfg.llm.huggingface.timeout_seconds, 30);
        assert_eq!(cfg.memory_max_turns, Some(6));
        assert_eq!(cfg.memory_max_conversations, Some(100));
        assert_eq!(cfg.chat.greeting, "hey");
        assert_eq!(cfg.chat.thinking_message, "Please wait, I'm thinking...");
    }

    #[test]
    fn agents_without_default_key_uses_chat() {
        let f = write_toml(&format!("{MINIMAL_TOML}\n[agents.routing]\npty0 = \"basic_chat\"\n"));
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.agents.default_agent, "chat");
        assert_eq!(cfg.agents.channel_map.len(), 1);
    }

    #[test]
    fn zero_timeout_rejected() {
        let f = write_toml(
            r#"
[supervisor]
bot_name = "x"
log_level = "info"

[llm.huggingface]
timeout_seconds = 0
"#,
        );
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
    }

    #[test]
    fn missing_supervisor_section_errors() {
        let f = write_toml("[llm]\ndefault = \"dummy\"\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("parse error"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.relay/bot.log");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with("bot.log"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn relative_path_unchanged() {
        assert_eq!(expand_home("relative/path"), PathBuf::from("relative/path"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None, None);
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn env_log_level_override() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("debug"), None).unwrap();
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn env_log_file_override() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, Some("/tmp/relay.log")).unwrap();
        assert_eq!(cfg.log_file, Some(PathBuf::from("/tmp/relay.log")));
    }

    #[test]
    fn empty_log_file_means_stderr() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, Some("")).unwrap();
        assert!(cfg.log_file.is_none());
    }
}
