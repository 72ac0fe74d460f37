//! The shipped `config/default.toml` must always parse.

use std::path::Path;

use relay_bot::config::load_from;

fn shipped_config() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml")
}

#[test]
fn shipped_config_parses() {
    let cfg = load_from(&shipped_config(), None, None).expect("config/default.toml should parse");
    assert_eq!(cfg.llm.provider, "huggingface");
    assert_eq!(cfg.llm.huggingface.max_new_tokens, 512);
    assert!(cfg.llm.huggingface.wait_for_model);
    assert_eq!(cfg.memory_max_turns, Some(10));
    assert!(cfg.comms_telegram_should_load());
    assert!(!cfg.comms_pty_should_load());
    assert!(cfg.agents.enabled.contains(&cfg.agents.default_agent));
}

#[test]
fn shipped_config_accepts_overrides() {
    let cfg = load_from(&shipped_config(), Some("debug"), Some("")).unwrap();
    assert_eq!(cfg.log_level, "debug");
    assert_eq!(cfg.log_file, None);
}
