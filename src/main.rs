//! Relay bot — supervisor entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Init logger once at the configured level
//!   4. Build the memory system and supervisor bus
//!   5. Spawn Ctrl-C → shutdown signal watcher
//!   6. Register llm + agents handlers and spawn the supervisor run-loop
//!   7. Run comms channels until they exit or shutdown is signalled
//!   8. Cancel token + join supervisor

use tokio_util::sync::CancellationToken;
use tracing::info;

use relay_bot::config::{self, Config};
use relay_bot::error::AppError;
use relay_bot::logger;
use relay_bot::subsystems::agents::{AgentsState, AgentsSubsystem};
use relay_bot::subsystems::comms;
use relay_bot::subsystems::llm::LlmSubsystem;
use relay_bot::subsystems::memory::{MemoryConfig, MemorySystem};
use relay_bot::supervisor::{self, bus::SupervisorBus, dispatch::BusHandler};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let config = config::load()?;

    logger::init(&config.log_level, false, config.log_file.as_deref())?;

    info!(
        bot_name = %config.bot_name,
        log_level = %config.log_level,
        log_file = ?config.log_file,
        "config loaded"
    );

    let memory = MemorySystem::new(MemoryConfig {
        max_turns: config.memory_max_turns,
        max_conversations: config.memory_max_conversations,
    });

    // Ctrl-C cancels this token; every task watches it.
    let shutdown = CancellationToken::new();

    let bus = SupervisorBus::new(64);
    let bus_handle = bus.handle.clone();

    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let llm = LlmSubsystem::new(&config.llm, config.llm_api_key.clone())?;
    let llm_provider = llm.provider_name();

    let agents = AgentsSubsystem::new(
        config.agents.clone(),
        AgentsState::new(bus_handle.clone(), memory.history(), config.chat.clone()),
    )?;
    let agent_ids = agents.agent_ids();

    let handlers: Vec<Box<dyn BusHandler>> = vec![Box::new(llm), Box::new(agents)];

    let sup_token = shutdown.clone();
    let sup_handle = tokio::spawn(async move {
        supervisor::run(bus, sup_token, handlers).await;
    });

    print_startup_summary(&config, llm_provider, &agent_ids);

    let comms = comms::start(&config, bus_handle, shutdown.clone());
    let comms_result = comms.join().await;

    // Channels may exit on their own (stdin EOF, missing token); stop the rest.
    shutdown.cancel();
    sup_handle.await.ok();

    comms_result
}

fn print_startup_summary(config: &Config, llm_provider: &str, agent_ids: &[String]) {
    let agents = agent_ids
        .iter()
        .map(|id| {
            if *id == config.agents.default_agent {
                format!("{id} (default)")
            } else {
                id.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let on_off = |enabled: bool| if enabled { "enabled" } else { "disabled" };

    println!("┌─ {} ─", config.bot_name);
    println!("│ pid        {}", std::process::id());
    println!("│ llm        {llm_provider}");
    println!("│ agents     {agents}");
    println!("│ pty        {}", on_off(config.comms_pty_should_load()));
    println!("│ telegram   {}", on_off(config.comms_telegram_should_load()));
    println!("└─");
}
