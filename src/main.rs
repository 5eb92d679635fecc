//! Practice Partner - voice conversation practice agent
//!
//! Entry point for the `practice-partner` binary. Joins a room, resolves a
//! persona for the first participant and runs a spoken session through a
//! realtime speech engine.

mod cli;
mod config;
mod error;
mod logging;
mod persona;
mod protocol;
mod realtime;
mod room;
mod session;
mod version;

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use crate::cli::{Cli, Commands, ConfigSubcommand, PersonaSubcommand};
use crate::config::PartnerConfig;
use crate::error::{Error, Result};
use crate::persona::PersonaCatalog;
use crate::realtime::{MockEngine, MockEngineConfig, OpenAiConfig, OpenAiRealtimeEngine};
use crate::room::{GatewayConfig, GatewayRoom, MockRoom, MockRoomConfig};
use crate::session::{EventRecorder, SessionOrchestrator, SessionSettings, SessionSummary};

fn main() -> Result<()> {
    // .env.local first so it wins over .env; real environment beats both
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Offline commands use minimal logging
    match &cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            exit_on_error(handle_config_command(subcommand.clone()));
            return Ok(());
        }
        Commands::Persona { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            exit_on_error(handle_persona_command(subcommand.clone()));
            return Ok(());
        }
        Commands::Run { .. } | Commands::Simulate { .. } => {}
    }

    let config_path = match &cli.command {
        Commands::Run { config, .. } | Commands::Simulate { config, .. } => config.clone(),
        _ => None,
    };

    let config = match PartnerConfig::load(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprint!("{}", e.format_for_terminal());
            std::process::exit(e.exit_code());
        }
    };

    // Held for the whole process so file logs are flushed
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting practice partner"
    );

    let result = match cli.command {
        Commands::Run { room, .. } => run_session(config, room),
        Commands::Simulate {
            metadata,
            room,
            fail_greeting,
            fail_start,
            ..
        } => run_simulation(
            config,
            room,
            metadata,
            MockEngineConfig {
                fail_greeting,
                fail_start,
                ..Default::default()
            },
        ),
        Commands::Version | Commands::Config { .. } | Commands::Persona { .. } => {
            // Already handled above
            unreachable!();
        }
    };

    if let Err(ref e) = result {
        error!(error = %e.format_for_log(), "Session ended with an error");
    }
    exit_on_error(result);
    Ok(())
}

/// Print a fatal error the way a terminal user wants it and exit with its code
fn exit_on_error(result: Result<()>) {
    if let Err(e) = result {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(num_cpus::get().clamp(1, 4))
        .thread_name("practice-partner")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))
}

fn load_catalog(config: &PartnerConfig) -> Result<Arc<PersonaCatalog>> {
    let catalog = PersonaCatalog::load(config.persona.catalog_path.as_deref())?;
    Ok(Arc::new(catalog))
}

// ─────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────

/// Join `room` through the gateway and talk through the realtime engine
fn run_session(config: PartnerConfig, room: String) -> Result<()> {
    config.validate_credentials()?;
    let catalog = load_catalog(&config)?;

    info!(
        room = %room,
        gateway = %config.room.url,
        model = %config.realtime.model,
        personas = catalog.len(),
        "Configuration loaded"
    );

    let runtime = build_runtime()?;
    runtime.block_on(async move {
        let mut session = SessionOrchestrator::new(
            SessionSettings::from_config(&config),
            catalog,
            GatewayRoom::new(GatewayConfig::from_config(&config)),
            OpenAiRealtimeEngine::new(OpenAiConfig::from_config(&config)),
        );

        let shutdown = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl-C, leaving the room"),
                Err(e) => {
                    warn!(error = %e, "Could not listen for Ctrl-C");
                    std::future::pending::<()>().await
                }
            }
        };

        let summary = session.run_with_shutdown(&room, shutdown).await?;
        print_summary(&summary);
        Ok::<(), Error>(())
    })
}

/// Run the real orchestrator against the in-process mock room and engine
fn run_simulation(
    config: PartnerConfig,
    room: String,
    metadata: Option<String>,
    engine: MockEngineConfig,
) -> Result<()> {
    let catalog = load_catalog(&config)?;
    let recorder = Arc::new(EventRecorder::new());

    let runtime = build_runtime()?;
    runtime.block_on(async move {
        let mut session = SessionOrchestrator::new(
            SessionSettings::from_config(&config),
            catalog,
            MockRoom::new(MockRoomConfig::scripted(metadata.as_deref())),
            MockEngine::new(engine),
        )
        .with_observer(recorder.clone());

        let summary = session.run(&room).await?;
        print_summary(&summary);

        println!();
        println!("Lifecycle events:");
        for event in recorder.events() {
            println!("  {}", event);
        }

        if let Some(context) = session.context() {
            println!();
            println!("System prompt ({}):", context.persona_name);
            println!("{}", context.system_prompt);
        }
        Ok::<(), Error>(())
    })
}

fn print_summary(summary: &SessionSummary) {
    println!("Session summary");
    println!("  Room:            {}", summary.room);
    println!(
        "  Participant:     {}",
        summary.participant.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Persona:         {}",
        summary.persona_key.as_deref().unwrap_or("(none)")
    );
    println!("  Final state:     {}", summary.final_state);
    println!(
        "  Greeting error:  {}",
        summary.greeting_error.as_deref().unwrap_or("none")
    );
    println!("  Events observed: {}", summary.events_observed);
    println!("  Ended because:   {}", summary.end_reason);
}

// ─────────────────────────────────────────────────────────────────
// Offline Commands
// ─────────────────────────────────────────────────────────────────

fn handle_persona_command(subcommand: PersonaSubcommand) -> Result<()> {
    let config = PartnerConfig::load(subcommand.config_path())?;
    let catalog = load_catalog(&config)?;

    match subcommand {
        PersonaSubcommand::List { .. } => {
            let default_key = catalog.default_persona().key.clone();
            println!("{:<20} {:<24} {}", "KEY", "NAME", "OPENING");
            for persona in catalog.list() {
                let marker = if persona.key == default_key { " (default)" } else { "" };
                println!(
                    "{:<20} {:<24} {}{}",
                    persona.key, persona.display_name, persona.initiation, marker
                );
            }
        }
        PersonaSubcommand::Show { key, .. } => {
            let persona = catalog.resolve(Some(key.as_str()));
            if persona.key != key.trim() {
                println!("Unknown persona '{}', showing the default.", key);
                println!();
            }
            println!("Key:         {}", persona.key);
            println!("Name:        {}", persona.display_name);
            println!("Description: {}", persona.description);
            println!("Opening:     {}", persona.initiation);
            println!("English only: {}", persona.has_language_constraint());
            println!();
            println!("{}", persona.prompt_template);
        }
        PersonaSubcommand::Prompt {
            key,
            event_type,
            user_role,
            ..
        } => {
            let prompt = catalog.build_system_prompt(
                Some(key.as_str()),
                event_type.as_deref(),
                user_role.as_deref(),
            );
            println!("{}", prompt);
        }
    }

    Ok(())
}

fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = PartnerConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg.redacted())?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            let cfg = PartnerConfig::load(config.as_deref())?;
            load_catalog(&cfg)?;
            println!("Configuration is valid.");
            println!(
                "  room.api_key:      {}",
                config::credential_state(&cfg.room.api_key)
            );
            println!(
                "  room.api_secret:   {}",
                config::credential_state(&cfg.room.api_secret)
            );
            println!(
                "  realtime.api_key:  {}",
                config::credential_state(&cfg.realtime.api_key)
            );
        }
    }

    Ok(())
}
