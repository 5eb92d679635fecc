//! CLI argument parsing using clap v4

use clap::{Parser, Subcommand};

/// Practice Partner - voice conversation practice agent
///
/// Joins a real-time audio room, picks a persona from the participant's
/// metadata and holds a spoken practice conversation through a realtime
/// speech engine.
#[derive(Parser, Debug)]
#[command(name = "practice-partner")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Join a room and run one practice session
    Run {
        /// Room to join
        #[arg(short, long, env = "PARTNER_ROOM")]
        room: String,

        /// Path to configuration file
        #[arg(short, long, env = "PARTNER_CONFIG")]
        config: Option<String>,
    },

    /// Run a session against the built-in mock room and engine
    Simulate {
        /// Participant metadata (JSON string)
        #[arg(short, long)]
        metadata: Option<String>,

        /// Room name reported in the summary
        #[arg(long, default_value = "simulation")]
        room: String,

        /// Make the engine refuse the greeting
        #[arg(long)]
        fail_greeting: bool,

        /// Make the engine reject the session configuration
        #[arg(long)]
        fail_start: bool,

        /// Path to configuration file
        #[arg(short, long, env = "PARTNER_CONFIG")]
        config: Option<String>,
    },

    /// Inspect the persona catalog
    Persona {
        #[command(subcommand)]
        subcommand: PersonaSubcommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version and build information
    Version,
}

/// Persona subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PersonaSubcommand {
    /// List the personas in catalog order
    List {
        /// Path to configuration file
        #[arg(short, long, env = "PARTNER_CONFIG")]
        config: Option<String>,
    },

    /// Show one persona, falling back to the default for unknown keys
    Show {
        key: String,

        #[arg(short, long, env = "PARTNER_CONFIG")]
        config: Option<String>,
    },

    /// Print the system prompt a session would use
    Prompt {
        key: String,

        /// Event type, e.g. "networking"
        #[arg(long)]
        event_type: Option<String>,

        /// The user's role, e.g. "student"
        #[arg(long)]
        user_role: Option<String>,

        #[arg(short, long, env = "PARTNER_CONFIG")]
        config: Option<String>,
    },
}

impl PersonaSubcommand {
    pub fn config_path(&self) -> Option<&str> {
        match self {
            PersonaSubcommand::List { config }
            | PersonaSubcommand::Show { config, .. }
            | PersonaSubcommand::Prompt { config, .. } => config.as_deref(),
        }
    }
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration with credentials masked
    Show {
        #[arg(short, long, env = "PARTNER_CONFIG")]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        #[arg(short, long, env = "PARTNER_CONFIG")]
        config: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command() {
        let cli = Cli::parse_from(["practice-partner", "run", "--room", "practice-42"]);
        match cli.command {
            Commands::Run { room, config } => {
                assert_eq!(room, "practice-42");
                assert!(config.is_none() || std::env::var("PARTNER_CONFIG").is_ok());
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_requires_room() {
        if std::env::var("PARTNER_ROOM").is_err() {
            assert!(Cli::try_parse_from(["practice-partner", "run"]).is_err());
        }
    }

    #[test]
    fn test_simulate_flags() {
        let cli = Cli::parse_from([
            "practice-partner",
            "simulate",
            "--metadata",
            r#"{"persona":"peer"}"#,
            "--fail-greeting",
        ]);
        match cli.command {
            Commands::Simulate {
                metadata,
                room,
                fail_greeting,
                fail_start,
                ..
            } => {
                assert_eq!(metadata.as_deref(), Some(r#"{"persona":"peer"}"#));
                assert_eq!(room, "simulation");
                assert!(fail_greeting);
                assert!(!fail_start);
            }
            _ => panic!("Expected Simulate command"),
        }
    }

    #[test]
    fn test_persona_prompt() {
        let cli = Cli::parse_from([
            "practice-partner",
            "persona",
            "prompt",
            "recruiter",
            "--event-type",
            "networking",
            "--user-role",
            "student",
        ]);
        match cli.command {
            Commands::Persona {
                subcommand:
                    PersonaSubcommand::Prompt {
                        key,
                        event_type,
                        user_role,
                        ..
                    },
            } => {
                assert_eq!(key, "recruiter");
                assert_eq!(event_type.as_deref(), Some("networking"));
                assert_eq!(user_role.as_deref(), Some("student"));
            }
            _ => panic!("Expected Persona Prompt command"),
        }
    }

    #[test]
    fn test_persona_list() {
        let cli = Cli::parse_from(["practice-partner", "persona", "list"]);
        assert!(matches!(
            cli.command,
            Commands::Persona {
                subcommand: PersonaSubcommand::List { .. }
            }
        ));
    }

    #[test]
    fn test_verbose_flags() {
        let cli = Cli::parse_from(["practice-partner", "-vv", "version"]);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_quiet_flag() {
        let cli = Cli::parse_from(["practice-partner", "--quiet", "version"]);
        assert!(cli.quiet);
    }

    #[test]
    fn test_config_init() {
        let cli = Cli::parse_from(["practice-partner", "config", "init", "--force"]);
        match cli.command {
            Commands::Config {
                subcommand: ConfigSubcommand::Init { path, force },
            } => {
                assert!(path.is_none());
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
