//! Forager CLI — the main entry point.
//!
//! Commands:
//! - `ask`       — Run the agent on one request
//! - `classify`  — Show how a request is understood, without calling a model
//! - `onboard`   — Write the default config
//! - `config`    — Show or validate the effective config

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "forager",
    about = "Forager — a reason/act/observe agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the agent something
    Ask {
        /// The request
        message: String,

        /// Whose memories to use (defaults to memory.user_id)
        #[arg(short, long, env = "FORAGER_USER")]
        user: Option<String>,
    },

    /// Show the goal and intent derived from a request
    Classify {
        /// The request to classify
        text: String,
    },

    /// Initialize configuration
    Onboard,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Check the configuration file
    Validate,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask { message, user } => commands::ask::run(message, user, cli.json).await?,
        Commands::Classify { text } => commands::classify::run(&text)?,
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
    }

    Ok(())
}
