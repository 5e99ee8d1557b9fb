//! capshare CLI: inspect and simulate screen capture negotiation.
//!
//! Usage:
//!   capshare check [TARGET]      Show which capture mechanism applies
//!   capshare simulate [TARGET]   Run a negotiation against a scripted extension
//!   capshare config [--init]     Print or initialize the configuration

use clap::{Parser, Subcommand};

use capshare_common::config::AppConfig;

mod commands;

use commands::{PickerArgs, TargetArgs};

#[derive(Parser)]
#[command(
    name = "capshare",
    about = "Screen capture capability negotiation for browser pages",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the capture capability for a browser and extension state
    Check {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Request a capture source through a scripted extension bridge
    Simulate {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        picker: PickerArgs,

        /// Let the scripted install flow make the extension present
        #[arg(long)]
        install_succeeds: bool,

        /// Extra request option as key=value (repeatable)
        #[arg(short, long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
    },

    /// Print the effective configuration
    Config {
        /// Write the default configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load();

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    capshare_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Check { target } => commands::check::run(&config, &target),
        Commands::Simulate {
            target,
            picker,
            install_succeeds,
            options,
        } => commands::simulate::run(&config, &target, &picker, install_succeeds, &options).await,
        Commands::Config { init } => commands::config::run(&config, init),
    }
}
