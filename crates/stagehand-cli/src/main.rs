mod commands;
mod docker;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stagehand",
    version,
    about = "Single-machine data-processing flows in containers"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the stagehand state directory
    #[arg(long, short = 'S', global = true)]
    state_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a stagehand state directory
    Init,
    /// Interact with registered components
    #[command(subcommand)]
    Component(commands::component::ComponentCommands),
    /// Interact with registered flows
    #[command(subcommand)]
    Flow(commands::flow::FlowCommands),
    /// Print the stagehand version
    Version,
}

/// `~/.stagehand` when a home directory is known, else `.stagehand`.
fn default_state_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(".stagehand"),
        _ => PathBuf::from(".stagehand"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    let state_dir = cli.state_dir.unwrap_or_else(default_state_dir);

    match cli.command {
        Commands::Init => commands::init::execute(&state_dir),
        Commands::Component(command) => commands::component::execute(&state_dir, command).await,
        Commands::Flow(command) => commands::flow::execute(&state_dir, command).await,
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
