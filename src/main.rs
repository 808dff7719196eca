use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use topup::cli::plan::PlanOptions;
use topup::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create example configuration and targets
    Setup,
    /// Check the targets file
    Validate,
    /// Plan purchases for the available cash
    Plan {
        /// Seed for the random tie-break, for reproducible plans
        #[arg(long)]
        seed: Option<u64>,

        /// Write the message to the outbox instead of printing it
        #[arg(long)]
        notify: bool,

        /// Do not record before/after snapshots
        #[arg(long)]
        no_history: bool,
    },
}

impl From<Commands> for topup::AppCommand {
    fn from(cmd: Commands) -> topup::AppCommand {
        match cmd {
            Commands::Validate => topup::AppCommand::Validate,
            Commands::Plan {
                seed,
                notify,
                no_history,
            } => topup::AppCommand::Plan {
                options: PlanOptions { seed, no_history },
                notify,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => topup::cli::setup::setup_at_path(path),
            None => topup::cli::setup::setup(),
        },
        Some(cmd) => topup::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
