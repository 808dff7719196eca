pub mod cli;
pub mod core;
pub mod providers;

use crate::cli::plan::PlanOptions;
use crate::core::config::AppConfig;
use crate::core::notify::{ConsoleNotifier, Notifier, OutboxNotifier};
use crate::core::targets::TargetConfig;
use crate::providers::yahoo_finance::YahooFinanceProvider;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    /// Compute and report the purchases for the configured cash.
    Plan {
        options: PlanOptions,
        /// Queue the message in the outbox instead of printing it.
        notify: bool,
    },
    /// Check the targets file.
    Validate,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("topup starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let targets_path = config.targets_path()?;
    debug!("Using targets from {}", targets_path.display());

    match command {
        AppCommand::Validate => {
            cli::validate::run(&targets_path)?;
        }
        AppCommand::Plan { options, notify } => {
            let targets = TargetConfig::load_from_path(&targets_path)?;
            let provider = YahooFinanceProvider::new(config.yahoo_base_url());
            let notifier: Box<dyn Notifier> = if notify {
                Box::new(OutboxNotifier::new(config.data_path()?.join("outbox")))
            } else {
                Box::new(ConsoleNotifier)
            };

            cli::plan::run(&config, &targets, &provider, notifier.as_ref(), &options).await?;
        }
    }

    Ok(())
}
