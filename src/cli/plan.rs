use super::ui;
use crate::core::config::AppConfig;
use crate::core::holdings::{self, PositionValue};
use crate::core::notify::Notifier;
use crate::core::picker::RandomPicker;
use crate::core::price::PriceProvider;
use crate::core::report;
use crate::core::targets::TargetConfig;
use crate::core::{AllocationPlan, allocate_for_strategy};
use anyhow::Result;
use chrono::Local;
use comfy_table::Cell;
use tracing::{debug, info};

/// Switches of the `plan` command.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Seed for the random fallback choice; fresh entropy when unset.
    pub seed: Option<u64>,
    /// Skip writing the before/after snapshots.
    pub no_history: bool,
}

/// Values the holdings, plans the purchases for the cash on hand, shows the
/// result and notifies.
pub async fn run(
    config: &AppConfig,
    targets: &TargetConfig,
    provider: &(dyn PriceProvider + Send + Sync),
    notifier: &dyn Notifier,
    options: &PlanOptions,
) -> Result<AllocationPlan> {
    let to_fetch = config.holdings.iter().filter(|h| h.price.is_none()).count();
    let pb = ui::new_progress_bar(to_fetch as u64);
    pb.set_message("Fetching prices...");
    let positions =
        holdings::value_holdings(&config.holdings, &config.currency, provider, &|| pb.inc(1))
            .await;
    pb.finish_and_clear();
    let positions = positions?;

    let assets = holdings::to_asset_states(&positions, targets);
    debug!(?assets, "Allocator input");

    let mut picker = match options.seed {
        Some(seed) => RandomPicker::seeded(seed),
        None => RandomPicker::from_entropy(),
    };
    let plan = allocate_for_strategy(targets.strategy(), &assets, config.cash, &mut picker)?;

    println!("{}", display_plan(&positions, targets, &plan, &config.currency));
    ui::print_separator();

    let actions = plan.actions();
    if actions.is_empty() {
        info!("Nothing to do.");
        println!("Nothing to buy.");
    } else {
        for action in &actions {
            println!("{action}");
        }
    }

    if !options.no_history {
        let folder = report::write_history(
            &config.data_path()?,
            Local::now().date_naive(),
            &report::before_rows(&positions),
            &report::after_rows(&positions, &plan),
        )?;
        info!("Wrote history to {}", folder.display());
    }

    let message = report::compose_message(targets.to_email(), config.cash, &plan, &positions);
    notifier.send(&message).await?;

    Ok(plan)
}

fn display_plan(
    positions: &[PositionValue],
    targets: &TargetConfig,
    plan: &AllocationPlan,
    currency: &str,
) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Name"),
        ui::header_cell("Units"),
        ui::header_cell(&format!("Price ({currency})")),
        ui::header_cell("Share"),
        ui::header_cell("Target"),
        ui::header_cell("Buy"),
        ui::header_cell(&format!("New value ({currency})")),
        ui::header_cell("New share"),
    ]);

    for (position, entry) in positions.iter().zip(plan.entries()) {
        let target = targets
            .target_for(&position.symbol)
            .map_or("N/A".to_string(), |t| format!("{:.2}%", t * 100.0));
        table.add_row(vec![
            Cell::new(&position.name),
            ui::number_cell(format!("{:.2}", position.units)),
            ui::number_cell(format!("{:.2}", position.price)),
            ui::number_cell(format!("{:.2}%", entry.initial_share * 100.0)),
            ui::number_cell(target),
            ui::order_cell(entry.purchase_count),
            ui::number_cell(format!("{:.2}", entry.final_value)),
            ui::share_cell(entry.final_share),
        ]);
    }

    let mut output = format!(
        "\n{}\n\n",
        ui::style_text("Portfolio top-up", ui::StyleType::Title)
    );
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n\n{} {}\n{} {}",
        ui::style_text(&format!("Available ({currency}):"), ui::StyleType::TotalLabel),
        ui::style_text(&format!("{:.2}", plan.budget()), ui::StyleType::TotalValue),
        ui::style_text(&format!("Remaining ({currency}):"), ui::StyleType::TotalLabel),
        ui::style_text(
            &format!("{:.2}", plan.remaining_amount()),
            ui::StyleType::Subtle
        ),
    ));
    output
}
