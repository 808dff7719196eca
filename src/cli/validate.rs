use super::ui;
use crate::core::targets::TargetConfig;
use anyhow::Result;
use std::path::Path;

/// Loads the targets file and shows what it contains. Fails on any
/// validation error.
pub fn run(targets_path: &Path) -> Result<TargetConfig> {
    let targets = TargetConfig::load_from_path(targets_path)?;
    println!("{}", display_targets(&targets));
    Ok(targets)
}

fn display_targets(targets: &TargetConfig) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Symbol"), ui::header_cell("Target")]);
    for (symbol, share) in targets.target_shares() {
        table.add_row(vec![comfy_table::Cell::new(symbol), ui::share_cell(*share)]);
    }

    format!(
        "\n{}\n\n{}\n\n{} {}\n{} {}",
        ui::style_text("Targets", ui::StyleType::Title),
        table,
        ui::style_text("Strategy:", ui::StyleType::TotalLabel),
        targets.strategy(),
        ui::style_text("Notify:", ui::StyleType::TotalLabel),
        targets.to_email(),
    )
}
