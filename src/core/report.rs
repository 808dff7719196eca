//! Before/after views of the portfolio, the notification text and the run
//! history written to disk.
use crate::core::holdings::{PositionValue, display_names};
use crate::core::plan::AllocationPlan;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::Table;
use comfy_table::presets::ASCII_MARKDOWN;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SUBJECT: &str = "Portfolio update";

const HISTORY_DIR: &str = "history";
const OLD_PORTFOLIO_FILE: &str = "old_portfolio.json";
const NEW_PORTFOLIO_FILE: &str = "new_portfolio.json";

/// One position as shown in reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionRow {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub quantity: f64,
    pub price: f64,
    pub value: f64,
    pub share: f64,
    /// Units bought in this run.
    pub orders: u32,
}

/// The portfolio as it is now.
pub fn before_rows(positions: &[PositionValue]) -> Vec<PositionRow> {
    let total: f64 = positions.iter().map(|p| p.value).sum();
    positions
        .iter()
        .map(|p| PositionRow {
            id: p.id.clone(),
            symbol: p.symbol.clone(),
            name: p.name.clone(),
            quantity: p.units,
            price: p.price,
            value: p.value,
            share: if total > 0.0 { p.value / total } else { 0.0 },
            orders: 0,
        })
        .collect()
}

/// The portfolio once every action of `plan` is filled at the current price.
///
/// `plan` must have been computed from `positions`, entries align by position.
pub fn after_rows(positions: &[PositionValue], plan: &AllocationPlan) -> Vec<PositionRow> {
    positions
        .iter()
        .zip(plan.entries())
        .map(|(p, entry)| {
            let quantity = p.units + f64::from(entry.purchase_count);
            PositionRow {
                id: p.id.clone(),
                symbol: p.symbol.clone(),
                name: p.name.clone(),
                quantity,
                price: p.price,
                value: quantity * p.price,
                share: entry.final_share,
                orders: entry.purchase_count,
            }
        })
        .collect()
}

/// A notification ready to hand to a [`Notifier`](crate::core::notify::Notifier).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub fn compose_message(
    to: &str,
    available: f64,
    plan: &AllocationPlan,
    positions: &[PositionValue],
) -> Message {
    let body = if plan.actions().is_empty() {
        format!(
            "Hi,\n\nNothing to buy this time.\nRemaining amount: {:.2}\n",
            plan.remaining_amount()
        )
    } else {
        format!(
            "Hi,\n\nAvailable amount: {:.2}\nRemaining amount: {:.2}\n\nBuy orders:\n{}\n\nPosition overview:\n{}\n",
            available,
            plan.remaining_amount(),
            plan.to_summary_string(&display_names(positions)),
            overview_table(&after_rows(positions, plan)),
        )
    };

    Message {
        to: to.to_string(),
        subject: SUBJECT.to_string(),
        body,
    }
}

fn overview_table(rows: &[PositionRow]) -> String {
    let mut table = Table::new();
    table.load_preset(ASCII_MARKDOWN);
    table.set_header(vec!["Name", "Quantity", "Value", "Share"]);
    for row in rows {
        table.add_row(vec![
            row.name.clone(),
            format!("{:.2}", row.quantity),
            format!("{:.2}", row.value),
            format!("{:.2}", row.share),
        ]);
    }
    table.to_string()
}

/// Writes both views under `root/history/<date>/`, reusing the folder when
/// the day already has one. Returns the folder.
pub fn write_history(
    root: &Path,
    date: NaiveDate,
    before: &[PositionRow],
    after: &[PositionRow],
) -> Result<PathBuf> {
    let folder = root.join(HISTORY_DIR).join(date.format("%Y-%m-%d").to_string());
    if folder.exists() {
        warn!("Folder '{}' already exists. Using that.", folder.display());
    }
    fs::create_dir_all(&folder)
        .with_context(|| format!("Failed to create directory: {}", folder.display()))?;

    for (file_name, rows) in [(OLD_PORTFOLIO_FILE, before), (NEW_PORTFOLIO_FILE, after)] {
        let path = folder.join(file_name);
        let json = serde_json::to_string_pretty(rows)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write history file: {}", path.display()))?;
        debug!("Wrote {}", path.display());
    }

    Ok(folder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::allocator::allocate;
    use crate::core::picker::RandomPicker;
    use tempfile::TempDir;

    fn positions() -> Vec<PositionValue> {
        vec![
            PositionValue {
                id: "1".to_string(),
                symbol: "A".to_string(),
                name: "Alpha".to_string(),
                units: 4.0,
                price: 10.0,
                value: 40.0,
            },
            PositionValue {
                id: "2".to_string(),
                symbol: "B".to_string(),
                name: "Beta".to_string(),
                units: 6.0,
                price: 10.0,
                value: 60.0,
            },
        ]
    }

    fn plan(budget: f64) -> AllocationPlan {
        allocate(
            &["1".to_string(), "2".to_string()],
            &[0.6, 0.4],
            &[40.0, 60.0],
            &[10.0, 10.0],
            budget,
            &mut RandomPicker::seeded(0),
        )
        .unwrap()
    }

    #[test]
    fn test_before_and_after_rows() {
        let before = before_rows(&positions());
        assert_eq!(before[0].share, 0.4);
        assert_eq!(before[1].orders, 0);

        let after = after_rows(&positions(), &plan(30.0));
        assert_eq!(after[0].quantity, 6.0);
        assert_eq!(after[0].value, 60.0);
        assert_eq!(after[0].orders, 2);
        assert!((after[0].share - 0.5).abs() < 1e-9);
        assert_eq!(after[1].quantity, 6.0);
        assert_eq!(after[1].orders, 0);
    }

    #[test]
    fn test_message_lists_orders() {
        let message = compose_message("me@example.com", 30.0, &plan(30.0), &positions());
        assert_eq!(message.to, "me@example.com");
        assert_eq!(message.subject, SUBJECT);
        assert!(message.body.contains("Available amount: 30.00"));
        assert!(message.body.contains("Remaining amount: 10.00"));
        assert!(message.body.contains("- 2 Alpha"));
        assert!(!message.body.contains("- 0 Beta"));
        assert!(message.body.contains("| Name"));
        assert!(message.body.contains("Beta"));
    }

    #[test]
    fn test_message_when_nothing_to_buy() {
        let message = compose_message("me@example.com", 5.0, &plan(5.0), &positions());
        assert!(message.body.contains("Nothing to buy"));
        assert!(message.body.contains("Remaining amount: 5.00"));
        assert!(!message.body.contains("Buy orders"));
    }

    #[test]
    fn test_write_history_creates_and_reuses_folder() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let before = before_rows(&positions());
        let after = after_rows(&positions(), &plan(30.0));

        let folder = write_history(temp_dir.path(), date, &before, &after)?;
        assert_eq!(folder, temp_dir.path().join("history").join("2024-03-01"));

        let old: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(folder.join(OLD_PORTFOLIO_FILE))?)?;
        assert_eq!(old[0]["name"], "Alpha");
        assert_eq!(old[0]["quantity"], 4.0);

        let new: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(folder.join(NEW_PORTFOLIO_FILE))?)?;
        assert_eq!(new[0]["orders"], 2);

        // Same day again overwrites the files in place.
        write_history(temp_dir.path(), date, &before, &before)?;
        let new: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(folder.join(NEW_PORTFOLIO_FILE))?)?;
        assert_eq!(new[0]["orders"], 0);

        Ok(())
    }
}
