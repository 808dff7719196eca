//! Outcome of an allocation run and the buy instructions derived from it.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{self, Display};

/// A single buy instruction: `amount` units of `id`, each at most `limit`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub id: String,
    pub amount: u32,
    pub limit: f64,
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Buy {} of {}. Max price: {}",
            self.amount, self.id, self.limit
        )
    }
}

/// Per-asset line of an [`AllocationPlan`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanEntry {
    pub id: String,
    pub initial_value: f64,
    pub final_value: f64,
    pub initial_share: f64,
    pub final_share: f64,
    pub step_size: f64,
    pub purchase_count: u32,
    pub limit_price: f64,
}

impl PlanEntry {
    pub fn purchased_value(&self) -> f64 {
        f64::from(self.purchase_count) * self.step_size
    }
}

/// Immutable result of one allocation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationPlan {
    entries: Vec<PlanEntry>,
    budget: f64,
    remaining_amount: f64,
}

impl AllocationPlan {
    pub(crate) fn new(entries: Vec<PlanEntry>, budget: f64, remaining_amount: f64) -> Self {
        AllocationPlan {
            entries,
            budget,
            remaining_amount,
        }
    }

    /// Entries in the order the assets were supplied.
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    /// Cash left unspent when the allocator stopped.
    pub fn remaining_amount(&self) -> f64 {
        self.remaining_amount
    }

    pub fn spent(&self) -> f64 {
        self.entries.iter().map(PlanEntry::purchased_value).sum()
    }

    /// True when nothing is to be bought.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.purchase_count == 0)
    }

    /// One action per asset with a non-zero purchase count, in entry order.
    pub fn actions(&self) -> Vec<Action> {
        self.entries
            .iter()
            .filter(|e| e.purchase_count != 0)
            .map(|e| Action {
                id: e.id.clone(),
                amount: e.purchase_count,
                limit: e.limit_price,
            })
            .collect()
    }

    pub fn purchases(&self) -> Vec<(&str, u32)> {
        self.entries
            .iter()
            .filter(|e| e.purchase_count != 0)
            .map(|e| (e.id.as_str(), e.purchase_count))
            .collect()
    }

    /// Renders the purchases as `- {count} {name}` lines. Ids missing from
    /// `names` are shown as-is.
    pub fn to_summary_string(&self, names: &HashMap<String, String>) -> String {
        self.purchases()
            .into_iter()
            .map(|(id, count)| {
                let name = names.get(id).map_or(id, String::as_str);
                format!("- {count} {name}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, step_size: f64, purchase_count: u32) -> PlanEntry {
        PlanEntry {
            id: id.to_string(),
            initial_value: 100.0,
            final_value: 100.0 + f64::from(purchase_count) * step_size,
            initial_share: 0.5,
            final_share: 0.5,
            step_size,
            purchase_count,
            limit_price: step_size * 1.05,
        }
    }

    fn sample_plan() -> AllocationPlan {
        AllocationPlan::new(
            vec![entry("A", 10.0, 2), entry("B", 20.0, 0), entry("C", 4.0, 5)],
            50.0,
            10.0,
        )
    }

    #[test]
    fn test_actions_skip_zero_counts_and_keep_order() {
        let actions = sample_plan().actions();
        assert_eq!(
            actions,
            vec![
                Action {
                    id: "A".to_string(),
                    amount: 2,
                    limit: 10.0 * 1.05
                },
                Action {
                    id: "C".to_string(),
                    amount: 5,
                    limit: 4.0 * 1.05
                },
            ]
        );
    }

    #[test]
    fn test_actions_are_repeatable() {
        let plan = sample_plan();
        assert_eq!(plan.actions(), plan.actions());
    }

    #[test]
    fn test_action_display() {
        let action = Action {
            id: "4586985".to_string(),
            amount: 3,
            limit: 10.5,
        };
        assert_eq!(action.to_string(), "Buy 3 of 4586985. Max price: 10.5");
    }

    #[test]
    fn test_spent_and_is_empty() {
        let plan = sample_plan();
        assert_eq!(plan.spent(), 40.0);
        assert!(!plan.is_empty());

        let idle = AllocationPlan::new(vec![entry("A", 10.0, 0)], 5.0, 5.0);
        assert!(idle.is_empty());
        assert!(idle.actions().is_empty());
        assert_eq!(idle.to_summary_string(&HashMap::new()), "");
    }

    #[test]
    fn test_summary_uses_display_names() {
        let names = HashMap::from([("A".to_string(), "World ETF".to_string())]);
        assert_eq!(
            sample_plan().to_summary_string(&names),
            "- 2 World ETF\n- 5 C"
        );
    }

    #[test]
    fn test_entry_lookup() {
        let plan = sample_plan();
        assert_eq!(plan.entry("C").map(|e| e.purchase_count), Some(5));
        assert!(plan.entry("Z").is_none());
        assert_eq!(plan.purchases(), vec![("A", 2), ("C", 5)]);
    }
}
