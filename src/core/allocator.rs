//! Greedy allocation of a cash budget over held assets.
//!
//! Each iteration buys one unit of the asset whose share moves closest to
//! its target, until the remaining cash cannot pay for another unit.

use super::error::{AllocationError, Result};
use super::picker::IndexPicker;
use super::plan::{AllocationPlan, PlanEntry};
use super::targets::Strategy;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Headroom over the unit price that an order may execute at.
pub const STEP_LIMIT_MULTIPLIER: f64 = 1.05;

/// Current state of one held asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetState {
    pub id: String,
    /// Value currently held.
    pub value: f64,
    /// Price of one purchasable unit; zero keeps the asset out of the plan.
    pub step_size: f64,
    /// Fraction of the portfolio the asset should represent.
    pub target: f64,
}

/// Spends `budget` one unit at a time, always on the asset whose share gets
/// closest to its target.
///
/// When no single purchase reduces any distance to target the choice falls
/// to `picker` among the assets that are still affordable. The inputs are
/// position-aligned and are not modified.
pub fn allocate<P>(
    ids: &[String],
    targets: &[f64],
    values: &[f64],
    step_sizes: &[f64],
    budget: f64,
    picker: &mut P,
) -> Result<AllocationPlan>
where
    P: IndexPicker + ?Sized,
{
    validate(ids, targets, values, step_sizes, budget)?;

    let limits: Vec<f64> = step_sizes
        .iter()
        .map(|step| step * STEP_LIMIT_MULTIPLIER)
        .collect();
    let initial_values = values;
    let initial_total: f64 = initial_values.iter().sum();

    let mut values = initial_values.to_vec();
    let mut steps = step_sizes.to_vec();
    let mut counts = vec![0u32; ids.len()];
    let mut space_left = budget;

    while let Some(min_step) = smallest_step(&steps) {
        if space_left <= min_step * STEP_LIMIT_MULTIPLIER {
            break;
        }

        let total: f64 = values.iter().sum();

        // Unaffordable assets are dropped for the rest of the run.
        let mut eligible = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter_mut().enumerate() {
            if is_step_allowed(*step, space_left) {
                eligible.push(i);
            } else {
                *step = 0.0;
            }
        }
        if eligible.is_empty() {
            break;
        }

        // The lookahead share divides by the pre-purchase total.
        let mut picked = 0;
        let mut best_improvement = f64::NEG_INFINITY;
        for i in 0..values.len() {
            let current_distance = (targets[i] - values[i] / total).abs();
            let distance_after_step = (targets[i] - (values[i] + steps[i]) / total).abs();
            let improvement = current_distance - distance_after_step;
            if improvement > best_improvement {
                best_improvement = improvement;
                picked = i;
            }
        }

        if best_improvement <= 0.0 {
            picked = picker.pick(&eligible);
            debug!(id = %ids[picked], "No purchase moves closer to target, picked at random");
        }

        // A step too small to register against the remaining cash would
        // never end the loop.
        if space_left - steps[picked] >= space_left {
            warn!(
                id = %ids[picked],
                step = steps[picked],
                space_left,
                "Step is lost to rounding against the remaining cash, stopping"
            );
            break;
        }

        values[picked] += steps[picked];
        counts[picked] += 1;
        space_left -= steps[picked];
        debug!(
            id = %ids[picked],
            step = steps[picked],
            space_left,
            "Added one unit"
        );
    }

    let final_total: f64 = values.iter().sum();
    let entries: Vec<PlanEntry> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| PlanEntry {
            id: id.clone(),
            initial_value: initial_values[i],
            final_value: values[i],
            initial_share: initial_values[i] / initial_total,
            final_share: values[i] / final_total,
            step_size: step_sizes[i],
            purchase_count: counts[i],
            limit_price: limits[i],
        })
        .collect();

    let plan = AllocationPlan::new(entries, budget, space_left);
    info!(
        budget,
        spent = plan.spent(),
        remaining = space_left,
        orders = plan.actions().len(),
        "Allocation finished"
    );
    Ok(plan)
}

/// [`allocate`] over a slice of [`AssetState`]s.
pub fn allocate_assets<P>(assets: &[AssetState], budget: f64, picker: &mut P) -> Result<AllocationPlan>
where
    P: IndexPicker + ?Sized,
{
    let ids: Vec<String> = assets.iter().map(|a| a.id.clone()).collect();
    let targets: Vec<f64> = assets.iter().map(|a| a.target).collect();
    let values: Vec<f64> = assets.iter().map(|a| a.value).collect();
    let steps: Vec<f64> = assets.iter().map(|a| a.step_size).collect();
    allocate(&ids, &targets, &values, &steps, budget, picker)
}

/// Plans purchases for the configured strategy. Only buying is supported.
pub fn allocate_for_strategy<P>(
    strategy: Strategy,
    assets: &[AssetState],
    budget: f64,
    picker: &mut P,
) -> Result<AllocationPlan>
where
    P: IndexPicker + ?Sized,
{
    match strategy {
        Strategy::Buy => allocate_assets(assets, budget, picker),
        Strategy::Sell | Strategy::BuyAndSell => Err(AllocationError::UnsupportedOperation(
            format!("the {strategy} strategy has no allocator, only buy plans can be made"),
        )),
    }
}

fn validate(
    ids: &[String],
    targets: &[f64],
    values: &[f64],
    step_sizes: &[f64],
    budget: f64,
) -> Result<()> {
    let n = ids.len();
    if targets.len() != n || values.len() != n || step_sizes.len() != n {
        return Err(AllocationError::InvalidInput(format!(
            "length mismatch: {n} ids, {} targets, {} values, {} step sizes",
            targets.len(),
            values.len(),
            step_sizes.len()
        )));
    }
    if !budget.is_finite() || budget < 0.0 {
        return Err(AllocationError::InvalidInput(format!(
            "budget must be a non-negative number, got {budget}"
        )));
    }
    for (i, id) in ids.iter().enumerate() {
        if !values[i].is_finite() || values[i] < 0.0 {
            return Err(AllocationError::InvalidInput(format!(
                "value of {id} must be a non-negative number, got {}",
                values[i]
            )));
        }
        if !step_sizes[i].is_finite() || step_sizes[i] < 0.0 {
            return Err(AllocationError::InvalidInput(format!(
                "step size of {id} must be a non-negative number, got {}",
                step_sizes[i]
            )));
        }
        if !targets[i].is_finite() {
            return Err(AllocationError::InvalidInput(format!(
                "target of {id} must be a finite number, got {}",
                targets[i]
            )));
        }
    }
    if values.iter().sum::<f64>() <= 0.0 {
        return Err(AllocationError::InvalidInput(
            "total portfolio value is zero".to_string(),
        ));
    }
    Ok(())
}

fn smallest_step(steps: &[f64]) -> Option<f64> {
    steps
        .iter()
        .copied()
        .filter(|step| *step != 0.0)
        .reduce(f64::min)
}

fn is_step_allowed(step: f64, space_left: f64) -> bool {
    step != 0.0 && step * STEP_LIMIT_MULTIPLIER <= space_left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::picker::RandomPicker;
    use proptest::prelude::{any, prop_assert, prop_assert_eq, proptest};

    /// Always takes the last eligible index and records what it was offered.
    #[derive(Default)]
    struct LastPicker {
        offered: Vec<Vec<usize>>,
    }

    impl IndexPicker for LastPicker {
        fn pick(&mut self, eligible: &[usize]) -> usize {
            self.offered.push(eligible.to_vec());
            eligible[eligible.len() - 1]
        }
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_two_asset_scenario() {
        let mut picker = LastPicker::default();
        let plan = allocate(
            &ids(&["A", "B"]),
            &[0.6, 0.4],
            &[40.0, 60.0],
            &[10.0, 10.0],
            30.0,
            &mut picker,
        )
        .unwrap();

        let a = plan.entry("A").unwrap();
        let b = plan.entry("B").unwrap();
        assert_eq!(a.purchase_count, 2);
        assert_eq!(b.purchase_count, 0);
        assert_close(a.initial_share, 0.4);
        assert_close(b.initial_share, 0.6);
        assert_close(a.final_value, 60.0);
        assert_close(b.final_value, 60.0);
        assert_close(a.final_share, 0.5);
        assert_close(b.final_share, 0.5);
        assert_close(a.limit_price, 10.5);
        assert_close(b.limit_price, 10.5);
        assert_close(plan.remaining_amount(), 10.0);

        let actions = plan.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].id, "A");
        assert_eq!(actions[0].amount, 2);
        assert_close(actions[0].limit, 10.5);

        assert!(picker.offered.is_empty());
    }

    #[test]
    fn test_budget_below_smallest_step_buys_nothing() {
        let mut picker = LastPicker::default();
        let plan = allocate(
            &ids(&["A", "B"]),
            &[0.5, 0.5],
            &[10.0, 90.0],
            &[10.0, 20.0],
            10.5,
            &mut picker,
        )
        .unwrap();

        assert!(plan.is_empty());
        assert!(plan.actions().is_empty());
        assert_eq!(plan.remaining_amount(), 10.5);
        assert_eq!(plan.budget(), 10.5);
        assert_close(plan.entries()[0].final_share, 0.1);
    }

    #[test]
    fn test_step_lost_to_rounding_stops_the_loop() {
        // 1e17 - 1.0 rounds back to 1e17.
        let mut picker = LastPicker::default();
        let plan = allocate(&ids(&["A"]), &[1.0], &[1.0], &[1.0], 1e17, &mut picker).unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.remaining_amount(), 1e17);
        assert_eq!(picker.offered, vec![vec![0]]);
    }

    #[test]
    fn test_zero_budget() {
        let mut picker = RandomPicker::seeded(1);
        let plan = allocate(&ids(&["A"]), &[1.0], &[5.0], &[1.0], 0.0, &mut picker).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.remaining_amount(), 0.0);
    }

    #[test]
    fn test_zero_total_value_is_invalid_input() {
        let mut picker = RandomPicker::seeded(1);
        let result = allocate(
            &ids(&["A", "B"]),
            &[0.5, 0.5],
            &[0.0, 0.0],
            &[10.0, 10.0],
            100.0,
            &mut picker,
        );
        assert!(matches!(result, Err(AllocationError::InvalidInput(_))));
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        let mut picker = RandomPicker::seeded(1);
        let names = ids(&["A", "B"]);

        let cases: Vec<(Vec<f64>, Vec<f64>, Vec<f64>, f64)> = vec![
            (vec![0.5], vec![1.0, 1.0], vec![1.0, 1.0], 10.0),
            (vec![0.5, 0.5], vec![1.0], vec![1.0, 1.0], 10.0),
            (vec![0.5, 0.5], vec![1.0, 1.0], vec![1.0, 1.0, 1.0], 10.0),
            (vec![0.5, 0.5], vec![1.0, 1.0], vec![1.0, 1.0], -1.0),
            (vec![0.5, 0.5], vec![1.0, 1.0], vec![1.0, 1.0], f64::NAN),
            (vec![0.5, 0.5], vec![-1.0, 2.0], vec![1.0, 1.0], 10.0),
            (vec![0.5, 0.5], vec![1.0, 1.0], vec![1.0, -1.0], 10.0),
            (vec![0.5, f64::INFINITY], vec![1.0, 1.0], vec![1.0, 1.0], 10.0),
        ];

        for (targets, values, steps, budget) in cases {
            let result = allocate(&names, &targets, &values, &steps, budget, &mut picker);
            assert!(
                matches!(result, Err(AllocationError::InvalidInput(_))),
                "expected invalid input for {targets:?} {values:?} {steps:?} {budget}"
            );
        }
    }

    #[test]
    fn test_zero_step_asset_is_never_bought() {
        let mut picker = LastPicker::default();
        let plan = allocate(
            &ids(&["A", "B"]),
            &[0.9, 0.1],
            &[10.0, 90.0],
            &[0.0, 5.0],
            50.0,
            &mut picker,
        )
        .unwrap();

        assert_eq!(plan.entries()[0].purchase_count, 0);
        assert_eq!(plan.entries()[0].limit_price, 0.0);
        assert!(plan.entries()[1].purchase_count > 0);
        for offered in &picker.offered {
            assert!(!offered.contains(&0));
        }
    }

    #[test]
    fn test_overshooting_everything_falls_back_to_picker() {
        let mut picker = LastPicker::default();
        let plan = allocate(
            &ids(&["A", "B"]),
            &[0.5, 0.5],
            &[50.0, 50.0],
            &[10.0, 10.0],
            15.0,
            &mut picker,
        )
        .unwrap();

        assert_eq!(picker.offered, vec![vec![0, 1]]);
        assert_eq!(plan.purchases(), vec![("B", 1)]);
        assert_close(plan.remaining_amount(), 5.0);
    }

    #[test]
    fn test_unaffordable_asset_is_not_offered_to_picker() {
        let mut picker = LastPicker::default();
        let plan = allocate(
            &ids(&["A", "B"]),
            &[0.5, 0.5],
            &[100.0, 100.0],
            &[100.0, 10.0],
            50.0,
            &mut picker,
        )
        .unwrap();

        assert_eq!(plan.purchases(), vec![("B", 4)]);
        assert_close(plan.remaining_amount(), 10.0);
        assert_eq!(picker.offered, vec![vec![1]; 4]);
    }

    #[test]
    fn test_ties_go_to_the_first_asset() {
        let mut picker = LastPicker::default();
        let plan = allocate(
            &ids(&["A", "B", "C"]),
            &[0.5, 0.5, 0.0],
            &[20.0, 20.0, 60.0],
            &[10.0, 10.0, 10.0],
            11.0,
            &mut picker,
        )
        .unwrap();

        assert_eq!(plan.purchases(), vec![("A", 1)]);
        assert!(picker.offered.is_empty());
    }

    #[test]
    fn test_same_seed_gives_same_plan() {
        let names = ids(&["A", "B", "C"]);
        let run = |seed| {
            allocate(
                &names,
                &[0.2, 0.2, 0.6],
                &[100.0, 100.0, 100.0],
                &[3.0, 7.0, 50.0],
                200.0,
                &mut RandomPicker::seeded(seed),
            )
            .unwrap()
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn test_allocate_assets_matches_allocate() {
        let assets = vec![
            AssetState {
                id: "A".to_string(),
                value: 40.0,
                step_size: 10.0,
                target: 0.6,
            },
            AssetState {
                id: "B".to_string(),
                value: 60.0,
                step_size: 10.0,
                target: 0.4,
            },
        ];

        let plan = allocate_assets(&assets, 30.0, &mut RandomPicker::seeded(3)).unwrap();
        assert_eq!(plan.purchases(), vec![("A", 2)]);
        assert_eq!(assets[0].value, 40.0);
    }

    #[test]
    fn test_sell_strategies_are_unsupported() {
        let assets = vec![AssetState {
            id: "A".to_string(),
            value: 40.0,
            step_size: 10.0,
            target: 1.0,
        }];

        for strategy in [Strategy::Sell, Strategy::BuyAndSell] {
            let result =
                allocate_for_strategy(strategy, &assets, 30.0, &mut RandomPicker::seeded(3));
            assert!(matches!(
                result,
                Err(AllocationError::UnsupportedOperation(_))
            ));
        }

        let plan =
            allocate_for_strategy(Strategy::Buy, &assets, 30.0, &mut RandomPicker::seeded(3))
                .unwrap();
        assert_eq!(plan.purchases(), vec![("A", 2)]);
    }

    fn asset_inputs() -> impl proptest::strategy::Strategy<Value = Vec<(f64, f64, f64)>> {
        proptest::collection::vec(
            (0.0f64..1000.0, 0.0f64..200.0, 0.0f64..1.0),
            1..6,
        )
    }

    proptest! {
        #[test]
        fn prop_plan_respects_budget(
            inputs in asset_inputs(),
            budget in 0.0f64..5000.0,
            seed in any::<u64>(),
        ) {
            let names: Vec<String> = (0..inputs.len()).map(|i| format!("A{i}")).collect();
            let mut values: Vec<f64> = inputs.iter().map(|(v, _, _)| *v).collect();
            values[0] += 1.0;
            // Small draws become unpurchasable assets.
            let steps: Vec<f64> = inputs
                .iter()
                .map(|(_, s, _)| if *s < 0.5 { 0.0 } else { *s })
                .collect();
            let targets: Vec<f64> = inputs.iter().map(|(_, _, t)| *t).collect();

            let plan = allocate(
                &names,
                &targets,
                &values,
                &steps,
                budget,
                &mut RandomPicker::seeded(seed),
            )
            .unwrap();

            let spent = plan.spent();
            prop_assert!(spent <= budget + 1e-6);
            prop_assert!((plan.remaining_amount() - (budget - spent)).abs() < 1e-6);

            for (entry, step) in plan.entries().iter().zip(&steps) {
                if *step > 0.0 {
                    prop_assert!(plan.remaining_amount() <= step * STEP_LIMIT_MULTIPLIER + 1e-6);
                } else {
                    prop_assert_eq!(entry.purchase_count, 0);
                }
                prop_assert!(
                    (entry.final_value - (entry.initial_value + entry.purchased_value())).abs()
                        < 1e-6
                );
            }

            let share_sum: f64 = plan.entries().iter().map(|e| e.final_share).sum();
            prop_assert!((share_sum - 1.0).abs() < 1e-9);

            let initial_sum: f64 = plan.entries().iter().map(|e| e.initial_value).sum();
            let final_sum: f64 = plan.entries().iter().map(|e| e.final_value).sum();
            prop_assert!((final_sum - (initial_sum + spent)).abs() < 1e-6);
        }
    }
}
