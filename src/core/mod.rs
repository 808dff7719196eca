//! Allocation core and the domain types around it

pub mod allocator;
pub mod config;
pub mod error;
pub mod holdings;
pub mod log;
pub mod notify;
pub mod picker;
pub mod plan;
pub mod price;
pub mod report;
pub mod targets;

// Re-export main types for cleaner imports
pub use allocator::{AssetState, STEP_LIMIT_MULTIPLIER, allocate, allocate_assets, allocate_for_strategy};
pub use error::AllocationError;
pub use picker::{IndexPicker, RandomPicker};
pub use plan::{Action, AllocationPlan, PlanEntry};
pub use price::{PriceProvider, PriceQuote};
pub use targets::{Strategy, TargetConfig};
