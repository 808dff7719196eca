//! Command implementations and terminal output

pub mod plan;
pub mod setup;
pub mod ui;
pub mod validate;
