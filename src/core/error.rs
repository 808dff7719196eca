//! Error types raised by the allocation core.

/// Failures of target validation and allocation.
///
/// None of these are transient: they signal a configuration or programming
/// error and are surfaced to the operator as-is.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AllocationError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

pub type Result<T> = std::result::Result<T, AllocationError>;
