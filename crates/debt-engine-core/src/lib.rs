pub mod calendar;
pub mod error;
pub mod lending;
pub mod tables;
pub mod types;

#[cfg(feature = "provisioning")]
pub mod provisioning;

#[cfg(feature = "abusiveness")]
pub mod abusiveness;

pub use error::DebtEngineError;
pub use tables::RegulatoryTables;
pub use types::*;

/// Standard result type for all debt-engine operations
pub type DebtEngineResult<T> = Result<T, DebtEngineError>;
