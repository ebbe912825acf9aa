pub mod analysis;
pub mod backtest;
pub mod decompose;
pub mod error;
pub mod estimator;
pub mod panel;
pub mod types;

mod stats;

pub use error::RiskError;
pub use types::*;

/// Standard result type for all portfolio-risk operations
pub type RiskResult<T> = Result<T, RiskError>;
