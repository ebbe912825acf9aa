pub mod engine;
pub mod kupiec;

pub use engine::{run, BacktestParams, BacktestReport, BacktestRow, BacktestSummary, Metric};
pub use kupiec::kupiec_pof;
