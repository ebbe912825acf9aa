//! Historical simulation: rolling horizon sums of realized portfolio
//! log returns, with the loss quantile read off the empirical
//! distribution.

use crate::error::RiskError;
use crate::stats;
use crate::RiskResult;

/// Sums of consecutive `horizon_days`-long windows of daily log returns.
/// Length is `returns.len() - horizon_days + 1`; empty when the series is
/// shorter than the horizon.
fn rolling_horizon_returns(returns: &[f64], horizon_days: u32) -> Vec<f64> {
    let h = horizon_days as usize;
    if returns.len() < h {
        return Vec::new();
    }
    returns.windows(h).map(|w| w.iter().sum()).collect()
}

/// Historical VaR and ES in log-return space, both positive loss
/// magnitudes.
pub(crate) fn var_es_log(
    port_log_returns: &[f64],
    alpha: f64,
    horizon_days: u32,
) -> RiskResult<(f64, f64)> {
    let horizon = rolling_horizon_returns(port_log_returns, horizon_days);
    if horizon.is_empty() {
        return Err(RiskError::InsufficientData(
            "not enough horizon returns for historical estimation".into(),
        ));
    }
    Ok(stats::empirical_var_es(&horizon, alpha))
}
