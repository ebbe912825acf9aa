//! Parametric (normal) VaR and ES on portfolio log returns.
//!
//! Daily moments scale to the horizon under the i.i.d. assumption:
//! mean linearly, volatility with the square root of time.

use crate::error::RiskError;
use crate::stats;
use crate::RiskResult;

/// Parametric VaR and ES in log-return space, both positive loss
/// magnitudes:
///
///   VaR = -(mu_h + z * sigma_h)            with z = Phi^-1(alpha)
///   ES  = -mu_h + sigma_h * phi(z) / alpha
pub(crate) fn var_es_log(
    mu_daily: f64,
    sigma_daily: f64,
    alpha: f64,
    horizon_days: u32,
) -> RiskResult<(f64, f64)> {
    if sigma_daily <= 0.0 || !sigma_daily.is_finite() {
        return Err(RiskError::Numerical(
            "sigma_daily must be positive and finite for parametric estimation".into(),
        ));
    }

    let h = horizon_days as f64;
    let mu_h = mu_daily * h;
    let sigma_h = sigma_daily * h.sqrt();

    let z = stats::norm_inv(alpha);
    let phi = stats::norm_pdf(z);

    let var_log = -(mu_h + z * sigma_h);
    let es_log = -mu_h + sigma_h * (phi / alpha);

    Ok((var_log, es_log))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_var_at_95() {
        // Zero mean, sigma 1% daily, one day: VaR = 1.645 * sigma.
        let (var_log, _) = var_es_log(0.0, 0.01, 0.05, 1).unwrap();
        assert!((var_log - 0.016449).abs() < 1e-5);
    }

    #[test]
    fn test_es_exceeds_var() {
        let (var_log, es_log) = var_es_log(0.0005, 0.012, 0.05, 5).unwrap();
        assert!(es_log > var_log);
    }

    #[test]
    fn test_es_closed_form() {
        let alpha = 0.05;
        let sigma = 0.01;
        let (_, es_log) = var_es_log(0.0, sigma, alpha, 1).unwrap();
        let z = stats::norm_inv(alpha);
        let expected = sigma * stats::norm_pdf(z) / alpha;
        assert!((es_log - expected).abs() < 1e-12);
    }

    #[test]
    fn test_sqrt_horizon_scaling_with_zero_mean() {
        let (v1, _) = var_es_log(0.0, 0.01, 0.05, 2).unwrap();
        let (v4, _) = var_es_log(0.0, 0.01, 0.05, 8).unwrap();
        assert!((v4 / v1 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_positive_drift_reduces_var() {
        let (drifting, _) = var_es_log(0.001, 0.01, 0.05, 1).unwrap();
        let (flat, _) = var_es_log(0.0, 0.01, 0.05, 1).unwrap();
        assert!(drifting < flat);
    }

    #[test]
    fn test_degenerate_sigma_is_numerical_error() {
        assert!(matches!(
            var_es_log(0.0, 0.0, 0.05, 1).unwrap_err(),
            RiskError::Numerical(_)
        ));
        assert!(matches!(
            var_es_log(0.0, f64::NAN, 0.05, 1).unwrap_err(),
            RiskError::Numerical(_)
        ));
    }
}
