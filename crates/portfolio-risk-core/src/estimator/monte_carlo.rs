//! Monte Carlo estimation: simulate horizon log returns for every asset
//! in one batch, then revalue the portfolio exactly (no linearization).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::ChiSquared;

use crate::error::RiskError;
use crate::panel::PreparedPanel;
use crate::stats;
use crate::RiskResult;

use super::{McConfig, McMode};

/// Simulated horizon outcomes: one entry per path.
pub(crate) struct McOutcome {
    /// ln(V_T / V_0)
    pub portfolio_log: Vec<f64>,
    /// V_T - V_0 in dollars
    pub pnl: Vec<f64>,
}

/// Run the simulation and revalue the portfolio at the horizon:
/// P_T = P_0 * exp(R_h) per asset, V_T = shares . P_T.
pub(crate) fn simulate(
    prep: &PreparedPanel,
    mc: &McConfig,
    horizon_days: u32,
) -> RiskResult<McOutcome> {
    let asset_rets = prep.asset_log_returns();
    let hf = horizon_days as f64;
    let mu_h: Vec<f64> = stats::column_means(&asset_rets)
        .iter()
        .map(|m| m * hf)
        .collect();
    let cov_h: Vec<Vec<f64>> = stats::sample_covariance(&asset_rets)
        .iter()
        .map(|row| row.iter().map(|c| c * hf).collect())
        .collect();

    let mut rng = match mc.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let horizon_returns =
        simulate_horizon_returns(&asset_rets, &mu_h, &cov_h, mc, horizon_days, &mut rng)?;

    let p0 = prep.last_prices();
    let shares = &prep.shares;
    let v0 = prep.portfolio_value();

    let mut portfolio_log = Vec::with_capacity(horizon_returns.len());
    let mut pnl = Vec::with_capacity(horizon_returns.len());
    for row in &horizon_returns {
        let mut v_t = 0.0;
        for ((r, p), q) in row.iter().zip(p0).zip(shares) {
            v_t += q * p * r.exp();
        }
        portfolio_log.push((v_t / v0).ln());
        pnl.push(v_t - v0);
    }

    Ok(McOutcome { portfolio_log, pnl })
}

/// Generate the (simulations x assets) horizon log-return matrix.
fn simulate_horizon_returns(
    asset_rets: &[Vec<f64>],
    mu_h: &[f64],
    cov_h: &[Vec<f64>],
    mc: &McConfig,
    horizon_days: u32,
    rng: &mut StdRng,
) -> RiskResult<Vec<Vec<f64>>> {
    let n = mu_h.len();
    let sims = mc.simulations;

    match mc.mode {
        McMode::Bootstrap => {
            // Resample whole daily return vectors so cross-asset
            // correlation is preserved.
            let t = asset_rets.len();
            let h = horizon_days as usize;
            let mut out = Vec::with_capacity(sims);
            for _ in 0..sims {
                let mut acc = vec![0.0; n];
                for _ in 0..h {
                    let idx = rng.gen_range(0..t);
                    for (a, r) in acc.iter_mut().zip(&asset_rets[idx]) {
                        *a += r;
                    }
                }
                out.push(acc);
            }
            Ok(out)
        }
        McMode::Normal => {
            let l = stats::cholesky_with_jitter(cov_h)?;
            let std_normal = stats::standard_normal();
            let mut out = Vec::with_capacity(sims);
            for _ in 0..sims {
                let z: Vec<f64> = (0..n).map(|_| rng.sample(std_normal)).collect();
                out.push(
                    (0..n)
                        .map(|j| mu_h[j] + stats::dot(&l[j], &z))
                        .collect(),
                );
            }
            Ok(out)
        }
        McMode::StudentT => {
            let df = mc.df_t as f64;
            // For multivariate t with scale S, Cov = df/(df-2) * S, so the
            // scale matrix is shrunk to hit the target covariance.
            let scale: Vec<Vec<f64>> = cov_h
                .iter()
                .map(|row| row.iter().map(|c| c * (df - 2.0) / df).collect())
                .collect();
            let ls = stats::cholesky_with_jitter(&scale)?;
            let chi2 = ChiSquared::new(df).map_err(|e| {
                RiskError::Numerical(format!("chi-squared({df}) is not constructible: {e}"))
            })?;
            let std_normal = stats::standard_normal();
            let mut out = Vec::with_capacity(sims);
            for _ in 0..sims {
                let z: Vec<f64> = (0..n).map(|_| rng.sample(std_normal)).collect();
                let t_scale = (rng.sample(chi2) / df).sqrt();
                out.push(
                    (0..n)
                        .map(|j| mu_h[j] + stats::dot(&ls[j], &z) / t_scale)
                        .collect(),
                );
            }
            Ok(out)
        }
    }
}
