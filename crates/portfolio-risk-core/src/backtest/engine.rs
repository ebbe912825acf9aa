//! Fixed-share walk-forward backtest: the risk estimate at each as-of
//! date uses only prices up to that date; the realized P&L is observed
//! from the as-of date to the horizon end.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::backtest::kupiec_pof;
use crate::error::RiskError;
use crate::estimator::{
    expected_shortfall, value_at_risk, EstimateParams, McConfig, McMode, Method, PnlModel,
};
use crate::panel::{prepare, Holdings, PricePanel};
use crate::stats;
use crate::types::{with_metadata, ComputationOutput};
use crate::RiskResult;

/// Which risk estimate the backtest validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Var,
    Es,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Var => "var",
            Metric::Es => "es",
        };
        f.write_str(name)
    }
}

impl FromStr for Metric {
    type Err = RiskError;

    fn from_str(s: &str) -> RiskResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "var" => Ok(Metric::Var),
            "es" => Ok(Metric::Es),
            other => Err(RiskError::InvalidInput {
                field: "metric".into(),
                reason: format!("unknown metric '{other}' (expected var | es)"),
            }),
        }
    }
}

/// Backtest parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestParams {
    pub holdings: Holdings,
    pub metric: Metric,
    pub method: Method,
    pub confidence: f64,
    pub horizon_days: u32,
    /// Rolling estimation window in trading days (minimum 30).
    pub lookback_days: u32,
    #[serde(default = "default_backtest_mc")]
    pub mc: McConfig,
    pub pnl_model: PnlModel,
    /// Optional narrowing of the evaluated as-of dates.
    #[serde(default)]
    pub start_asof: Option<NaiveDate>,
    #[serde(default)]
    pub end_asof: Option<NaiveDate>,
    /// Evaluate every `step` trading days.
    pub step: u32,
    /// Optional cap on the number of evaluation points.
    #[serde(default)]
    pub max_points: Option<usize>,
}

/// Backtests re-run the estimator at every evaluation point, so the
/// simulation default is an order of magnitude below the estimator's.
fn default_backtest_mc() -> McConfig {
    McConfig {
        simulations: 10_000,
        ..McConfig::default()
    }
}

impl BacktestParams {
    pub fn new(holdings: Holdings) -> Self {
        BacktestParams {
            holdings,
            metric: Metric::Var,
            method: Method::Historical,
            confidence: 0.95,
            horizon_days: 1,
            lookback_days: 252,
            mc: default_backtest_mc(),
            pnl_model: PnlModel::Exp,
            start_asof: None,
            end_asof: None,
            step: 1,
            max_points: None,
        }
    }
}

/// One evaluation point of the backtest time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRow {
    pub as_of: NaiveDate,
    pub horizon_end: NaiveDate,
    pub portfolio_value: f64,
    pub realized_pnl: f64,
    /// Positive when the portfolio lost money over the horizon.
    pub realized_loss_dollars: f64,
    pub realized_log_return: f64,
    pub realized_loss_log: f64,
    pub var_dollars: f64,
    pub var_log_return: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es_dollars: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es_log_return: Option<f64>,
    pub breach: bool,
}

/// Aggregated backtest outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub metric: Metric,
    pub method: Method,
    pub confidence: f64,
    pub horizon_days: u32,
    pub lookback_days: u32,
    pub n_tests: usize,
    pub n_breaches: usize,
    pub breach_rate: f64,
    pub expected_rate: f64,
    pub kupiec_lr: f64,
    pub kupiec_p_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub summary: BacktestSummary,
    pub rows: Vec<BacktestRow>,
}

/// Walk forward through the aligned price history, re-estimating risk at
/// each evaluation point and comparing it with the realized outcome.
pub fn run(
    panel: &PricePanel,
    params: &BacktestParams,
) -> RiskResult<ComputationOutput<BacktestReport>> {
    let start = Instant::now();
    validate(params)?;

    let prep = prepare(panel, &params.holdings)?;
    let n = prep.dates.len();
    let lookback = params.lookback_days as usize;
    let horizon = params.horizon_days as usize;

    if n < lookback + horizon + 2 {
        return Err(RiskError::InsufficientData(
            "not enough history for requested lookback + horizon".into(),
        ));
    }

    let mut start_i = lookback;
    let mut end_i = n - 1 - horizon;
    if let Some(start_asof) = params.start_asof {
        // first index with date >= start_asof
        let first = prep.dates.partition_point(|d| *d < start_asof);
        start_i = start_i.max(first);
    }
    if let Some(end_asof) = params.end_asof {
        // last index with date <= end_asof
        let past = prep.dates.partition_point(|d| *d <= end_asof);
        if past == 0 {
            return Err(RiskError::InsufficientData(
                "no backtest window after applying start/end filters".into(),
            ));
        }
        end_i = end_i.min(past - 1);
    }
    if end_i <= start_i {
        return Err(RiskError::InsufficientData(
            "no backtest window after applying start/end filters".into(),
        ));
    }

    let estimate_params = EstimateParams {
        holdings: params.holdings.clone(),
        method: params.method,
        confidence: params.confidence,
        horizon_days: params.horizon_days,
        pnl_model: params.pnl_model,
        mc: params.mc.clone(),
    };

    let mut rows: Vec<BacktestRow> = Vec::new();
    let mut i = start_i;
    while i <= end_i {
        if let Some(cap) = params.max_points {
            if rows.len() >= cap {
                break;
            }
        }

        // Point-in-time window: prices up to and including the as-of date.
        let win_start = i.saturating_sub(lookback);
        if i + 1 - win_start < lookback / 2 {
            i += params.step as usize;
            continue;
        }
        let window = window_panel(&prep.dates, &prep.symbols, &prep.closes, win_start, i)?;

        let (var_dollars, var_log, es_dollars, es_log) = match params.metric {
            Metric::Var => {
                let res = value_at_risk(&window, &estimate_params)?.result;
                (res.var_dollars, res.var_log_return, None, None)
            }
            Metric::Es => {
                let res = expected_shortfall(&window, &estimate_params)?.result;
                (
                    res.var_dollars,
                    res.var_log_return,
                    Some(res.es_dollars),
                    Some(res.es_log_return),
                )
            }
        };

        let v_t = stats::dot(&prep.shares, &prep.closes[i]);
        let v_h = stats::dot(&prep.shares, &prep.closes[i + horizon]);
        let realized_pnl = v_h - v_t;
        let realized_loss_dollars = -realized_pnl;
        let realized_log_return = (v_h / v_t).ln();
        let realized_loss_log = -realized_log_return;

        let breach = realized_loss_dollars > var_dollars;

        rows.push(BacktestRow {
            as_of: prep.dates[i],
            horizon_end: prep.dates[i + horizon],
            portfolio_value: v_t,
            realized_pnl,
            realized_loss_dollars,
            realized_log_return,
            realized_loss_log,
            var_dollars,
            var_log_return: var_log,
            es_dollars,
            es_log_return: es_log,
            breach,
        });

        i += params.step as usize;
    }

    if rows.is_empty() {
        return Err(RiskError::InsufficientData(
            "backtest produced no rows (check lookback/horizon/filters)".into(),
        ));
    }

    let alpha = 1.0 - params.confidence;
    let n_tests = rows.len();
    let n_breaches = rows.iter().filter(|r| r.breach).count();
    let breach_rate = n_breaches as f64 / n_tests as f64;
    let (kupiec_lr, kupiec_p_value) = kupiec_pof(n_tests, n_breaches, alpha);

    let summary = BacktestSummary {
        metric: params.metric,
        method: params.method,
        confidence: params.confidence,
        horizon_days: params.horizon_days,
        lookback_days: params.lookback_days,
        n_tests,
        n_breaches,
        breach_rate,
        expected_rate: alpha,
        kupiec_lr,
        kupiec_p_value,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let is_mc = params.method == Method::MonteCarlo;
    let output = with_metadata(
        &format!("Risk Model Backtest ({}, Kupiec POF)", params.metric),
        &serde_json::json!({
            "metric": params.metric.to_string(),
            "method": params.method.to_string(),
            "confidence": params.confidence,
            "horizon_days": params.horizon_days,
            "lookback_days": params.lookback_days,
            "step": params.step,
            "max_points": params.max_points,
            "pnl_model": params.pnl_model.to_string(),
            "symbols": params.holdings.symbols(),
            "start_asof": params.start_asof,
            "end_asof": params.end_asof,
            "mc_mode": is_mc.then(|| params.mc.mode.to_string()),
            "simulations": is_mc.then_some(params.mc.simulations),
            "df_t": (is_mc && params.mc.mode == McMode::StudentT).then_some(params.mc.df_t),
        }),
        Vec::new(),
        elapsed,
        BacktestReport { summary, rows },
    );
    Ok(output)
}

fn validate(params: &BacktestParams) -> RiskResult<()> {
    if !params.confidence.is_finite() || params.confidence <= 0.0 || params.confidence >= 1.0 {
        return Err(RiskError::InvalidInput {
            field: "confidence".into(),
            reason: "must be between 0 and 1 (exclusive)".into(),
        });
    }
    if params.horizon_days < 1 {
        return Err(RiskError::InvalidInput {
            field: "horizon_days".into(),
            reason: "must be at least 1".into(),
        });
    }
    if params.lookback_days < 30 {
        return Err(RiskError::InvalidInput {
            field: "lookback_days".into(),
            reason: "must be at least 30".into(),
        });
    }
    if params.step < 1 {
        return Err(RiskError::InvalidInput {
            field: "step".into(),
            reason: "must be at least 1".into(),
        });
    }
    Ok(())
}

/// Rebuild a `PricePanel` over the inclusive row range `[start, end]` of
/// an already-cleaned matrix.
fn window_panel(
    dates: &[NaiveDate],
    symbols: &[String],
    closes: &[Vec<f64>],
    start: usize,
    end: usize,
) -> RiskResult<PricePanel> {
    let window_dates = dates[start..=end].to_vec();
    let window_closes = closes[start..=end]
        .iter()
        .map(|row| row.iter().map(|&p| Some(p)).collect())
        .collect();
    PricePanel::new(window_dates, symbols.to_vec(), window_closes)
}
