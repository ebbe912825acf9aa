//! One-call portfolio risk analysis: parametric VaR with component
//! decomposition and risk facts, plus optional ES and backtest
//! validation.
//!
//! The optional legs are soft failures: an ES or backtest error is
//! recorded as a warning on the envelope and the analysis proceeds.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::backtest::{self, BacktestParams, BacktestSummary, Metric};
use crate::decompose::{component_var, risk_facts, ComponentVar, RiskFacts};
use crate::estimator::{
    expected_shortfall, value_at_risk_with_internals, EsReport, EstimateParams, McConfig, Method,
    PnlModel, VarReport,
};
use crate::panel::{Holdings, PricePanel};
use crate::types::{with_metadata, ComputationOutput};
use crate::RiskResult;

/// Parameters for a full portfolio risk analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisParams {
    pub holdings: Holdings,
    pub confidence: f64,
    pub horizon_days: u32,
    pub pnl_model: PnlModel,
    /// Compute Expected Shortfall alongside VaR.
    pub include_es: bool,
    /// Validate the risk model with a rolling backtest.
    pub include_backtest: bool,
}

impl AnalysisParams {
    pub fn new(holdings: Holdings) -> Self {
        AnalysisParams {
            holdings,
            confidence: 0.95,
            horizon_days: 5,
            pnl_model: PnlModel::Linear,
            include_es: true,
            include_backtest: false,
        }
    }
}

/// Complete risk analysis with component breakdown and risk facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAnalysis {
    pub var: VarReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es: Option<EsReport>,
    pub components: Vec<ComponentVar>,
    pub risk_facts: RiskFacts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtest: Option<BacktestSummary>,
}

/// Analyze a portfolio end to end.
///
/// The estimate always uses the parametric method so the decomposition is
/// clean and consistent; the internals from that single estimator call
/// feed the decomposer without recomputing the covariance.
pub fn analyze_portfolio(
    panel: &PricePanel,
    params: &AnalysisParams,
) -> RiskResult<ComputationOutput<RiskAnalysis>> {
    let start = Instant::now();

    let estimate_params = EstimateParams {
        holdings: params.holdings.clone(),
        method: Method::Parametric,
        confidence: params.confidence,
        horizon_days: params.horizon_days,
        pnl_model: params.pnl_model,
        mc: McConfig::default(),
    };

    let (var_out, internals) = value_at_risk_with_internals(panel, &estimate_params)?;
    let mut warnings = var_out.warnings;
    let var = var_out.result;

    let es = if params.include_es {
        match expected_shortfall(panel, &estimate_params) {
            Ok(out) => Some(out.result),
            Err(e) => {
                warnings.push(format!("ES calculation failed: {e}"));
                None
            }
        }
    } else {
        None
    };

    let components_out = component_var(var.var_log_return, var.var_dollars, &internals)?;
    warnings.extend(components_out.warnings);
    let components = components_out.result;

    let facts = risk_facts(&var, es.as_ref(), &components, &internals);

    let backtest = if params.include_backtest {
        let backtest_params = BacktestParams {
            holdings: params.holdings.clone(),
            metric: Metric::Var,
            method: Method::Parametric,
            confidence: params.confidence,
            horizon_days: params.horizon_days,
            lookback_days: 252,
            mc: McConfig::default(),
            pnl_model: params.pnl_model,
            start_asof: None,
            end_asof: None,
            // Non-overlapping tests: one evaluation per horizon.
            step: params.horizon_days,
            max_points: None,
        };
        match backtest::run(panel, &backtest_params) {
            Ok(out) => Some(out.result.summary),
            Err(e) => {
                warnings.push(format!("Backtest validation failed: {e}"));
                None
            }
        }
    } else {
        None
    };

    let analysis = RiskAnalysis {
        var,
        es,
        components,
        risk_facts: facts,
        backtest,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Portfolio Risk Analysis (Component VaR, Risk Facts)",
        &serde_json::json!({
            "method": "parametric",
            "confidence": params.confidence,
            "horizon_days": params.horizon_days,
            "pnl_model": params.pnl_model.to_string(),
            "include_es": params.include_es,
            "include_backtest": params.include_backtest,
            "symbols": params.holdings.symbols(),
        }),
        warnings,
        elapsed,
        analysis,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::test_support::{synthetic_panel, two_asset_holdings};

    #[test]
    fn test_full_analysis_has_all_parts() {
        let panel = synthetic_panel(900, 42);
        let params = AnalysisParams {
            include_backtest: true,
            ..AnalysisParams::new(two_asset_holdings())
        };
        let out = analyze_portfolio(&panel, &params).unwrap();
        let analysis = &out.result;

        assert_eq!(analysis.var.method, Method::Parametric);
        assert!(analysis.es.is_some());
        assert_eq!(analysis.components.len(), 2);
        assert!(analysis.risk_facts.var_dollars > 0.0);

        let backtest = analysis.backtest.as_ref().unwrap();
        assert!(backtest.n_tests > 0);
        assert_eq!(backtest.method, Method::Parametric);
        // Non-overlapping evaluation: one test per horizon.
        assert_eq!(backtest.horizon_days, 5);
    }

    #[test]
    fn test_es_included_by_default_and_consistent() {
        let panel = synthetic_panel(400, 7);
        let out = analyze_portfolio(&panel, &AnalysisParams::new(two_asset_holdings())).unwrap();
        let analysis = &out.result;
        let es = analysis.es.as_ref().unwrap();
        assert!(es.es_dollars >= es.var_dollars);
        assert_eq!(analysis.risk_facts.es_dollars, Some(es.es_dollars));
    }

    #[test]
    fn test_es_can_be_skipped() {
        let panel = synthetic_panel(400, 7);
        let params = AnalysisParams {
            include_es: false,
            ..AnalysisParams::new(two_asset_holdings())
        };
        let analysis = analyze_portfolio(&panel, &params).unwrap().result;
        assert!(analysis.es.is_none());
        assert!(analysis.risk_facts.es_dollars.is_none());
    }

    #[test]
    fn test_backtest_soft_failure_leaves_analysis_intact() {
        // 258 rows are plenty for the estimate but not for a 252-day
        // lookback backtest plus horizon; the backtest leg must fail soft.
        let panel = synthetic_panel(258, 7);
        let params = AnalysisParams {
            include_backtest: true,
            ..AnalysisParams::new(two_asset_holdings())
        };
        let out = analyze_portfolio(&panel, &params).unwrap();
        assert!(out.result.backtest.is_none());
        assert!(out
            .warnings
            .iter()
            .any(|w| w.contains("Backtest validation failed")));
        // The core analysis is still complete.
        assert_eq!(out.result.components.len(), 2);
    }

    #[test]
    fn test_component_dollars_sum_to_var() {
        let panel = synthetic_panel(400, 11);
        let analysis = analyze_portfolio(&panel, &AnalysisParams::new(two_asset_holdings()))
            .unwrap()
            .result;
        let sum: f64 = analysis
            .components
            .iter()
            .map(|c| c.component_var_dollars)
            .sum();
        assert!((sum - analysis.var.var_dollars).abs() < 0.01);
    }
}
