//! Plain portfolio risk metrics: tail risk, concentration, and
//! correlation facts. No severity judgments, just numbers for a caller
//! (UI or downstream reasoning) to interpret.

use serde::{Deserialize, Serialize};

use crate::decompose::ComponentVar;
use crate::estimator::{EsReport, EstimatorInternals, VarReport};

/// One of the largest risk contributors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopContributor {
    pub symbol: String,
    pub weight: f64,
    /// Absolute percentage contribution to total VaR.
    pub risk_pct: f64,
}

/// A highly correlated position pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedPair {
    pub symbol_1: String,
    pub symbol_2: String,
    pub correlation: f64,
}

/// Portfolio risk facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFacts {
    /// VaR as a fraction of portfolio value.
    pub var_pct: f64,
    pub var_dollars: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es_dollars: Option<f64>,
    /// Largest position weight and which symbol holds it.
    pub max_single_weight: f64,
    pub max_single_weight_symbol: String,
    /// Effective number of positions: 1 / sum(w^2).
    pub effective_n: f64,
    /// Largest absolute percentage contribution to VaR.
    pub max_single_risk_contribution: f64,
    pub max_single_risk_contribution_symbol: String,
    pub top_contributors: Vec<TopContributor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_pairwise_corr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pairwise_corr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_correlated_pairs: Option<Vec<CorrelatedPair>>,
}

/// Compute risk facts from a VaR estimate, its component breakdown, and
/// the estimator internals. `components` must already be sorted by
/// descending percentage contribution.
pub fn risk_facts(
    var: &VarReport,
    es: Option<&EsReport>,
    components: &[ComponentVar],
    internals: &EstimatorInternals,
) -> RiskFacts {
    let portfolio_value = var.portfolio_value;
    let var_dollars = var.var_dollars;
    let var_pct = if portfolio_value > 0.0 {
        var_dollars / portfolio_value
    } else {
        0.0
    };

    let es_dollars = es.map(|e| e.es_dollars);
    let es_pct = es_dollars.map(|d| {
        if portfolio_value > 0.0 {
            d / portfolio_value
        } else {
            0.0
        }
    });

    let heaviest = components.iter().max_by(|a, b| {
        a.weight
            .partial_cmp(&b.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let max_single_weight = heaviest.map(|c| c.weight).unwrap_or(0.0);
    let max_single_weight_symbol = heaviest.map(|c| c.symbol.clone()).unwrap_or_default();

    // How many equal-weight positions would this portfolio behave like?
    let weights_squared_sum: f64 = components.iter().map(|c| c.weight * c.weight).sum();
    let effective_n = if weights_squared_sum > 0.0 {
        1.0 / weights_squared_sum
    } else {
        0.0
    };

    let dominant = components.iter().max_by(|a, b| {
        a.percentage_contribution
            .abs()
            .partial_cmp(&b.percentage_contribution.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let max_single_risk_contribution = dominant
        .map(|c| c.percentage_contribution.abs())
        .unwrap_or(0.0);
    let max_single_risk_contribution_symbol =
        dominant.map(|c| c.symbol.clone()).unwrap_or_default();

    let top_contributors = components
        .iter()
        .take(3)
        .map(|c| TopContributor {
            symbol: c.symbol.clone(),
            weight: c.weight,
            risk_pct: c.percentage_contribution.abs(),
        })
        .collect();

    let (avg_pairwise_corr, max_pairwise_corr, top_correlated_pairs) =
        correlation_facts(internals, components.len());

    RiskFacts {
        var_pct,
        var_dollars,
        es_pct,
        es_dollars,
        max_single_weight,
        max_single_weight_symbol,
        effective_n,
        max_single_risk_contribution,
        max_single_risk_contribution_symbol,
        top_contributors,
        avg_pairwise_corr,
        max_pairwise_corr,
        top_correlated_pairs,
    }
}

/// Pairwise correlation facts from the daily covariance matrix. Omitted
/// for single-asset portfolios and degenerate variances.
fn correlation_facts(
    internals: &EstimatorInternals,
    num_components: usize,
) -> (Option<f64>, Option<f64>, Option<Vec<CorrelatedPair>>) {
    if num_components < 2 {
        return (None, None, None);
    }
    let cov = &internals.cov_daily;
    let n = cov.len();
    let stds: Vec<f64> = (0..n).map(|i| cov[i][i].sqrt()).collect();
    if stds.iter().any(|s| !(*s > 0.0)) {
        return (None, None, None);
    }

    let mut pairs: Vec<CorrelatedPair> = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let corr = cov[i][j] / (stds[i] * stds[j]);
            if corr.is_finite() {
                pairs.push(CorrelatedPair {
                    symbol_1: internals.symbols[i].clone(),
                    symbol_2: internals.symbols[j].clone(),
                    correlation: corr,
                });
            }
        }
    }
    if pairs.is_empty() {
        return (None, None, None);
    }

    let avg = pairs.iter().map(|p| p.correlation).sum::<f64>() / pairs.len() as f64;
    let max = pairs
        .iter()
        .map(|p| p.correlation)
        .fold(f64::NEG_INFINITY, f64::max);
    pairs.sort_by(|a, b| {
        b.correlation
            .partial_cmp(&a.correlation)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    pairs.truncate(3);

    (Some(avg), Some(max), Some(pairs))
}
