use chrono::NaiveDate;

use crate::error::RiskError;
use crate::panel::{Holdings, PricePanel};
use crate::stats;
use crate::RiskResult;

/// A price panel aligned to one portfolio: only the requested symbols,
/// forward-filled, with incomplete rows dropped, plus the derived
/// portfolio value and log-return series.
#[derive(Debug, Clone)]
pub struct PreparedPanel {
    pub dates: Vec<NaiveDate>,
    pub symbols: Vec<String>,
    pub shares: Vec<f64>,
    /// Dense close matrix, rows = dates, columns in `symbols` order.
    pub closes: Vec<Vec<f64>>,
    pub portfolio_values: Vec<f64>,
    pub portfolio_log_returns: Vec<f64>,
}

impl PreparedPanel {
    pub fn as_of(&self) -> NaiveDate {
        *self.dates.last().expect("prepared panel is never empty")
    }

    /// Portfolio value at the as-of date.
    pub fn portfolio_value(&self) -> f64 {
        *self
            .portfolio_values
            .last()
            .expect("prepared panel is never empty")
    }

    pub fn last_prices(&self) -> &[f64] {
        self.closes.last().expect("prepared panel is never empty")
    }

    /// Per-asset daily log returns, rows = dates[1..], columns as `symbols`.
    pub fn asset_log_returns(&self) -> Vec<Vec<f64>> {
        let n = self.symbols.len();
        let mut rets = Vec::with_capacity(self.closes.len().saturating_sub(1));
        for t in 1..self.closes.len() {
            let mut row = Vec::with_capacity(n);
            for j in 0..n {
                row.push((self.closes[t][j] / self.closes[t - 1][j]).ln());
            }
            rets.push(row);
        }
        rets
    }
}

/// Align a raw price panel to the holdings: select the requested symbols,
/// forward-fill small gaps, drop any date still missing a price, and
/// derive the portfolio value and log-return series.
pub fn prepare(panel: &PricePanel, holdings: &Holdings) -> RiskResult<PreparedPanel> {
    let mut missing: Vec<String> = holdings
        .iter()
        .filter(|(sym, _)| panel.column_index(sym).is_none())
        .map(|(sym, _)| sym.to_string())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(RiskError::InsufficientData(format!(
            "missing symbols in price panel: {}",
            missing.join(", ")
        )));
    }

    let columns: Vec<usize> = holdings
        .iter()
        .map(|(sym, _)| panel.column_index(sym).expect("checked above"))
        .collect();
    let symbols = holdings.symbols();
    let shares: Vec<f64> = holdings.iter().map(|(_, sh)| sh).collect();
    let n = columns.len();

    // Forward-fill each selected column, then keep only rows where every
    // symbol has a price (rows before a symbol's first observation drop).
    let mut carried: Vec<Option<f64>> = vec![None; n];
    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut closes: Vec<Vec<f64>> = Vec::new();
    for (date, raw_row) in panel.dates().iter().zip(panel.closes()) {
        for (slot, &col) in carried.iter_mut().zip(&columns) {
            if let Some(price) = raw_row[col] {
                *slot = Some(price);
            }
        }
        if carried.iter().all(|c| c.is_some()) {
            dates.push(*date);
            closes.push(carried.iter().map(|c| c.expect("all present")).collect());
        }
    }

    if closes.is_empty() {
        return Err(RiskError::InsufficientData(
            "no overlapping price history for selected symbols".into(),
        ));
    }

    let portfolio_values: Vec<f64> = closes.iter().map(|row| stats::dot(&shares, row)).collect();
    for (date, value) in dates.iter().zip(&portfolio_values) {
        if !value.is_finite() || *value <= 0.0 {
            return Err(RiskError::Numerical(format!(
                "non-positive portfolio value at {date}; log returns are undefined"
            )));
        }
    }

    let portfolio_log_returns: Vec<f64> = portfolio_values
        .windows(2)
        .map(|w| (w[1] / w[0]).ln())
        .collect();

    Ok(PreparedPanel {
        dates,
        symbols,
        shares,
        closes,
        portfolio_values,
        portfolio_log_returns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn two_asset_panel() -> PricePanel {
        PricePanel::new(
            vec![
                d("2024-01-02"),
                d("2024-01-03"),
                d("2024-01-04"),
                d("2024-01-05"),
            ],
            vec!["AAPL".into(), "MSFT".into()],
            vec![
                vec![None, Some(400.0)],
                vec![Some(100.0), Some(401.0)],
                vec![Some(101.0), None],
                vec![Some(102.0), Some(403.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_prepare_forward_fills_and_drops_leading_gap() {
        let holdings = Holdings::new([("AAPL", 10.0), ("MSFT", 5.0)]).unwrap();
        let prep = prepare(&two_asset_panel(), &holdings).unwrap();

        // 2024-01-02 has no AAPL price yet and is dropped.
        assert_eq!(
            prep.dates,
            vec![d("2024-01-03"), d("2024-01-04"), d("2024-01-05")]
        );
        // The MSFT gap on 2024-01-04 is forward-filled from 401.0.
        assert_eq!(prep.closes[1], vec![101.0, 401.0]);
        assert_eq!(prep.portfolio_log_returns.len(), 2);
    }

    #[test]
    fn test_prepare_columns_follow_holdings_order() {
        let holdings = Holdings::new([("MSFT", 5.0), ("AAPL", 10.0)]).unwrap();
        let prep = prepare(&two_asset_panel(), &holdings).unwrap();
        assert_eq!(prep.symbols, vec!["MSFT".to_string(), "AAPL".to_string()]);
        assert_eq!(prep.closes[0], vec![401.0, 100.0]);
    }

    #[test]
    fn test_prepare_portfolio_series() {
        let holdings = Holdings::new([("AAPL", 10.0), ("MSFT", 5.0)]).unwrap();
        let prep = prepare(&two_asset_panel(), &holdings).unwrap();
        assert_eq!(prep.portfolio_values[0], 10.0 * 100.0 + 5.0 * 401.0);
        assert_eq!(prep.portfolio_value(), 10.0 * 102.0 + 5.0 * 403.0);
        let expected = (prep.portfolio_values[1] / prep.portfolio_values[0]).ln();
        assert_eq!(prep.portfolio_log_returns[0], expected);
    }

    #[test]
    fn test_prepare_missing_symbol_is_data_error() {
        let holdings = Holdings::new([("AAPL", 10.0), ("NVDA", 1.0)]).unwrap();
        let err = prepare(&two_asset_panel(), &holdings).unwrap_err();
        assert!(matches!(err, RiskError::InsufficientData(_)));
        assert!(err.to_string().contains("NVDA"));
    }

    #[test]
    fn test_prepare_empty_overlap_is_data_error() {
        let panel = PricePanel::new(
            vec![d("2024-01-02"), d("2024-01-03")],
            vec!["AAPL".into(), "MSFT".into()],
            vec![vec![Some(100.0), None], vec![Some(101.0), None]],
        )
        .unwrap();
        let holdings = Holdings::new([("AAPL", 1.0), ("MSFT", 1.0)]).unwrap();
        let err = prepare(&panel, &holdings).unwrap_err();
        assert!(matches!(err, RiskError::InsufficientData(_)));
    }

    #[test]
    fn test_prepare_rejects_net_short_portfolio() {
        let holdings = Holdings::new([("AAPL", -10.0), ("MSFT", 1.0)]).unwrap();
        let err = prepare(&two_asset_panel(), &holdings).unwrap_err();
        assert!(matches!(err, RiskError::Numerical(_)));
    }

    #[test]
    fn test_asset_log_returns_shape() {
        let holdings = Holdings::new([("AAPL", 10.0), ("MSFT", 5.0)]).unwrap();
        let prep = prepare(&two_asset_panel(), &holdings).unwrap();
        let rets = prep.asset_log_returns();
        assert_eq!(rets.len(), 2);
        assert_eq!(rets[0].len(), 2);
        assert!((rets[0][0] - (101.0_f64 / 100.0).ln()).abs() < 1e-12);
    }
}
