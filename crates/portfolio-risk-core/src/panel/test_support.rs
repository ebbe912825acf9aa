//! Deterministic synthetic panels shared by the test modules.

use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Holdings, PricePanel};
use crate::stats;

pub(crate) fn two_asset_holdings() -> Holdings {
    Holdings::new([("AAPL", 10.0), ("MSFT", 5.0)]).unwrap()
}

pub(crate) fn trading_dates(len: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    (0..len)
        .map(|i| start.checked_add_days(Days::new(i as u64)).unwrap())
        .collect()
}

/// Two-asset geometric random walk with zero drift, daily sigmas of
/// roughly 1% / 1.5%, and a common factor for mild correlation.
pub(crate) fn synthetic_panel(len: usize, seed: u64) -> PricePanel {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = stats::standard_normal();
    let mut a = 100.0_f64;
    let mut b = 250.0_f64;
    let mut closes = Vec::with_capacity(len);
    for _ in 0..len {
        closes.push(vec![Some(a), Some(b)]);
        let common: f64 = rng.sample(normal);
        let ra = 0.010 * (0.6 * common + 0.8 * rng.sample::<f64, _>(normal));
        let rb = 0.015 * (0.6 * common + 0.8 * rng.sample::<f64, _>(normal));
        a *= ra.exp();
        b *= rb.exp();
    }
    PricePanel::new(trading_dates(len), vec!["AAPL".into(), "MSFT".into()], closes).unwrap()
}

/// Constant prices: zero volatility everywhere.
pub(crate) fn flat_panel(len: usize) -> PricePanel {
    let closes = vec![vec![Some(100.0), Some(250.0)]; len];
    PricePanel::new(trading_dates(len), vec!["AAPL".into(), "MSFT".into()], closes).unwrap()
}

/// Second asset is an exact multiple of the first, so the return
/// covariance matrix is singular.
pub(crate) fn correlated_pair_panel(len: usize, seed: u64) -> PricePanel {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = stats::standard_normal();
    let mut a = 100.0_f64;
    let mut closes = Vec::with_capacity(len);
    for _ in 0..len {
        closes.push(vec![Some(a), Some(2.0 * a)]);
        let r: f64 = 0.012 * rng.sample::<f64, _>(normal);
        a *= r.exp();
    }
    PricePanel::new(trading_dates(len), vec!["AAPL".into(), "MSFT".into()], closes).unwrap()
}
