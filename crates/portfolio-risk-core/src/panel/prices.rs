use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::RiskError;
use crate::RiskResult;

/// One holding: a symbol and a (possibly fractional or negative) share count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub shares: f64,
}

/// Fixed-share portfolio holdings.
///
/// Symbols are trimmed and uppercased on construction; duplicate entries
/// are summed, not overwritten. First-occurrence order is preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<Position>", into = "Vec<Position>")]
pub struct Holdings {
    positions: Vec<Position>,
}

impl Holdings {
    pub fn new<I, S>(entries: I) -> RiskResult<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut positions: Vec<Position> = Vec::new();
        for (symbol, shares) in entries {
            let symbol = symbol.as_ref().trim().to_uppercase();
            if symbol.is_empty() {
                return Err(RiskError::InvalidInput {
                    field: "holdings".into(),
                    reason: "symbol must be non-empty".into(),
                });
            }
            if !shares.is_finite() {
                return Err(RiskError::InvalidInput {
                    field: "holdings".into(),
                    reason: format!("shares for {symbol} must be finite"),
                });
            }
            match positions.iter_mut().find(|p| p.symbol == symbol) {
                Some(existing) => existing.shares += shares,
                None => positions.push(Position { symbol, shares }),
            }
        }
        if positions.is_empty() {
            return Err(RiskError::InvalidInput {
                field: "holdings".into(),
                reason: "holdings is empty".into(),
            });
        }
        Ok(Holdings { positions })
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.positions.iter().map(|p| (p.symbol.as_str(), p.shares))
    }

    pub fn symbols(&self) -> Vec<String> {
        self.positions.iter().map(|p| p.symbol.clone()).collect()
    }
}

impl TryFrom<Vec<Position>> for Holdings {
    type Error = RiskError;

    fn try_from(positions: Vec<Position>) -> RiskResult<Self> {
        Holdings::new(positions.into_iter().map(|p| (p.symbol, p.shares)))
    }
}

impl From<Holdings> for Vec<Position> {
    fn from(holdings: Holdings) -> Self {
        holdings.positions
    }
}

/// Close-price panel: rows are trading dates (strictly increasing after
/// construction), columns are symbols, cells are positive close prices or
/// `None` for missing observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePanel {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    closes: Vec<Vec<Option<f64>>>,
}

impl PricePanel {
    /// Build a panel from parallel rows. Rows are sorted by date; rows
    /// sharing a date are deduplicated keeping the last one.
    pub fn new(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        closes: Vec<Vec<Option<f64>>>,
    ) -> RiskResult<Self> {
        if symbols.is_empty() {
            return Err(RiskError::InvalidInput {
                field: "symbols".into(),
                reason: "at least one symbol required".into(),
            });
        }
        let symbols: Vec<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
        for (i, s) in symbols.iter().enumerate() {
            if s.is_empty() {
                return Err(RiskError::InvalidInput {
                    field: "symbols".into(),
                    reason: "symbol must be non-empty".into(),
                });
            }
            if symbols[..i].contains(s) {
                return Err(RiskError::InvalidInput {
                    field: "symbols".into(),
                    reason: format!("duplicate symbol {s}"),
                });
            }
        }
        if dates.is_empty() {
            return Err(RiskError::InvalidInput {
                field: "prices".into(),
                reason: "price panel is empty".into(),
            });
        }
        if dates.len() != closes.len() {
            return Err(RiskError::InvalidInput {
                field: "closes".into(),
                reason: format!("expected {} rows, got {}", dates.len(), closes.len()),
            });
        }
        for (t, row) in closes.iter().enumerate() {
            if row.len() != symbols.len() {
                return Err(RiskError::InvalidInput {
                    field: format!("closes[{t}]"),
                    reason: format!("expected {} columns, got {}", symbols.len(), row.len()),
                });
            }
            for (j, cell) in row.iter().enumerate() {
                if let Some(p) = cell {
                    if !p.is_finite() || *p <= 0.0 {
                        return Err(RiskError::InvalidInput {
                            field: format!("closes[{t}][{j}]"),
                            reason: "prices must be positive and finite".into(),
                        });
                    }
                }
            }
        }

        // Sort by date, keeping the last row for any duplicated date.
        let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> =
            dates.into_iter().zip(closes).collect();
        rows.sort_by_key(|(d, _)| *d);
        let mut dates = Vec::with_capacity(rows.len());
        let mut closes: Vec<Vec<Option<f64>>> = Vec::with_capacity(rows.len());
        for (date, row) in rows {
            if dates.last() == Some(&date) {
                *closes.last_mut().expect("row exists for last date") = row;
            } else {
                dates.push(date);
                closes.push(row);
            }
        }

        Ok(PricePanel {
            dates,
            symbols,
            closes,
        })
    }

    /// Build a panel from long-format `(date, symbol, close)` records, the
    /// shape a price-loading collaborator naturally produces. Later records
    /// win on duplicate `(date, symbol)` pairs.
    pub fn from_records<I, S>(records: I) -> RiskResult<Self>
    where
        I: IntoIterator<Item = (NaiveDate, S, f64)>,
        S: AsRef<str>,
    {
        let mut symbols: Vec<String> = Vec::new();
        let mut raw: Vec<(NaiveDate, usize, f64)> = Vec::new();
        for (date, symbol, close) in records {
            let symbol = symbol.as_ref().trim().to_uppercase();
            let col = match symbols.iter().position(|s| *s == symbol) {
                Some(i) => i,
                None => {
                    symbols.push(symbol);
                    symbols.len() - 1
                }
            };
            raw.push((date, col, close));
        }

        let mut dates: Vec<NaiveDate> = raw.iter().map(|(d, _, _)| *d).collect();
        dates.sort();
        dates.dedup();

        let mut closes = vec![vec![None; symbols.len()]; dates.len()];
        for (date, col, close) in raw {
            let t = dates
                .binary_search(&date)
                .expect("date collected from records");
            closes[t][col] = Some(close);
        }

        PricePanel::new(dates, symbols, closes)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn last_date(&self) -> NaiveDate {
        *self.dates.last().expect("panel is never empty")
    }

    pub(crate) fn closes(&self) -> &[Vec<Option<f64>>] {
        &self.closes
    }

    pub(crate) fn column_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }
}

/// Contract for the external price-loading collaborator: given a symbol
/// set and a lookback horizon, return a close-price panel (dates
/// ascending) and the most recent date available from the source.
pub trait PriceSource {
    fn load(&self, symbols: &[String], lookback_days: u32) -> RiskResult<(PricePanel, NaiveDate)>;
}
