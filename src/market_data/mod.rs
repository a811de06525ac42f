// =============================================================================
// Market Data Module
// =============================================================================
//
// Ordered daily OHLCV series plus the provider seams the scanner consumes.
// The scanner never talks to a vendor directly; it goes through the
// `PriceSeriesProvider` / `SymbolUniverseProvider` traits in `provider`.

pub mod eodhd;
pub mod provider;

pub use eodhd::EodhdClient;
pub use provider::{PriceSeriesProvider, SymbolUniverseProvider};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily OHLCV bar. Immutable once fetched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// An ordered sequence of daily bars for one symbol, oldest first.
///
/// Invariant: strictly increasing dates, no duplicates. The invariant is
/// enforced at construction so every downstream consumer can rely on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

/// Why a bar sequence was rejected as a `PriceSeries`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SeriesError {
    #[error("series for {symbol} is empty")]
    Empty { symbol: String },
    #[error("series for {symbol} has non-increasing dates at index {index}")]
    OutOfOrder { symbol: String, index: usize },
}

impl PriceSeries {
    /// Build a series from bars already in oldest-first order, validating
    /// the strictly-increasing-dates invariant.
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(SeriesError::Empty { symbol });
        }
        for i in 1..bars.len() {
            if bars[i].date <= bars[i - 1].date {
                return Err(SeriesError::OutOfOrder { symbol, index: i });
            }
        }
        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Most recent bar. A series is never empty, so this always succeeds.
    pub fn latest(&self) -> &PriceBar {
        self.bars.last().expect("series is never empty")
    }

    /// Close-to-close change between the last two bars, absolute and percent.
    /// `None` when there is only one bar or the previous close is zero.
    pub fn latest_change(&self) -> Option<(f64, f64)> {
        if self.bars.len() < 2 {
            return None;
        }
        let prev = self.bars[self.bars.len() - 2].close;
        if prev == 0.0 {
            return None;
        }
        let change = self.latest().close - prev;
        Some((change, change / prev * 100.0))
    }

    /// Latest daily turnover (close × volume) — used for the per-market
    /// minimum-turnover filter.
    pub fn latest_turnover(&self) -> f64 {
        let bar = self.latest();
        bar.close * bar.volume as f64
    }
}

/// Static metadata for one symbol as supplied by the universe provider.
/// Snapshot fields are carried verbatim into published signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolMeta {
    pub symbol: String,
    pub company_name: String,
    pub exchange: String,
    #[serde(default)]
    pub market_cap: Option<u64>,
    #[serde(default)]
    pub pe_ratio: Option<f64>,
}
