// =============================================================================
// Provider Seams — injected data-source contracts
// =============================================================================
//
// The orchestrator is written against these two traits only. Production wires
// in `EodhdClient`; tests wire in in-memory mocks. Both traits are object
// safe so they can be held as `Arc<dyn ...>` inside shared state.

use anyhow::Result;
use async_trait::async_trait;

use crate::market_data::{PriceSeries, SymbolMeta};
use crate::types::Market;

/// Source of historical daily price/volume series for a single symbol.
#[async_trait]
pub trait PriceSeriesProvider: Send + Sync {
    /// Fetch the daily series for `symbol`, covering at least the trailing
    /// `lookback_days` calendar days, oldest bar first.
    ///
    /// Implementations own their transport-level timeouts; the orchestrator
    /// additionally wraps each call in its own per-symbol deadline so a hung
    /// fetch can never stall a scan.
    async fn fetch(&self, symbol: &str, market: Market, lookback_days: u32)
        -> Result<PriceSeries>;
}

/// Source of the symbol universe for a market.
#[async_trait]
pub trait SymbolUniverseProvider: Send + Sync {
    /// List every scannable symbol in `market` with its snapshot metadata.
    async fn list(&self, market: Market) -> Result<Vec<SymbolMeta>>;
}
