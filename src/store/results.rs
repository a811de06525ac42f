// =============================================================================
// Result Store — latest ScanResult per market, replaced atomically
// =============================================================================
//
// A completed scan publishes one `Arc<ScanResult>`; the previous result for
// that market is dropped in the same swap. Readers either get the prior
// complete result or an explicit empty result — never a torn one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::detectors::{SqueezeState, VolumeSpikeState};
use crate::types::Market;

/// Price/volume/metadata snapshot carried alongside each signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub symbol: String,
    pub company_name: String,
    pub exchange: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    pub volume: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<f64>,
}

/// One symbol flagged by the squeeze detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqueezeSignal {
    #[serde(flatten)]
    pub snapshot: SymbolSnapshot,
    #[serde(flatten)]
    pub state: SqueezeState,
}

/// One symbol flagged by the volume-spike detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSpikeSignal {
    #[serde(flatten)]
    pub snapshot: SymbolSnapshot,
    #[serde(flatten)]
    pub state: VolumeSpikeState,
}

/// A per-symbol failure recorded during a scan (the scan itself continues).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: String,
}

/// The complete outcome of one market scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub market: Market,
    /// `None` only for the explicit "no data yet" result.
    pub generated_at: Option<DateTime<Utc>>,
    /// Size of the symbol universe the scan iterated over.
    pub universe_size: usize,
    pub squeeze_signals: Vec<SqueezeSignal>,
    pub volume_spike_signals: Vec<VolumeSpikeSignal>,
    pub symbol_errors: Vec<SymbolFailure>,
}

impl ScanResult {
    /// The explicit "no scan has completed yet" result for a market.
    pub fn empty(market: Market) -> Self {
        Self {
            market,
            generated_at: None,
            universe_size: 0,
            squeeze_signals: Vec::new(),
            volume_spike_signals: Vec::new(),
            symbol_errors: Vec::new(),
        }
    }
}

/// Latest published result per market. Last write wins.
#[derive(Default)]
pub struct ResultStore {
    results: RwLock<HashMap<Market, Arc<ScanResult>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the market's result atomically. Readers holding the previous
    /// `Arc` keep a consistent snapshot.
    pub fn publish(&self, result: ScanResult) {
        let market = result.market;
        self.results.write().insert(market, Arc::new(result));
    }

    /// Most recent result for the market, or the explicit empty result if no
    /// scan has completed yet. Never blocks on an in-flight scan.
    pub fn get(&self, market: Market) -> Arc<ScanResult> {
        self.results
            .read()
            .get(&market)
            .cloned()
            .unwrap_or_else(|| Arc::new(ScanResult::empty(market)))
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_universe(market: Market, universe_size: usize) -> ScanResult {
        ScanResult {
            market,
            generated_at: Some(Utc::now()),
            universe_size,
            squeeze_signals: Vec::new(),
            volume_spike_signals: Vec::new(),
            symbol_errors: Vec::new(),
        }
    }

    #[test]
    fn get_before_any_publish_is_explicit_empty() {
        let store = ResultStore::new();
        let result = store.get(Market::US);
        assert!(result.generated_at.is_none());
        assert_eq!(result.universe_size, 0);
        assert!(result.squeeze_signals.is_empty());
    }

    #[test]
    fn publish_replaces_prior_result() {
        let store = ResultStore::new();
        store.publish(result_with_universe(Market::US, 10));
        store.publish(result_with_universe(Market::US, 25));
        assert_eq!(store.get(Market::US).universe_size, 25);
    }

    #[test]
    fn markets_are_independent() {
        let store = ResultStore::new();
        store.publish(result_with_universe(Market::US, 10));
        assert_eq!(store.get(Market::US).universe_size, 10);
        assert!(store.get(Market::AU).generated_at.is_none());
    }

    #[test]
    fn reader_snapshot_survives_replacement() {
        let store = ResultStore::new();
        store.publish(result_with_universe(Market::AU, 5));
        let held = store.get(Market::AU);
        store.publish(result_with_universe(Market::AU, 50));
        // The earlier Arc still sees the old, complete result.
        assert_eq!(held.universe_size, 5);
        assert_eq!(store.get(Market::AU).universe_size, 50);
    }
}
