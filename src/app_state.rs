// =============================================================================
// Central Application State — Meridian Scanner
// =============================================================================
//
// Ties the long-lived subsystems together: the runtime configuration, the
// per-market scan registry, the orchestrator that drives scans, and the
// result/curation stores backing the API. All handlers and background tasks
// share one `Arc<AppState>`.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for mutable shared collections.
//   - Arc wrappers for subsystems that manage their own interior mutability.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::market_data::{PriceSeriesProvider, SymbolUniverseProvider};
use crate::runtime_config::RuntimeConfig;
use crate::scan::{ScanOrchestrator, ScanRegistry};
use crate::store::{CurationStore, ResultStore};
use crate::types::Market;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded operational error for the status API.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, bumped on every meaningful
    /// state mutation. Clients poll this to detect fresh data cheaply.
    pub state_version: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    /// Path the runtime configuration is persisted to.
    pub config_path: String,

    // ── Scanning ────────────────────────────────────────────────────────
    pub registry: Arc<ScanRegistry>,
    pub orchestrator: Arc<ScanOrchestrator>,

    // ── Stores ──────────────────────────────────────────────────────────
    pub results: Arc<ResultStore>,
    pub curation: Arc<CurationStore>,

    // ── Error Log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── Timing ──────────────────────────────────────────────────────────
    /// Instant the service started, for uptime reporting.
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct the shared state from configuration and the data providers.
    ///
    /// The returned value is typically wrapped in `Arc` immediately.
    pub fn new(
        config: RuntimeConfig,
        config_path: String,
        prices: Arc<dyn PriceSeriesProvider>,
        universe: Arc<dyn SymbolUniverseProvider>,
        curation: Arc<CurationStore>,
    ) -> Self {
        let runtime_config = Arc::new(RwLock::new(config));
        let registry = Arc::new(ScanRegistry::new());
        let results = Arc::new(ResultStore::new());

        let orchestrator = Arc::new(ScanOrchestrator::new(
            runtime_config.clone(),
            registry.clone(),
            prices,
            universe,
            results.clone(),
            curation.clone(),
        ));

        Self {
            state_version: AtomicU64::new(1),
            runtime_config,
            config_path,
            registry,
            orchestrator,
            results,
            curation,
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    /// Atomically increment the state version. Call after every meaningful
    /// mutation.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    /// Read the current state version without modifying it.
    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an operational error. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted first.
    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }

        self.increment_version();
    }

    // ── Market status snapshot ──────────────────────────────────────────

    /// Per-market operational summary served by `GET /api/v1/market-status`.
    pub fn market_status(&self) -> Vec<MarketStatus> {
        let now = Utc::now();
        Market::ALL
            .iter()
            .map(|&market| {
                let result = self.results.get(market);
                MarketStatus {
                    market,
                    is_open: market.is_open_at(now),
                    local_time: now.with_timezone(&market.timezone()).to_rfc3339(),
                    scan_status: self.registry.status(market).to_string(),
                    last_scan_at: result.generated_at,
                    universe_size: result.universe_size,
                    squeeze_signals: result.squeeze_signals.len(),
                    volume_spike_signals: result.volume_spike_signals.len(),
                    symbol_errors: result.symbol_errors.len(),
                }
            })
            .collect()
    }
}

/// One market's row in the status summary.
#[derive(Debug, Clone, Serialize)]
pub struct MarketStatus {
    pub market: Market,
    /// Whether the regular trading session is open right now.
    pub is_open: bool,
    /// Current wall-clock time in the market's timezone (RFC 3339).
    pub local_time: String,
    pub scan_status: String,
    pub last_scan_at: Option<chrono::DateTime<Utc>>,
    pub universe_size: usize,
    pub squeeze_signals: usize,
    pub volume_spike_signals: usize,
    pub symbol_errors: usize,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{PriceSeries, SymbolMeta};
    use anyhow::Result;
    use async_trait::async_trait;

    struct NullPrices;

    #[async_trait]
    impl PriceSeriesProvider for NullPrices {
        async fn fetch(
            &self,
            symbol: &str,
            _market: Market,
            _lookback_days: u32,
        ) -> Result<PriceSeries> {
            anyhow::bail!("no data for {symbol}")
        }
    }

    struct NullUniverse;

    #[async_trait]
    impl SymbolUniverseProvider for NullUniverse {
        async fn list(&self, _market: Market) -> Result<Vec<SymbolMeta>> {
            Ok(Vec::new())
        }
    }

    fn state() -> AppState {
        AppState::new(
            RuntimeConfig::default(),
            "runtime_config.json".to_string(),
            Arc::new(NullPrices),
            Arc::new(NullUniverse),
            Arc::new(CurationStore::in_memory()),
        )
    }

    #[test]
    fn version_increments_monotonically() {
        let s = state();
        let v0 = s.current_state_version();
        s.increment_version();
        assert_eq!(s.current_state_version(), v0 + 1);
    }

    #[test]
    fn error_ring_buffer_is_capped() {
        let s = state();
        for i in 0..(MAX_RECENT_ERRORS + 10) {
            s.push_error(format!("error {i}"));
        }
        let errors = s.recent_errors.read();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        // Oldest entries were evicted.
        assert_eq!(errors[0].message, "error 10");
    }

    #[test]
    fn market_status_covers_every_market() {
        let s = state();
        let status = s.market_status();
        assert_eq!(status.len(), Market::ALL.len());
        assert!(status.iter().all(|m| m.scan_status == "Idle"));
        assert!(status.iter().all(|m| m.last_scan_at.is_none()));
    }
}
