// =============================================================================
// Scan Orchestrator — bounded fan-out per-symbol evaluation
// =============================================================================
//
// Drives one market scan end to end: validate parameters, reserve the
// market's job slot, pull the symbol universe, fan out fetch + detector
// evaluation across a semaphore-bounded worker pool, and publish the merged
// ScanResult atomically.
//
// Failure isolation: a symbol whose fetch fails (or times out) is recorded in
// the result's error list and omitted from the signal sets; the scan
// continues. A scan with zero successful symbols still completes with an
// empty result.
//
// Cancellation is polled at fan-out granularity only — before each fetch,
// after each fetch, and between task completions — so cancellation latency is
// bounded by one in-flight worker batch. A cancelled scan publishes nothing;
// the previously published result for the market stays untouched.
// =============================================================================

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::market_data::{PriceSeries, PriceSeriesProvider, SymbolMeta, SymbolUniverseProvider};
use crate::runtime_config::{RuntimeConfig, ScanParameters};
use crate::scan::registry::{ScanError, ScanRegistry, ScanTicket};
use crate::store::{
    CurationStore, ResultStore, ScanResult, SqueezeSignal, SymbolFailure, SymbolSnapshot,
    VolumeSpikeSignal,
};
use crate::detectors::{evaluate_squeeze, evaluate_volume_spike};
use crate::types::{Market, ScanStatus};

/// How a scan ended from the caller's point of view.
#[derive(Debug)]
pub enum ScanOutcome {
    /// The scan finished and published this result.
    Completed(Arc<ScanResult>),
    /// The scan was cancelled; nothing was published.
    Cancelled,
}

/// Per-symbol evaluation outcome inside the fan-out.
enum SymbolEval {
    /// Detectors ran; either may have produced a signal.
    Evaluated {
        squeeze: Option<SqueezeSignal>,
        spike: Option<VolumeSpikeSignal>,
    },
    /// Below the market's turnover floor, or skipped due to cancellation.
    Skipped,
    /// Fetch or evaluation failure, isolated to this symbol.
    Failure { symbol: String, error: String },
}

/// Drives concurrent per-symbol evaluation for one market at a time per
/// market, with cooperative cancellation.
pub struct ScanOrchestrator {
    config: Arc<RwLock<RuntimeConfig>>,
    registry: Arc<ScanRegistry>,
    prices: Arc<dyn PriceSeriesProvider>,
    universe: Arc<dyn SymbolUniverseProvider>,
    results: Arc<ResultStore>,
    curation: Arc<CurationStore>,
}

impl ScanOrchestrator {
    pub fn new(
        config: Arc<RwLock<RuntimeConfig>>,
        registry: Arc<ScanRegistry>,
        prices: Arc<dyn PriceSeriesProvider>,
        universe: Arc<dyn SymbolUniverseProvider>,
        results: Arc<ResultStore>,
        curation: Arc<CurationStore>,
    ) -> Self {
        Self {
            config,
            registry,
            prices,
            universe,
            results,
            curation,
        }
    }

    /// Validate the current parameters and reserve the market's job slot.
    ///
    /// Split from [`execute`](Self::execute) so a request handler can reject
    /// with an accurate already-running answer before spawning the scan task.
    pub fn try_begin(&self, market: Market) -> Result<ScanTicket, ScanError> {
        self.config.read().scan_params.validate()?;
        self.registry.begin(market)
    }

    /// Run the scan owning `ticket` to a terminal state.
    pub async fn execute(&self, ticket: ScanTicket) -> Result<ScanOutcome, ScanError> {
        let market = ticket.market();
        let (params, pool_size, fetch_timeout) = {
            let cfg = self.config.read();
            (
                Arc::new(cfg.scan_params.clone()),
                cfg.max_concurrent_fetches.max(1),
                Duration::from_secs(cfg.fetch_timeout_secs),
            )
        };

        let started = Instant::now();
        info!(%market, pool_size, "scan starting");

        let universe = match self.universe.list(market).await {
            Ok(u) => u,
            Err(e) => {
                warn!(%market, error = %e, "universe provider failed — aborting scan");
                ticket.finish(ScanStatus::Failed);
                return Err(ScanError::UniverseUnavailable { market, source: e });
            }
        };
        let universe_size = universe.len();

        if ticket.is_cancelled() {
            info!(%market, "scan cancelled before fan-out");
            ticket.finish(ScanStatus::Cancelled);
            return Ok(ScanOutcome::Cancelled);
        }

        // ── Fan out ─────────────────────────────────────────────────────
        let semaphore = Arc::new(Semaphore::new(pool_size));
        let cancel = ticket.cancel_flag();
        let mut join_set: JoinSet<SymbolEval> = JoinSet::new();

        for meta in universe {
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let prices = self.prices.clone();
            let params = params.clone();

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(p) => p,
                    // Only happens if the semaphore is closed, which we never do.
                    Err(_) => return SymbolEval::Skipped,
                };

                if cancel.load(Ordering::SeqCst) {
                    return SymbolEval::Skipped;
                }

                let symbol = meta.symbol.clone();
                let fetched = tokio::time::timeout(
                    fetch_timeout,
                    prices.fetch(&symbol, market, params.lookback_days),
                )
                .await;

                let series = match fetched {
                    Err(_) => {
                        return SymbolEval::Failure {
                            symbol,
                            error: format!("fetch timed out after {fetch_timeout:?}"),
                        }
                    }
                    Ok(Err(e)) => {
                        return SymbolEval::Failure {
                            symbol,
                            error: e.to_string(),
                        }
                    }
                    Ok(Ok(s)) => s,
                };

                if cancel.load(Ordering::SeqCst) {
                    return SymbolEval::Skipped;
                }

                evaluate_symbol(meta, &series, market, &params)
            });
        }

        // ── Collect ─────────────────────────────────────────────────────
        let mut squeeze_signals: Vec<SqueezeSignal> = Vec::new();
        let mut volume_spike_signals: Vec<VolumeSpikeSignal> = Vec::new();
        let mut symbol_errors: Vec<SymbolFailure> = Vec::new();

        while let Some(joined) = join_set.join_next().await {
            if ticket.is_cancelled() {
                join_set.shutdown().await;
                info!(%market, "scan cancelled — discarding partial results");
                ticket.finish(ScanStatus::Cancelled);
                return Ok(ScanOutcome::Cancelled);
            }

            match joined {
                Ok(SymbolEval::Evaluated { squeeze, spike }) => {
                    if let Some(s) = squeeze {
                        squeeze_signals.push(s);
                    }
                    if let Some(s) = spike {
                        volume_spike_signals.push(s);
                    }
                }
                Ok(SymbolEval::Skipped) => {}
                Ok(SymbolEval::Failure { symbol, error }) => {
                    symbol_errors.push(SymbolFailure { symbol, error });
                }
                Err(e) => {
                    // A panicked worker loses its symbol attribution but must
                    // not abort the scan.
                    warn!(%market, error = %e, "scan worker panicked");
                    symbol_errors.push(SymbolFailure {
                        symbol: String::new(),
                        error: format!("worker task failed: {e}"),
                    });
                }
            }
        }

        if ticket.is_cancelled() {
            info!(%market, "scan cancelled — discarding partial results");
            ticket.finish(ScanStatus::Cancelled);
            return Ok(ScanOutcome::Cancelled);
        }

        // ── Curation filter + publish ───────────────────────────────────
        // Exclusion applies to squeeze signals only; volume-spike signals are
        // published unfiltered.
        squeeze_signals.retain(|s| !self.curation.is_excluded(&s.snapshot.symbol));

        // Deterministic output order for consumers.
        squeeze_signals.sort_by(|a, b| {
            b.state
                .squeeze_days
                .cmp(&a.state.squeeze_days)
                .then_with(|| a.snapshot.symbol.cmp(&b.snapshot.symbol))
        });
        volume_spike_signals.sort_by(|a, b| {
            b.state
                .volume_ratio
                .total_cmp(&a.state.volume_ratio)
                .then_with(|| a.snapshot.symbol.cmp(&b.snapshot.symbol))
        });

        let result = ScanResult {
            market,
            generated_at: Some(Utc::now()),
            universe_size,
            squeeze_signals,
            volume_spike_signals,
            symbol_errors,
        };

        info!(
            %market,
            universe = universe_size,
            squeeze = result.squeeze_signals.len(),
            spikes = result.volume_spike_signals.len(),
            errors = result.symbol_errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan completed"
        );

        self.results.publish(result);
        ticket.finish(ScanStatus::Completed);
        Ok(ScanOutcome::Completed(self.results.get(market)))
    }

    /// Convenience: reserve and run in one call (scheduler, tests).
    pub async fn run_scan(&self, market: Market) -> Result<ScanOutcome, ScanError> {
        let ticket = self.try_begin(market)?;
        self.execute(ticket).await
    }

    /// Request cancellation of the in-flight scan for `market`.
    pub fn cancel(&self, market: Market) -> Result<(), ScanError> {
        self.registry.cancel(market)
    }

    /// Current job status for `market`.
    pub fn status(&self, market: Market) -> ScanStatus {
        self.registry.status(market)
    }
}

/// Run both detectors over one fetched series.
fn evaluate_symbol(
    meta: SymbolMeta,
    series: &PriceSeries,
    market: Market,
    params: &ScanParameters,
) -> SymbolEval {
    // Turnover floor: thinly traded symbols are skipped, not failed.
    if series.latest_turnover() < params.min_turnover.get(market) {
        return SymbolEval::Skipped;
    }

    // A series too short for either detector is a compute failure.
    if series.len() < params.window + 1 && series.len() < params.volume_window + 1 {
        return SymbolEval::Failure {
            symbol: meta.symbol,
            error: format!("insufficient history ({} bars)", series.len()),
        };
    }

    let snapshot = build_snapshot(&meta, series);

    let squeeze = evaluate_squeeze(series, params)
        .filter(|s| s.squeeze_days >= params.min_squeeze_days)
        .map(|state| SqueezeSignal {
            snapshot: snapshot.clone(),
            state,
        });

    let spike = evaluate_volume_spike(series, params.min_volume_spike_ratio.get(market), params)
        .filter(|s| s.consecutive_days >= params.min_spike_consecutive_days)
        .map(|state| VolumeSpikeSignal {
            snapshot: snapshot.clone(),
            state,
        });

    SymbolEval::Evaluated { squeeze, spike }
}

/// Latest-bar snapshot fields carried into published signals.
fn build_snapshot(meta: &SymbolMeta, series: &PriceSeries) -> SymbolSnapshot {
    let latest = series.latest();
    let (change, change_percent) = match series.latest_change() {
        Some((c, p)) => (Some(c), Some(p)),
        None => (None, None),
    };

    SymbolSnapshot {
        symbol: meta.symbol.clone(),
        company_name: meta.company_name.clone(),
        exchange: meta.exchange.clone(),
        price: latest.close,
        change,
        change_percent,
        volume: latest.volume,
        market_cap: meta.market_cap,
        pe_ratio: meta.pe_ratio,
    }
}
