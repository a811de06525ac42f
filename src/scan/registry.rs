// =============================================================================
// Scan Registry — market-keyed job state machine with exclusive entry
// =============================================================================
//
// State machine per market:
//
//   Idle → Running → { Completed | Failed | Cancelled } → (Running ...)
//                 ↘ Cancelling → Cancelled
//
// At most one job may be Running (or Cancelling) per market at any instant.
// A second start request while a scan is in flight is rejected fast, never
// queued. Terminal states double as "idle with history": they record the last
// outcome and permit a new scan to start.
//
// Cancellation is cooperative: `cancel` flips a shared atomic flag that the
// orchestrator polls at fan-out granularity. The `ScanTicket` guard releases
// the market slot on every exit path — an early return or panic in the
// orchestrator marks the slot Failed instead of leaving it stuck Running.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::runtime_config::ParameterError;
use crate::types::{Market, ScanStatus};

/// Caller-visible scan failure taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("a scan is already in progress for {0}")]
    AlreadyRunning(Market),
    #[error("no active scan for {0}")]
    NoActiveScan(Market),
    #[error("invalid scan parameters: {0}")]
    InvalidParameters(#[from] ParameterError),
    #[error("failed to load symbol universe for {market}: {source}")]
    UniverseUnavailable {
        market: Market,
        #[source]
        source: anyhow::Error,
    },
}

/// Per-market slot: current status plus the cancellation flag of the scan
/// that owns the slot (if any).
struct JobSlot {
    status: ScanStatus,
    cancel: Arc<AtomicBool>,
}

impl Default for JobSlot {
    fn default() -> Self {
        Self {
            status: ScanStatus::Idle,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Market-keyed registry enforcing the single-active-scan invariant.
#[derive(Default)]
pub struct ScanRegistry {
    slots: Mutex<HashMap<Market, JobSlot>>,
}

impl ScanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the market's slot, transitioning it to Running.
    ///
    /// Fails with [`ScanError::AlreadyRunning`] if a scan for the market is
    /// Running or Cancelling. The returned ticket owns the slot; it must be
    /// finished (or dropped, which records Failed) to release it.
    pub fn begin(self: &Arc<Self>, market: Market) -> Result<ScanTicket, ScanError> {
        let mut slots = self.slots.lock();
        let slot = slots.entry(market).or_default();

        match slot.status {
            ScanStatus::Running | ScanStatus::Cancelling => {
                return Err(ScanError::AlreadyRunning(market));
            }
            _ => {}
        }

        let cancel = Arc::new(AtomicBool::new(false));
        slot.status = ScanStatus::Running;
        slot.cancel = cancel.clone();
        info!(%market, "scan slot reserved");

        Ok(ScanTicket {
            registry: self.clone(),
            market,
            cancel,
            finished: false,
        })
    }

    /// Request cancellation of the in-flight scan for `market`.
    ///
    /// Idempotent while a scan is winding down; fails with
    /// [`ScanError::NoActiveScan`] when nothing is in flight.
    pub fn cancel(&self, market: Market) -> Result<(), ScanError> {
        let mut slots = self.slots.lock();
        let slot = slots.entry(market).or_default();

        match slot.status {
            ScanStatus::Running => {
                slot.status = ScanStatus::Cancelling;
                slot.cancel.store(true, Ordering::SeqCst);
                info!(%market, "scan cancellation requested");
                Ok(())
            }
            ScanStatus::Cancelling => Ok(()),
            _ => Err(ScanError::NoActiveScan(market)),
        }
    }

    /// Current status of the market's slot.
    pub fn status(&self, market: Market) -> ScanStatus {
        self.slots
            .lock()
            .get(&market)
            .map(|s| s.status)
            .unwrap_or(ScanStatus::Idle)
    }

    /// Record a terminal status and release the slot. Only called through
    /// [`ScanTicket`].
    fn release(&self, market: Market, status: ScanStatus) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(&market) {
            slot.status = status;
        }
        info!(%market, %status, "scan slot released");
    }
}

/// Ownership of a reserved market slot for the duration of one scan.
///
/// Exactly one terminal transition happens per ticket: an explicit
/// `finish(...)`, or Failed on drop if the orchestrator bailed out without
/// finishing.
pub struct ScanTicket {
    registry: Arc<ScanRegistry>,
    market: Market,
    cancel: Arc<AtomicBool>,
    finished: bool,
}

impl ScanTicket {
    pub fn market(&self) -> Market {
        self.market
    }

    /// Whether cancellation has been requested for this scan.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Shared cancellation flag, cloned into fan-out workers.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Record the terminal status and release the slot.
    pub fn finish(mut self, status: ScanStatus) {
        debug_assert!(matches!(
            status,
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Cancelled
        ));
        self.finished = true;
        self.registry.release(self.market, status);
    }
}

impl Drop for ScanTicket {
    fn drop(&mut self) {
        if !self.finished {
            warn!(market = %self.market, "scan ticket dropped without finishing — marking Failed");
            self.registry.release(self.market, ScanStatus::Failed);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_is_exclusive_per_market() {
        let registry = Arc::new(ScanRegistry::new());
        let ticket = registry.begin(Market::US).unwrap();
        assert_eq!(registry.status(Market::US), ScanStatus::Running);

        assert!(matches!(
            registry.begin(Market::US),
            Err(ScanError::AlreadyRunning(Market::US))
        ));

        ticket.finish(ScanStatus::Completed);
        assert_eq!(registry.status(Market::US), ScanStatus::Completed);
        // Terminal status permits a fresh scan.
        assert!(registry.begin(Market::US).is_ok());
    }

    #[test]
    fn markets_have_independent_locks() {
        let registry = Arc::new(ScanRegistry::new());
        let _us = registry.begin(Market::US).unwrap();
        let au = registry.begin(Market::AU).unwrap();
        assert_eq!(registry.status(Market::AU), ScanStatus::Running);
        au.finish(ScanStatus::Completed);
    }

    #[test]
    fn cancel_flips_flag_and_status() {
        let registry = Arc::new(ScanRegistry::new());
        let ticket = registry.begin(Market::US).unwrap();
        assert!(!ticket.is_cancelled());

        registry.cancel(Market::US).unwrap();
        assert!(ticket.is_cancelled());
        assert_eq!(registry.status(Market::US), ScanStatus::Cancelling);

        // Idempotent while winding down.
        assert!(registry.cancel(Market::US).is_ok());

        ticket.finish(ScanStatus::Cancelled);
        assert_eq!(registry.status(Market::US), ScanStatus::Cancelled);
    }

    #[test]
    fn cancel_without_active_scan_is_rejected() {
        let registry = Arc::new(ScanRegistry::new());
        assert!(matches!(
            registry.cancel(Market::AU),
            Err(ScanError::NoActiveScan(Market::AU))
        ));

        let ticket = registry.begin(Market::AU).unwrap();
        ticket.finish(ScanStatus::Completed);
        assert!(matches!(
            registry.cancel(Market::AU),
            Err(ScanError::NoActiveScan(Market::AU))
        ));
    }

    #[test]
    fn dropped_ticket_releases_slot_as_failed() {
        let registry = Arc::new(ScanRegistry::new());
        {
            let _ticket = registry.begin(Market::US).unwrap();
            // Early-return path: the ticket is dropped without finishing.
        }
        assert_eq!(registry.status(Market::US), ScanStatus::Failed);
        assert!(registry.begin(Market::US).is_ok());
    }

    #[test]
    fn cancelling_blocks_new_scan_until_release() {
        let registry = Arc::new(ScanRegistry::new());
        let ticket = registry.begin(Market::US).unwrap();
        registry.cancel(Market::US).unwrap();

        assert!(matches!(
            registry.begin(Market::US),
            Err(ScanError::AlreadyRunning(Market::US))
        ));

        ticket.finish(ScanStatus::Cancelled);
        assert!(registry.begin(Market::US).is_ok());
    }
}
