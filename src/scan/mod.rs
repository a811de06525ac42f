// =============================================================================
// Scan Module
// =============================================================================
//
// The per-market job registry (state machine + cancellation) and the
// orchestrator that drives bounded-concurrency symbol evaluation.

pub mod orchestrator;
pub mod registry;

pub use orchestrator::{ScanOrchestrator, ScanOutcome};
pub use registry::{ScanError, ScanRegistry, ScanTicket};
