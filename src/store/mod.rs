// =============================================================================
// Result Store Module
// =============================================================================
//
// Holds the latest published ScanResult per market plus the user-maintained
// curation overlay (excluded / saved symbol sets). Readers never block on an
// in-flight scan: results are swapped in as complete `Arc` snapshots.

pub mod curation;
pub mod results;

pub use curation::{CurationEntry, CurationStore, SavedEntry};
pub use results::{
    ResultStore, ScanResult, SqueezeSignal, SymbolFailure, SymbolSnapshot, VolumeSpikeSignal,
};
