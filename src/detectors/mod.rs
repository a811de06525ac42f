// =============================================================================
// Signal Detectors Module
// =============================================================================
//
// Stateless classifiers built on the indicator engine. Each detector
// recomputes its state from the full fetched series on every scan; nothing is
// mutated incrementally between scans.

pub mod squeeze;
pub mod volume_spike;

pub use squeeze::{evaluate_squeeze, SqueezeIntensity, SqueezeState};
pub use volume_spike::{evaluate_volume_spike, SpikeIntensity, VolumeSpikeState};
