// =============================================================================
// Runtime Configuration — scan parameters and service settings
// =============================================================================
//
// Every tunable of the scanner lives here: detector thresholds, intensity
// cut points, worker-pool sizing, fetch deadlines, and the daily scan
// schedule. Persistence uses an atomic tmp + rename pattern to prevent
// corruption on crash. All fields carry serde defaults so that adding new
// fields never breaks loading an older config file.
//
// Parameters are validated before any scan may enter the Running state;
// validation failures belong to the caller-facing error taxonomy, not to the
// orchestrator's internal state.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::Market;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_window() -> usize {
    20
}

fn default_band_mult() -> f64 {
    2.0
}

fn default_volume_window() -> usize {
    30
}

fn default_min_squeeze_days() -> u32 {
    5
}

fn default_min_spike_days() -> u32 {
    3
}

fn default_lookback_days() -> u32 {
    150
}

fn default_min_turnover() -> PerMarket<f64> {
    PerMarket {
        us: 1_000_000.0,
        au: 250_000.0,
    }
}

fn default_spike_ratio() -> PerMarket<f64> {
    PerMarket { us: 3.0, au: 3.0 }
}

fn default_squeeze_cuts() -> SqueezeIntensityCuts {
    SqueezeIntensityCuts {
        medium_from_days: 10,
        high_from_days: 15,
    }
}

fn default_spike_cuts() -> SpikeIntensityCuts {
    SpikeIntensityCuts {
        high_from_ratio: 5.0,
        extreme_from_ratio: 10.0,
    }
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

fn default_curation_path() -> String {
    "curation.json".to_string()
}

fn default_schedule() -> PerMarket<ScheduleTime> {
    // 07:00 and 16:30 Sydney time expressed in UTC (post-close for each
    // market's trading day).
    PerMarket {
        us: ScheduleTime {
            hour: 21,
            minute: 0,
        },
        au: ScheduleTime {
            hour: 6,
            minute: 30,
        },
    }
}

// =============================================================================
// PerMarket
// =============================================================================

/// One value per supported market. Keeps market-specific thresholds first
/// class instead of burying them in constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerMarket<T> {
    pub us: T,
    pub au: T,
}

impl<T: Copy> PerMarket<T> {
    pub fn get(&self, market: Market) -> T {
        match market {
            Market::US => self.us,
            Market::AU => self.au,
        }
    }
}

/// UTC wall-clock time of day for a scheduled scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTime {
    pub hour: u32,
    pub minute: u32,
}

// =============================================================================
// Intensity cut points
// =============================================================================

/// Squeeze intensity bucketing by run length: Low below `medium_from_days`,
/// Medium in [medium_from_days, high_from_days), High at or above
/// `high_from_days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqueezeIntensityCuts {
    pub medium_from_days: u32,
    pub high_from_days: u32,
}

/// Volume-spike intensity bucketing by ratio magnitude: Moderate below
/// `high_from_ratio`, High in [high_from_ratio, extreme_from_ratio), Extreme
/// at or above `extreme_from_ratio`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeIntensityCuts {
    pub high_from_ratio: f64,
    pub extreme_from_ratio: f64,
}

// =============================================================================
// ScanParameters
// =============================================================================

/// Validation failure for scan parameters. Surfaced to the caller before a
/// scan ever transitions to Running.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParameterError {
    #[error("indicator window must be at least 2 (got {0})")]
    WindowTooSmall(usize),
    #[error("{name} must be strictly positive (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("squeeze intensity cut points must satisfy min_squeeze_days <= medium_from_days < high_from_days")]
    SqueezeCutsUnordered,
    #[error("spike intensity cut points must satisfy high_from_ratio < extreme_from_ratio")]
    SpikeCutsUnordered,
    #[error("lookback_days ({lookback}) too short to cover the indicator windows")]
    LookbackTooShort { lookback: u32 },
}

/// Thresholds consumed by the detectors and the orchestrator. Immutable for
/// the duration of one scan (the orchestrator clones at scan start).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanParameters {
    /// Trailing window (bars) for Bollinger bands and Keltner channels.
    #[serde(default = "default_window")]
    pub window: usize,

    /// Bollinger standard-deviation multiplier.
    #[serde(default = "default_band_mult")]
    pub bollinger_mult: f64,

    /// Keltner ATR multiplier.
    #[serde(default = "default_band_mult")]
    pub keltner_mult: f64,

    /// Trailing window (bars) for the average-volume baseline.
    #[serde(default = "default_volume_window")]
    pub volume_window: usize,

    /// Minimum trailing squeeze run length before a symbol is reported.
    #[serde(default = "default_min_squeeze_days")]
    pub min_squeeze_days: u32,

    /// Minimum trailing spike run length before a symbol is reported.
    #[serde(default = "default_min_spike_days")]
    pub min_spike_consecutive_days: u32,

    /// Minimum latest-day turnover (close × volume), per market. Symbols
    /// below this are skipped, not failed.
    #[serde(default = "default_min_turnover")]
    pub min_turnover: PerMarket<f64>,

    /// Volume ratio a day must reach to count as a spike day, per market.
    #[serde(default = "default_spike_ratio")]
    pub min_volume_spike_ratio: PerMarket<f64>,

    /// Squeeze intensity bucket boundaries.
    #[serde(default = "default_squeeze_cuts")]
    pub squeeze_intensity: SqueezeIntensityCuts,

    /// Spike intensity bucket boundaries.
    #[serde(default = "default_spike_cuts")]
    pub spike_intensity: SpikeIntensityCuts,

    /// Calendar days of history requested per symbol.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            window: default_window(),
            bollinger_mult: default_band_mult(),
            keltner_mult: default_band_mult(),
            volume_window: default_volume_window(),
            min_squeeze_days: default_min_squeeze_days(),
            min_spike_consecutive_days: default_min_spike_days(),
            min_turnover: default_min_turnover(),
            min_volume_spike_ratio: default_spike_ratio(),
            squeeze_intensity: default_squeeze_cuts(),
            spike_intensity: default_spike_cuts(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl ScanParameters {
    /// Validate every threshold. Called once per scan, before the market's
    /// job slot is even reserved.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.window < 2 {
            return Err(ParameterError::WindowTooSmall(self.window));
        }

        let positives: [(&'static str, f64); 9] = [
            ("bollinger_mult", self.bollinger_mult),
            ("keltner_mult", self.keltner_mult),
            ("volume_window", self.volume_window as f64),
            ("min_squeeze_days", self.min_squeeze_days as f64),
            (
                "min_spike_consecutive_days",
                self.min_spike_consecutive_days as f64,
            ),
            ("min_turnover.us", self.min_turnover.us),
            ("min_turnover.au", self.min_turnover.au),
            ("min_volume_spike_ratio.us", self.min_volume_spike_ratio.us),
            ("min_volume_spike_ratio.au", self.min_volume_spike_ratio.au),
        ];
        for (name, value) in positives {
            if !(value > 0.0) {
                return Err(ParameterError::NonPositive { name, value });
            }
        }

        if self.squeeze_intensity.medium_from_days < self.min_squeeze_days
            || self.squeeze_intensity.high_from_days <= self.squeeze_intensity.medium_from_days
        {
            return Err(ParameterError::SqueezeCutsUnordered);
        }
        if self.spike_intensity.extreme_from_ratio <= self.spike_intensity.high_from_ratio {
            return Err(ParameterError::SpikeCutsUnordered);
        }

        // Rough trading-day coverage check: the fetched window must at least
        // cover the widest indicator window plus one bar for the first ATR.
        let needed = (self.window.max(self.volume_window) + 1) as u32;
        if self.lookback_days < needed {
            return Err(ParameterError::LookbackTooShort {
                lookback: self.lookback_days,
            });
        }

        Ok(())
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the scanner service.
///
/// Every field has a serde default so that older JSON files missing new
/// fields still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Detector and orchestrator thresholds.
    #[serde(default)]
    pub scan_params: ScanParameters,

    /// Worker-pool bound for per-symbol fan-out within one scan.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Per-symbol fetch deadline. Expiry is a per-symbol failure, never a
    /// scan failure.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Whether the daily scheduler triggers scans automatically.
    #[serde(default)]
    pub enable_scheduled_scans: bool,

    /// Daily scheduled scan time per market (UTC).
    #[serde(default = "default_schedule")]
    pub schedule: PerMarket<ScheduleTime>,

    /// Path of the curation overlay persistence file.
    #[serde(default = "default_curation_path")]
    pub curation_path: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scan_params: ScanParameters::default(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            enable_scheduled_scans: false,
            schedule: default_schedule(),
            curation_path: default_curation_path(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            window = config.scan_params.window,
            max_concurrent_fetches = config.max_concurrent_fetches,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_validate() {
        assert_eq!(ScanParameters::default().validate(), Ok(()));
    }

    #[test]
    fn default_parameter_values() {
        let p = ScanParameters::default();
        assert_eq!(p.window, 20);
        assert_eq!(p.volume_window, 30);
        assert_eq!(p.min_squeeze_days, 5);
        assert_eq!(p.min_spike_consecutive_days, 3);
        assert!((p.bollinger_mult - 2.0).abs() < f64::EPSILON);
        assert!((p.keltner_mult - 2.0).abs() < f64::EPSILON);
        assert!((p.min_volume_spike_ratio.get(Market::US) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_positive_threshold_rejected() {
        let mut p = ScanParameters::default();
        p.min_volume_spike_ratio.au = 0.0;
        assert!(matches!(
            p.validate(),
            Err(ParameterError::NonPositive {
                name: "min_volume_spike_ratio.au",
                ..
            })
        ));
    }

    #[test]
    fn negative_turnover_rejected() {
        let mut p = ScanParameters::default();
        p.min_turnover.us = -1.0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn unordered_squeeze_cuts_rejected() {
        let mut p = ScanParameters::default();
        p.squeeze_intensity.high_from_days = p.squeeze_intensity.medium_from_days;
        assert_eq!(p.validate(), Err(ParameterError::SqueezeCutsUnordered));
    }

    #[test]
    fn unordered_spike_cuts_rejected() {
        let mut p = ScanParameters::default();
        p.spike_intensity.extreme_from_ratio = 4.0;
        assert_eq!(p.validate(), Err(ParameterError::SpikeCutsUnordered));
    }

    #[test]
    fn tiny_window_rejected() {
        let mut p = ScanParameters::default();
        p.window = 1;
        assert_eq!(p.validate(), Err(ParameterError::WindowTooSmall(1)));
    }

    #[test]
    fn short_lookback_rejected() {
        let mut p = ScanParameters::default();
        p.lookback_days = 10;
        assert!(matches!(
            p.validate(),
            Err(ParameterError::LookbackTooShort { lookback: 10 })
        ));
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.scan_params, ScanParameters::default());
        assert_eq!(cfg.max_concurrent_fetches, 8);
        assert_eq!(cfg.fetch_timeout_secs, 15);
        assert!(!cfg.enable_scheduled_scans);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "scan_params": { "min_squeeze_days": 7 }, "max_concurrent_fetches": 4 }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.scan_params.min_squeeze_days, 7);
        assert_eq!(cfg.scan_params.window, 20);
        assert_eq!(cfg.max_concurrent_fetches, 4);
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut cfg = RuntimeConfig::default();
        cfg.scan_params.min_squeeze_days = 6;
        cfg.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.scan_params.min_squeeze_days, 6);
        assert_eq!(loaded.scan_params, cfg.scan_params);
    }

    #[test]
    fn per_market_lookup() {
        let cuts = default_min_turnover();
        assert!(cuts.get(Market::US) > cuts.get(Market::AU));
    }
}
