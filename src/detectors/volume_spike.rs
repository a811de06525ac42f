// =============================================================================
// Volume Spike Detector — sustained excess over the trailing average
// =============================================================================
//
// For each day, the baseline is the mean volume of the `volume_window` bars
// strictly preceding (excluding) that day. `volume_ratio` = day volume /
// baseline; a day with a zero or unavailable baseline is not evaluable.
// `consecutive_days` is the maximal run of days whose ratio met the
// market-specific threshold, ending at the latest evaluable day.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::PriceSeries;
use crate::runtime_config::ScanParameters;

/// Magnitude bucket for the latest day's volume ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpikeIntensity {
    Moderate,
    High,
    Extreme,
}

impl std::fmt::Display for SpikeIntensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Moderate => write!(f, "moderate"),
            Self::High => write!(f, "high"),
            Self::Extreme => write!(f, "extreme"),
        }
    }
}

/// Volume-spike evaluation for one symbol, recomputed fully on every scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpikeState {
    /// Latest volume divided by the trailing average volume.
    pub volume_ratio: f64,
    /// The trailing average the ratio was taken against.
    pub avg_volume: f64,
    /// Trailing run of spike days ending at the latest evaluable day.
    pub consecutive_days: u32,
    /// Ratio bucket for the latest day.
    pub intensity: SpikeIntensity,
}

/// Evaluate the volume-spike state at the end of `series` for a market whose
/// spike threshold is `min_ratio`.
///
/// Returns `None` when the latest day has no evaluable baseline (series
/// shorter than `volume_window + 1` bars, or a zero-volume window).
pub fn evaluate_volume_spike(
    series: &PriceSeries,
    min_ratio: f64,
    params: &ScanParameters,
) -> Option<VolumeSpikeState> {
    let bars = series.bars();
    let vw = params.volume_window;
    if bars.len() < vw + 1 {
        return None;
    }

    let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();

    // Ratio for a given day index, `None` when the baseline is unavailable.
    let ratio_at = |idx: usize| -> Option<f64> {
        if idx < vw {
            return None;
        }
        let baseline: f64 = volumes[idx - vw..idx].iter().sum::<f64>() / vw as f64;
        if baseline <= 0.0 {
            return None;
        }
        let r = volumes[idx] / baseline;
        r.is_finite().then_some(r)
    };

    let last = bars.len() - 1;
    let (latest_ratio, latest_avg) = {
        let r = ratio_at(last)?;
        let avg = volumes[last] / r;
        (r, avg)
    };

    // Trailing run of qualifying days. A day that is not evaluable (zero
    // baseline) breaks the run like any non-spike day.
    let mut consecutive_days = 0u32;
    for idx in (vw..=last).rev() {
        match ratio_at(idx) {
            Some(r) if r >= min_ratio => consecutive_days += 1,
            _ => break,
        }
    }

    Some(VolumeSpikeState {
        volume_ratio: latest_ratio,
        avg_volume: latest_avg,
        consecutive_days,
        intensity: classify_intensity(latest_ratio, params),
    })
}

/// Bucket the latest ratio using the configured cut points.
fn classify_intensity(ratio: f64, params: &ScanParameters) -> SpikeIntensity {
    let cuts = params.spike_intensity;
    if ratio >= cuts.extreme_from_ratio {
        SpikeIntensity::Extreme
    } else if ratio >= cuts.high_from_ratio {
        SpikeIntensity::High
    } else {
        SpikeIntensity::Moderate
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{PriceBar, PriceSeries};

    fn series_with_volumes(volumes: &[u64]) -> PriceSeries {
        let bars: Vec<PriceBar> = volumes
            .iter()
            .enumerate()
            .map(|(i, &v)| PriceBar {
                date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                open: 10.0,
                high: 10.5,
                low: 9.5,
                close: 10.0,
                volume: v,
            })
            .collect();
        PriceSeries::new("X", bars).unwrap()
    }

    #[test]
    fn too_short_series_not_evaluable() {
        let params = ScanParameters::default();
        let series = series_with_volumes(&[1000; 30]); // needs 31
        assert!(evaluate_volume_spike(&series, 3.0, &params).is_none());
    }

    #[test]
    fn quiet_series_has_zero_run() {
        let params = ScanParameters::default();
        let series = series_with_volumes(&[1000; 40]);
        let state = evaluate_volume_spike(&series, 3.0, &params).unwrap();
        assert!((state.volume_ratio - 1.0).abs() < 1e-12);
        assert_eq!(state.consecutive_days, 0);
        assert_eq!(state.intensity, SpikeIntensity::Moderate);
    }

    #[test]
    fn baseline_excludes_evaluation_day() {
        let params = ScanParameters::default();
        let mut volumes = vec![1000u64; 30];
        volumes.push(12_000);
        let series = series_with_volumes(&volumes);
        let state = evaluate_volume_spike(&series, 3.0, &params).unwrap();
        // Baseline must be the untouched 1000 average, not diluted by the
        // spike day itself.
        assert!((state.avg_volume - 1000.0).abs() < 1e-9);
        assert!((state.volume_ratio - 12.0).abs() < 1e-9);
        assert_eq!(state.consecutive_days, 1);
    }

    #[test]
    fn three_day_run_reported_at_threshold_ten() {
        let params = ScanParameters::default();
        // Each spike day must clear 10x its *own* trailing baseline, which
        // rises as earlier spike days roll into the window.
        let mut volumes = vec![1000u64; 30];
        volumes.push(12_000); // baseline 1000.0  -> ratio 12.0
        volumes.push(17_000); // baseline 1366.7  -> ratio 12.4
        volumes.push(23_000); // baseline 1900.0  -> ratio 12.1
        let series = series_with_volumes(&volumes);

        let state = evaluate_volume_spike(&series, 10.0, &params).unwrap();
        assert_eq!(state.consecutive_days, 3);
        assert!(state.volume_ratio > 10.0);
        assert_eq!(state.intensity, SpikeIntensity::Extreme);
    }

    #[test]
    fn run_empty_at_threshold_fifteen() {
        let params = ScanParameters::default();
        let mut volumes = vec![1000u64; 30];
        volumes.extend([12_000, 17_000, 23_000]);
        let series = series_with_volumes(&volumes);

        let state = evaluate_volume_spike(&series, 15.0, &params).unwrap();
        assert_eq!(state.consecutive_days, 0);
    }

    #[test]
    fn run_breaks_on_quiet_day() {
        let params = ScanParameters::default();
        let mut volumes = vec![1000u64; 30];
        volumes.extend([12_000, 900, 15_000]); // quiet day splits the run
        let series = series_with_volumes(&volumes);

        let state = evaluate_volume_spike(&series, 3.0, &params).unwrap();
        assert_eq!(state.consecutive_days, 1);
    }

    #[test]
    fn zero_volume_baseline_not_evaluable() {
        let params = ScanParameters::default();
        let mut volumes = vec![0u64; 30];
        volumes.push(5_000);
        let series = series_with_volumes(&volumes);
        assert!(evaluate_volume_spike(&series, 3.0, &params).is_none());
    }

    #[test]
    fn intensity_buckets_follow_cut_points() {
        let params = ScanParameters::default();

        let mut volumes = vec![1000u64; 30];
        volumes.push(4_000);
        let state =
            evaluate_volume_spike(&series_with_volumes(&volumes), 3.0, &params).unwrap();
        assert_eq!(state.intensity, SpikeIntensity::Moderate);

        let mut volumes = vec![1000u64; 30];
        volumes.push(6_000);
        let state =
            evaluate_volume_spike(&series_with_volumes(&volumes), 3.0, &params).unwrap();
        assert_eq!(state.intensity, SpikeIntensity::High);

        let mut volumes = vec![1000u64; 30];
        volumes.push(11_000);
        let state =
            evaluate_volume_spike(&series_with_volumes(&volumes), 3.0, &params).unwrap();
        assert_eq!(state.intensity, SpikeIntensity::Extreme);
    }

    #[test]
    fn custom_cut_points_respected() {
        let mut params = ScanParameters::default();
        params.spike_intensity.high_from_ratio = 3.5;
        params.spike_intensity.extreme_from_ratio = 6.0;

        let mut volumes = vec![1000u64; 30];
        volumes.push(4_000);
        let state =
            evaluate_volume_spike(&series_with_volumes(&volumes), 3.0, &params).unwrap();
        assert_eq!(state.intensity, SpikeIntensity::High);
    }
}
