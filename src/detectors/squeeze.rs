// =============================================================================
// Squeeze Detector — Bollinger-inside-Keltner volatility contraction
// =============================================================================
//
// A trading day is squeeze-active iff the Bollinger bands computed from the
// trailing window ending that day sit strictly inside the Keltner channels
// from the same window:
//
//   bb.upper < kc.upper  AND  bb.lower > kc.lower
//
// `squeeze_days` is the maximal run of squeeze-active days ending at the most
// recent evaluable day; it resets to 0 the moment a day is not active.
// Momentum is the least-squares slope of the Bollinger middle band across the
// run — positive means the price drifted upward during the contraction.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::{calculate_bollinger, calculate_keltner};
use crate::market_data::PriceSeries;
use crate::runtime_config::ScanParameters;

/// How long the symbol has been coiled, bucketed by configurable cut points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqueezeIntensity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for SqueezeIntensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Squeeze evaluation for one symbol, recomputed fully on every scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqueezeState {
    /// Whether the latest evaluable day is squeeze-active.
    pub squeeze_active: bool,
    /// Trailing run of squeeze-active days ending at the latest evaluable day.
    pub squeeze_days: u32,
    /// Run-length bucket (meaningful once the run clears the reporting floor).
    pub intensity: SqueezeIntensity,
    /// Slope of the Bollinger middle band over the squeeze run.
    pub momentum: f64,
}

/// Evaluate the squeeze state at the end of `series`.
///
/// Returns `None` when the series is too short for even one evaluable day
/// (the window needs one extra bar for the first true range).
pub fn evaluate_squeeze(series: &PriceSeries, params: &ScanParameters) -> Option<SqueezeState> {
    let bars = series.bars();
    let window = params.window;
    if bars.len() < window + 1 {
        return None;
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    // Walk backwards from the latest bar, extending the run while each day is
    // squeeze-active. Middle-band values are collected (latest first) for the
    // momentum slope. The first evaluable index is `window` (0-based), which
    // has `window + 1` bars of history ending at it.
    let mut run_middles: Vec<f64> = Vec::new();
    let mut latest_active = None;

    for idx in (window..bars.len()).rev() {
        let day_closes = &closes[..=idx];
        let day_bars = &bars[..=idx];

        let active = match (
            calculate_bollinger(day_closes, window, params.bollinger_mult),
            calculate_keltner(day_bars, window, params.keltner_mult),
        ) {
            (Some(bb), Some(kc)) => {
                let active = bb.upper < kc.upper && bb.lower > kc.lower;
                if active {
                    run_middles.push(bb.middle);
                }
                active
            }
            // A non-evaluable day (degenerate numerics) breaks the run.
            _ => false,
        };

        if latest_active.is_none() {
            latest_active = Some(active);
        }
        if !active {
            break;
        }
    }

    let squeeze_active = latest_active?;
    let squeeze_days = run_middles.len() as u32;

    // run_middles is newest-first; momentum wants chronological order.
    run_middles.reverse();
    let momentum = slope(&run_middles);

    Some(SqueezeState {
        squeeze_active,
        squeeze_days,
        intensity: classify_intensity(squeeze_days, params),
        momentum,
    })
}

/// Bucket a run length using the configured cut points.
fn classify_intensity(squeeze_days: u32, params: &ScanParameters) -> SqueezeIntensity {
    let cuts = params.squeeze_intensity;
    if squeeze_days >= cuts.high_from_days {
        SqueezeIntensity::High
    } else if squeeze_days >= cuts.medium_from_days {
        SqueezeIntensity::Medium
    } else {
        SqueezeIntensity::Low
    }
}

/// Least-squares slope of `values` against their index. Zero for fewer than
/// two points.
fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }

    if den == 0.0 {
        return 0.0;
    }
    let s = num / den;
    if s.is_finite() {
        s
    } else {
        0.0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PriceBar;

    fn bar(day_index: u32, close: f64, range: f64) -> PriceBar {
        PriceBar {
            // Sequential weekday-agnostic dates are fine for detector tests.
            date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                + chrono::Duration::days(day_index as i64),
            open: close,
            high: close + range / 2.0,
            low: close - range / 2.0,
            close,
            volume: 10_000,
        }
    }

    /// Flat closes with zero ranges: ATR = 0, σ = 0, bands coincide, so the
    /// strict containment test fails — not a squeeze.
    fn dead_flat(n: u32, start: u32) -> Vec<PriceBar> {
        (0..n).map(|i| bar(start + i, 100.0, 0.0)).collect()
    }

    /// Flat closes with a wide range: σ = 0 (Bollinger collapses onto the
    /// middle) while ATR > 0 (Keltner stays wide) — squeeze-active as soon as
    /// one wide bar enters the ATR window.
    fn coiled(n: u32, start: u32) -> Vec<PriceBar> {
        (0..n).map(|i| bar(start + i, 100.0, 10.0)).collect()
    }

    #[test]
    fn too_short_series_not_evaluable() {
        let params = ScanParameters::default();
        let series = PriceSeries::new("X", coiled(20, 0)).unwrap(); // needs 21
        assert!(evaluate_squeeze(&series, &params).is_none());
    }

    #[test]
    fn run_of_exactly_seven_days() {
        let params = ScanParameters::default();
        // 33 dead-flat bars (inactive once evaluable), then 7 coiled bars:
        // each of the last 7 days has a wide bar inside its ATR window, so
        // exactly those 7 days are active.
        let mut bars = dead_flat(33, 0);
        bars.extend(coiled(7, 33));
        let series = PriceSeries::new("X", bars).unwrap();

        let state = evaluate_squeeze(&series, &params).unwrap();
        assert!(state.squeeze_active);
        assert_eq!(state.squeeze_days, 7);
        assert_eq!(state.intensity, SqueezeIntensity::Low);
    }

    #[test]
    fn run_resets_to_zero_after_break_day() {
        let params = ScanParameters::default();
        let mut bars = dead_flat(33, 0);
        bars.extend(coiled(7, 33));
        // Break day: a large close jump blows out σ while ATR stays modest,
        // pushing the Bollinger bands outside the Keltner channels.
        bars.push(bar(40, 200.0, 0.0));
        let series = PriceSeries::new("X", bars).unwrap();

        let state = evaluate_squeeze(&series, &params).unwrap();
        assert!(!state.squeeze_active);
        assert_eq!(state.squeeze_days, 0);
    }

    #[test]
    fn long_run_classified_high() {
        let mut params = ScanParameters::default();
        params.squeeze_intensity.medium_from_days = 10;
        params.squeeze_intensity.high_from_days = 15;

        let mut bars = dead_flat(25, 0);
        bars.extend(coiled(18, 25));
        let series = PriceSeries::new("X", bars).unwrap();

        let state = evaluate_squeeze(&series, &params).unwrap();
        assert_eq!(state.squeeze_days, 18);
        assert_eq!(state.intensity, SqueezeIntensity::High);
    }

    #[test]
    fn intermediate_run_classified_medium() {
        let params = ScanParameters::default();
        let mut bars = dead_flat(28, 0);
        bars.extend(coiled(12, 28));
        let series = PriceSeries::new("X", bars).unwrap();

        let state = evaluate_squeeze(&series, &params).unwrap();
        assert_eq!(state.squeeze_days, 12);
        assert_eq!(state.intensity, SqueezeIntensity::Medium);
    }

    #[test]
    fn momentum_sign_follows_drift() {
        let params = ScanParameters::default();
        // Coiled bars whose closes drift gently upward: σ stays small
        // relative to the wide ATR, so the squeeze holds while the middle
        // band rises.
        let mut bars = dead_flat(30, 0);
        bars.extend((0..8).map(|i| bar(30 + i, 100.0 + i as f64 * 0.05, 12.0)));
        let series = PriceSeries::new("X", bars).unwrap();

        let state = evaluate_squeeze(&series, &params).unwrap();
        assert!(state.squeeze_days >= 2, "need a run to measure momentum");
        assert!(
            state.momentum > 0.0,
            "upward drift must give positive momentum, got {}",
            state.momentum
        );
    }

    #[test]
    fn momentum_zero_for_flat_run() {
        let params = ScanParameters::default();
        let mut bars = dead_flat(33, 0);
        bars.extend(coiled(7, 33));
        let series = PriceSeries::new("X", bars).unwrap();

        let state = evaluate_squeeze(&series, &params).unwrap();
        assert!(state.momentum.abs() < 1e-9);
    }

    #[test]
    fn slope_helper() {
        assert_eq!(slope(&[]), 0.0);
        assert_eq!(slope(&[5.0]), 0.0);
        assert!((slope(&[1.0, 2.0, 3.0]) - 1.0).abs() < 1e-12);
        assert!((slope(&[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
    }
}
