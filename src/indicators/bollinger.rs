// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band = SMA of the trailing window; upper/lower = middle ± k·σ where
// σ is the population standard deviation of the same window.

use crate::indicators::sma::{moving_average, std_deviation};

/// Bollinger band values at a single point in time.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Calculate Bollinger Bands from the trailing `period` closes.
///
/// Returns `None` when there are fewer than `period` closes or any value is
/// non-finite.
pub fn calculate_bollinger(closes: &[f64], period: usize, k: f64) -> Option<BollingerBands> {
    let middle = moving_average(closes, period)?;
    let sd = std_deviation(closes, period)?;

    let upper = middle + k * sd;
    let lower = middle - k * sd;
    if !upper.is_finite() || !lower.is_finite() {
        return None;
    }

    Some(BollingerBands {
        upper,
        middle,
        lower,
    })
}
