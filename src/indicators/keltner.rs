// =============================================================================
// Keltner Channels
// =============================================================================
//
// Middle = SMA of the trailing closes; upper/lower = middle ± k·ATR where ATR
// is the windowed mean true range over the same period. Because the ATR needs
// one extra bar for its first true range, a channel over `period` bars
// requires `period + 1` bars in total.

use crate::indicators::atr::average_true_range;
use crate::indicators::sma::moving_average;
use crate::market_data::PriceBar;

/// Keltner channel values at a single point in time.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct KeltnerChannels {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Calculate Keltner Channels from the trailing `period` bars.
///
/// Returns `None` when there are fewer than `period + 1` bars or any value is
/// non-finite.
pub fn calculate_keltner(bars: &[PriceBar], period: usize, k: f64) -> Option<KeltnerChannels> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let middle = moving_average(&closes, period)?;
    let atr = average_true_range(bars, period)?;

    let upper = middle + k * atr;
    let lower = middle - k * atr;
    if !upper.is_finite() || !lower.is_finite() {
        return None;
    }

    Some(KeltnerChannels {
        upper,
        middle,
        lower,
    })
}
