// =============================================================================
// Average True Range (ATR) — windowed arithmetic mean of True Range
// =============================================================================
//
// True Range (TR) for each bar:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR here is the plain mean of the trailing `period` TR values. Each TR
// needs the previous bar's close, so `period` TR values require `period + 1`
// bars.
// =============================================================================

use crate::market_data::PriceBar;

/// True range of a bar given the previous bar's close.
pub fn true_range(bar: &PriceBar, prev_close: f64) -> f64 {
    let hl = bar.high - bar.low;
    let hc = (bar.high - prev_close).abs();
    let lc = (bar.low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Mean true range over the trailing `period` bars.
///
/// Returns `None` when:
/// - `period` is zero.
/// - There are fewer than `period + 1` bars.
/// - Any intermediate value is non-finite.
pub fn average_true_range(bars: &[PriceBar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }

    // Trailing window: the last `period` bars, each paired with its
    // predecessor for the previous close.
    let start = bars.len() - period;
    let mut sum = 0.0;
    for i in start..bars.len() {
        sum += true_range(&bars[i], bars[i - 1].close);
    }

    let atr = sum / period as f64;
    atr.is_finite().then_some(atr)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, open: f64, high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar {
            date: chrono::NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open,
            high,
            low,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn atr_period_zero() {
        let bars = vec![bar(1, 100.0, 105.0, 95.0, 102.0); 5];
        assert!(average_true_range(&bars, 0).is_none());
    }

    #[test]
    fn atr_insufficient_data() {
        // period=14 needs 15 bars.
        let bars: Vec<PriceBar> = (1..=14).map(|d| bar(d, 100.0, 105.0, 95.0, 102.0)).collect();
        assert!(average_true_range(&bars, 14).is_none());
    }

    #[test]
    fn atr_constant_range() {
        // Every bar: H-L = 10, close at mid. TR is constant 10 once prev
        // close sits inside the range, so the mean is exactly 10.
        let bars: Vec<PriceBar> = (1..=21)
            .map(|d| bar(d, 100.0, 105.0, 95.0, 100.0))
            .collect();
        let atr = average_true_range(&bars, 20).unwrap();
        assert!((atr - 10.0).abs() < 1e-12, "expected 10.0, got {atr}");
    }

    #[test]
    fn atr_gap_uses_prev_close() {
        // Gap up: |H - prevClose| dominates H - L.
        let bars = vec![
            bar(1, 100.0, 105.0, 95.0, 95.0),
            bar(2, 110.0, 115.0, 108.0, 112.0), // TR = |115-95| = 20
            bar(3, 112.0, 118.0, 110.0, 115.0), // TR = max(8, 6, 2) = 8
        ];
        let atr = average_true_range(&bars, 2).unwrap();
        assert!((atr - 14.0).abs() < 1e-12, "expected (20+8)/2, got {atr}");
    }

    #[test]
    fn atr_uses_trailing_window_only() {
        // Huge ranges early, tiny ranges in the trailing window.
        let mut bars: Vec<PriceBar> = (1..=5).map(|d| bar(d, 100.0, 200.0, 0.0, 100.0)).collect();
        bars.extend((6..=11).map(|d| bar(d, 100.0, 101.0, 99.0, 100.0)));
        let atr = average_true_range(&bars, 5).unwrap();
        assert!((atr - 2.0).abs() < 1e-12, "expected 2.0, got {atr}");
    }

    #[test]
    fn atr_nan_returns_none() {
        let bars = vec![
            bar(1, 100.0, 105.0, 95.0, 100.0),
            PriceBar {
                date: chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                open: 100.0,
                high: f64::NAN,
                low: 95.0,
                close: 100.0,
                volume: 1000,
            },
            bar(3, 100.0, 105.0, 95.0, 100.0),
        ];
        assert!(average_true_range(&bars, 2).is_none());
    }
}
