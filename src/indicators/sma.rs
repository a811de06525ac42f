// =============================================================================
// Simple Moving Average + Population Standard Deviation
// =============================================================================
//
// Both operate on the trailing `period` values of the input slice. The
// standard deviation is the *population* form (divide by N, not N-1), to
// match the Bollinger band definition used by the detectors.

/// Arithmetic mean of the last `period` values.
///
/// Returns `None` when `period` is zero, there are fewer than `period`
/// values, or the result is non-finite.
pub fn moving_average(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    mean.is_finite().then_some(mean)
}

/// Population standard deviation of the last `period` values about their mean.
///
/// Returns `None` under the same conditions as [`moving_average`].
pub fn std_deviation(values: &[f64], period: usize) -> Option<f64> {
    let mean = moving_average(values, period)?;
    let window = &values[values.len() - period..];
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
    let sd = variance.sqrt();
    sd.is_finite().then_some(sd)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_basic() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(moving_average(&values, 4), Some(2.5));
        // Trailing window only.
        assert_eq!(moving_average(&values, 2), Some(3.5));
    }

    #[test]
    fn sma_period_zero() {
        assert!(moving_average(&[1.0, 2.0], 0).is_none());
    }

    #[test]
    fn sma_insufficient_data() {
        assert!(moving_average(&[1.0, 2.0], 3).is_none());
    }

    #[test]
    fn sma_nan_returns_none() {
        assert!(moving_average(&[1.0, f64::NAN, 3.0], 3).is_none());
    }

    #[test]
    fn std_dev_flat_series_is_zero() {
        let values = vec![5.0; 20];
        assert_eq!(std_deviation(&values, 20), Some(0.0));
    }

    #[test]
    fn std_dev_population_form() {
        // Values 2, 4, 4, 4, 5, 5, 7, 9 — classic example, population σ = 2.
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let sd = std_deviation(&values, 8).unwrap();
        assert!((sd - 2.0).abs() < 1e-12, "expected σ=2, got {sd}");
    }

    #[test]
    fn std_dev_uses_trailing_window() {
        // First half wildly different from the flat trailing window.
        let mut values = vec![1000.0, -1000.0, 500.0];
        values.extend(std::iter::repeat(10.0).take(5));
        assert_eq!(std_deviation(&values, 5), Some(0.0));
    }
}
