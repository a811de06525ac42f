// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicator math used by the
// signal detectors. Every public function returns `Option<T>` so callers are
// forced to handle insufficient-data and numerical-edge-case scenarios; a
// symbol with fewer than the required bars is simply not evaluable that day.

pub mod atr;
pub mod bollinger;
pub mod keltner;
pub mod sma;

pub use atr::average_true_range;
pub use bollinger::{calculate_bollinger, BollingerBands};
pub use keltner::{calculate_keltner, KeltnerChannels};
pub use sma::{moving_average, std_deviation};
