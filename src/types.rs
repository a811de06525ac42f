// =============================================================================
// Shared types used across the Meridian scanner
// =============================================================================

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Market (country) partition of the symbol universe. Each market carries its
/// own scan parameters and its own concurrency lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    US,
    AU,
}

impl Market {
    /// All supported markets, in a stable order.
    pub const ALL: [Market; 2] = [Market::US, Market::AU];

    /// Parse a market code case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "US" => Some(Self::US),
            "AU" => Some(Self::AU),
            _ => None,
        }
    }

    /// Exchange suffix used by the EODHD data API (e.g. "AAPL.US").
    pub fn eodhd_suffix(&self) -> &'static str {
        match self {
            Self::US => "US",
            Self::AU => "AU",
        }
    }

    /// IANA timezone the market's session clock runs in.
    pub fn timezone(&self) -> Tz {
        match self {
            Self::US => chrono_tz::America::New_York,
            Self::AU => chrono_tz::Australia::Sydney,
        }
    }

    /// Regular session bounds as minutes since local midnight (open, close).
    /// Public holidays are not modelled.
    fn session_minutes(&self) -> (u32, u32) {
        match self {
            Self::US => (9 * 60 + 30, 16 * 60),
            Self::AU => (10 * 60, 16 * 60),
        }
    }

    /// Whether the market's regular session is open at `at`.
    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.timezone());
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let minute_of_day = local.hour() * 60 + local.minute();
        let (open, close) = self.session_minutes();
        minute_of_day >= open && minute_of_day < close
    }

    /// Whether the market's regular session is open right now.
    pub fn is_open(&self) -> bool {
        self.is_open_at(Utc::now())
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::US => write!(f, "US"),
            Self::AU => write!(f, "AU"),
        }
    }
}

/// Lifecycle state of a per-market scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    /// No scan in flight; a new one may start.
    Idle,
    /// A scan is in flight. Entry is exclusive per market.
    Running,
    /// Cancellation requested; the scan is winding down.
    Cancelling,
    /// Last scan finished and published a result.
    Completed,
    /// Last scan aborted with a fatal error (nothing published).
    Failed,
    /// Last scan was cancelled (nothing published).
    Cancelled,
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Cancelling => write!(f, "Cancelling"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}
