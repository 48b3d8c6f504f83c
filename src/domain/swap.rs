//! Swap domain entity: one physical battery exchange tied to a booking.
//!
//! Swap records are append-only history. They are created by the swap
//! engine and mutated only by the engine's cancel paths and the
//! auto-cancellation sweeper, never deleted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Swap status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapStatus {
    Success,
    /// Parked by staff; the user is expected to come back and retry.
    /// The sweeper auto-cancels these after a timeout.
    WaitingUserRetry,
    /// Historical park state kept for data compatibility; the sweeper
    /// ignores it.
    CancelledTemp,
    Cancelled,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::WaitingUserRetry => "WAITING_USER_RETRY",
            Self::CancelledTemp => "CANCELLED_TEMP",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(Self::Success),
            "WAITING_USER_RETRY" => Some(Self::WaitingUserRetry),
            "CANCELLED_TEMP" => Some(Self::CancelledTemp),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record of one physical exchange: which battery left with the customer
/// (`battery_out`), which one came in (`battery_in`), who performed it,
/// and the slot codes involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swap {
    pub id: u64,
    pub booking_id: u64,
    pub user_id: String,
    pub staff_id: String,
    pub battery_out_id: String,
    pub battery_in_id: String,
    pub slot_out_code: String,
    pub slot_in_code: String,
    pub status: SwapStatus,
    pub completed_at: DateTime<Utc>,
    pub description: String,
}

impl Swap {
    /// Whether this swap has sat in `WaitingUserRetry` strictly longer
    /// than `timeout` and is due for auto-cancellation. A swap exactly
    /// at the threshold survives until the next tick.
    pub fn is_overdue(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.status == SwapStatus::WaitingUserRetry && now - self.completed_at > timeout
    }
}
