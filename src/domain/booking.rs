//! Booking domain entity and lifecycle state machine

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::battery::BatteryType;

/// A booking date must fall within `[today, today + BOOKING_WINDOW_DAYS]`.
pub const BOOKING_WINDOW_DAYS: i64 = 2;

/// The fixed enumeration of bookable time slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSlot {
    #[serde(rename = "01:30")]
    Slot0130,
    #[serde(rename = "02:00")]
    Slot0200,
    #[serde(rename = "02:30")]
    Slot0230,
}

impl TimeSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slot0130 => "01:30",
            Self::Slot0200 => "02:00",
            Self::Slot0230 => "02:30",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "01:30" => Some(Self::Slot0130),
            "02:00" => Some(Self::Slot0200),
            "02:30" => Some(Self::Slot0230),
            _ => None,
        }
    }

    pub fn as_time(&self) -> NaiveTime {
        match self {
            Self::Slot0130 => NaiveTime::from_hms_opt(1, 30, 0).unwrap(),
            Self::Slot0200 => NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
            Self::Slot0230 => NaiveTime::from_hms_opt(2, 30, 0).unwrap(),
        }
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    /// Paid; waiting for the physical swap at the station
    #[serde(rename = "PENDINGSWAPPING")]
    PendingSwapping,
    Completed,
    Cancelled,
    Failed,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::PendingSwapping => "PENDINGSWAPPING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "PENDINGSWAPPING" => Some(Self::PendingSwapping),
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" => Some(Self::Cancelled),
            "FAILED" => Some(Self::Failed),
            "REFUNDED" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Counts against the one-active-booking-per-user rule.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::PendingSwapping)
    }

    /// Terminal states reject further mutation, except the
    /// refund-driven `Completed -> Refunded` edge.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Refunded)
    }

    /// Lifecycle edges. Anything not listed here is an invalid
    /// transition and must be rejected.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, PendingSwapping)
                | (Pending, Cancelled)
                | (Pending, Failed)
                | (Confirmed, PendingSwapping)
                | (Confirmed, Cancelled)
                | (Confirmed, Failed)
                | (PendingSwapping, Completed)
                | (PendingSwapping, Failed)
                | (PendingSwapping, Cancelled)
                | (Failed, Cancelled)
                | (Completed, Refunded)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's reservation of a swap slot at a station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: u64,
    pub user_id: String,
    pub station_id: u32,
    pub vehicle_id: u32,
    pub battery_type: BatteryType,
    /// Exact number of batteries to exchange
    pub battery_count: u32,
    /// This booking's allocated share of its invoice, minor currency units
    pub amount: i64,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub status: BookingStatus,
    pub completed_date: Option<NaiveDate>,
    pub cancellation_reason: Option<String>,
    pub invoice_id: Option<u64>,
}

impl Booking {
    /// Apply a status transition, rejecting invalid edges.
    pub fn transition_to(&mut self, next: BookingStatus) -> Result<(), String> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(format!(
                "booking #{} cannot go {} -> {}",
                self.id, self.status, next
            ));
        }
        self.status = next;
        Ok(())
    }

    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), String> {
        self.transition_to(BookingStatus::Cancelled)?;
        self.cancellation_reason = Some(reason.into());
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────
