//! Invoice domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default price per swap, minor currency units (VND).
pub const DEFAULT_PRICE_PER_SWAP: i64 = 15_000;

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    #[serde(rename = "PAYMENTFAILED")]
    PaymentFailed,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::PaymentFailed => "PAYMENTFAILED",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Invoice grouping one or more bookings for settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: u64,
    /// Total, minor currency units
    pub total_amount: i64,
    pub price_per_swap: i64,
    pub number_of_swaps: u32,
    pub status: InvoiceStatus,
    pub booking_ids: Vec<u64>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn new(id: u64, booking_ids: Vec<u64>) -> Self {
        let mut invoice = Self {
            id,
            total_amount: 0,
            price_per_swap: DEFAULT_PRICE_PER_SWAP,
            number_of_swaps: booking_ids.len() as u32,
            status: InvoiceStatus::Pending,
            booking_ids,
            created_at: Utc::now(),
        };
        invoice.recalculate();
        invoice
    }

    /// Recompute the total from the per-swap price and swap count.
    pub fn recalculate(&mut self) {
        self.total_amount = self.price_per_swap * self.number_of_swaps as i64;
    }
}
