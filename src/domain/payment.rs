//! Payment domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payment status. Transitions only out of `Pending`; a settled payment
/// is immutable, which is the idempotency guard for duplicate gateway
/// callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One payment attempt against an invoice through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: u64,
    pub invoice_id: u64,
    /// Minor currency units; the gateway carries this scaled x100
    pub amount: i64,
    /// Gateway transaction reference (`vnp_TxnRef`)
    pub txn_ref: String,
    pub status: PaymentStatus,
    /// Set once a callback for this payment passed checksum verification
    pub checksum_ok: bool,
    pub bank_code: Option<String>,
    pub pay_date: Option<String>,
    pub transaction_no: Option<String>,
    pub response_code: Option<String>,
    pub transaction_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(id: u64, invoice_id: u64, amount: i64, txn_ref: impl Into<String>) -> Self {
        Self {
            id,
            invoice_id,
            amount,
            txn_ref: txn_ref.into(),
            status: PaymentStatus::Pending,
            checksum_ok: false,
            bank_code: None,
            pay_date: None,
            transaction_no: None,
            response_code: None,
            transaction_status: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_payment_is_pending() {
        let p = Payment::new(1, 10_000, 15_000, "a1b2c3d4e5f6");
        assert!(p.is_pending());
        assert!(!p.checksum_ok);
        assert_eq!(p.txn_ref, "a1b2c3d4e5f6");
    }
}
