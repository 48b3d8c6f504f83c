//! Outbound ports for the settlement service.
//!
//! [`RefundGateway`] decouples the settlement service from the concrete
//! transport. The request body is fully built and signed by the caller;
//! an implementation only submits it and parses the gateway's verdict.
//! [`SubscriptionActivator`] hooks subscription plans into the payment
//! success path without the service knowing the plan model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::Invoice;
use crate::shared::DomainResult;

/// Signed refund request body, field order per the merchant API.
#[derive(Debug, Clone, Serialize)]
pub struct RefundRequest {
    pub vnp_request_id: String,
    pub vnp_version: String,
    pub vnp_command: String,
    pub vnp_tmn_code: String,
    /// `03` = partial refund of the original transaction
    pub vnp_transaction_type: String,
    pub vnp_txn_ref: String,
    /// Refund amount scaled x100
    pub vnp_amount: i64,
    pub vnp_order_info: String,
    pub vnp_transaction_no: String,
    pub vnp_transaction_date: String,
    pub vnp_create_by: String,
    pub vnp_create_date: String,
    pub vnp_ip_addr: String,
    pub vnp_secure_hash: String,
}

/// Gateway verdict on a refund request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResponse {
    pub response_code: String,
    pub message: String,
}

impl RefundResponse {
    pub fn is_accepted(&self) -> bool {
        self.response_code == "00"
    }
}

#[async_trait]
pub trait RefundGateway: Send + Sync {
    async fn submit_refund(&self, request: RefundRequest) -> DomainResult<RefundResponse>;
}

/// Development/testing implementation that accepts every refund.
pub struct AutoApproveRefundGateway;

#[async_trait]
impl RefundGateway for AutoApproveRefundGateway {
    async fn submit_refund(&self, request: RefundRequest) -> DomainResult<RefundResponse> {
        Ok(RefundResponse {
            response_code: "00".to_string(),
            message: format!("Refund {} accepted", request.vnp_request_id),
        })
    }
}

/// Activates whatever subscription plan an invoice is attached to once
/// that invoice is paid.
#[async_trait]
pub trait SubscriptionActivator: Send + Sync {
    async fn activate_for_invoice(&self, invoice: &Invoice) -> DomainResult<()>;
}

/// Implementation for deployments without a subscription backend; only
/// records the activation in the log.
pub struct LoggingSubscriptionActivator;

#[async_trait]
impl SubscriptionActivator for LoggingSubscriptionActivator {
    async fn activate_for_invoice(&self, invoice: &Invoice) -> DomainResult<()> {
        info!(invoice_id = invoice.id, "Subscription activation requested");
        Ok(())
    }
}
