//! Payment settlement against the VNPay-style gateway.
//!
//! The IPN (server-to-server) callback is the source of truth for
//! settlement; the browser return channel only renders a verdict, with
//! one best-effort exception for an explicit customer cancel. Both
//! channels funnel through a compare-and-set on the PENDING payment, so
//! a settled payment is never rewritten by a duplicate callback.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::ports::{
    RefundGateway, RefundRequest, RefundResponse, SubscriptionActivator,
};
use crate::domain::{Booking, BookingStatus, InvoiceStatus, Payment, PaymentStatus};
use crate::infrastructure::gateway::vnpay::{
    build_payment_url, format_gateway_time, gateway_now, hmac_sha512, response_message,
    verify_checksum, IpnReply, VnPayConfig, RSP_ALREADY_CONFIRMED, RSP_INVALID_AMOUNT,
    RSP_INVALID_CHECKSUM, RSP_ORDER_NOT_FOUND, RSP_SUCCESS, RSP_UNKNOWN_ERROR,
};
use crate::infrastructure::Storage;
use crate::shared::{DomainError, DomainResult};

/// A freshly created payment attempt plus its signed redirect URL.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub payment_id: u64,
    pub invoice_id: u64,
    pub txn_ref: String,
    /// Minor currency units, unscaled
    pub amount: i64,
    pub payment_url: String,
}

/// Verdict rendered to the customer's browser on gateway return.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnView {
    pub success: bool,
    pub checksum_ok: bool,
    pub txn_ref: Option<String>,
    pub response_code: Option<String>,
    pub message: String,
}

/// Service owning payment intents, gateway callbacks and refunds.
pub struct PaymentService {
    storage: Arc<dyn Storage>,
    config: VnPayConfig,
    refund_gateway: Arc<dyn RefundGateway>,
    subscriptions: Arc<dyn SubscriptionActivator>,
}

impl PaymentService {
    pub fn new(
        storage: Arc<dyn Storage>,
        config: VnPayConfig,
        refund_gateway: Arc<dyn RefundGateway>,
        subscriptions: Arc<dyn SubscriptionActivator>,
    ) -> Self {
        Self {
            storage,
            config,
            refund_gateway,
            subscriptions,
        }
    }

    /// Open a payment attempt for an invoice and build the signed
    /// gateway redirect. A paid invoice cannot be paid twice.
    pub async fn create_payment_intent(
        &self,
        invoice_id: u64,
        client_ip: &str,
        bank_code: Option<&str>,
        locale: Option<&str>,
    ) -> DomainResult<PaymentIntent> {
        let invoice = self
            .storage
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Invoice", "id", invoice_id))?;

        if invoice.status == InvoiceStatus::Paid {
            return Err(DomainError::Conflict(format!(
                "invoice #{} is already paid",
                invoice_id
            )));
        }
        if self
            .storage
            .find_success_payment(invoice_id)
            .await?
            .is_some()
        {
            return Err(DomainError::Conflict(format!(
                "invoice #{} already has a successful payment",
                invoice_id
            )));
        }
        if invoice.total_amount <= 0 {
            return Err(DomainError::Validation(format!(
                "invoice #{} has nothing to pay",
                invoice_id
            )));
        }

        let txn_ref = Uuid::new_v4().simple().to_string();
        let payment = Payment::new(
            self.storage.next_payment_id().await,
            invoice_id,
            invoice.total_amount,
            txn_ref.clone(),
        );
        self.storage.save_payment(payment.clone()).await?;

        let now = gateway_now();
        let expire = now + ChronoDuration::minutes(self.config.expire_minutes);

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".into(), self.config.api_version.clone());
        params.insert("vnp_Command".into(), "pay".into());
        params.insert("vnp_TmnCode".into(), self.config.tmn_code.clone());
        // Gateway carries amounts scaled x100
        params.insert("vnp_Amount".into(), (invoice.total_amount * 100).to_string());
        params.insert("vnp_CurrCode".into(), self.config.curr_code.clone());
        params.insert("vnp_TxnRef".into(), txn_ref.clone());
        params.insert(
            "vnp_OrderInfo".into(),
            format!("Payment for invoice #{}", invoice_id),
        );
        params.insert("vnp_OrderType".into(), "other".into());
        params.insert("vnp_Locale".into(), locale.unwrap_or("vn").to_string());
        if let Some(bank) = bank_code {
            params.insert("vnp_BankCode".into(), bank.to_string());
        }
        params.insert("vnp_ReturnUrl".into(), self.config.return_url.clone());
        params.insert("vnp_IpAddr".into(), client_ip.to_string());
        params.insert("vnp_CreateDate".into(), format_gateway_time(now));
        params.insert("vnp_ExpireDate".into(), format_gateway_time(expire));

        let payment_url =
            build_payment_url(&self.config.pay_url, &params, &self.config.hash_secret);

        info!(
            invoice_id,
            payment_id = payment.id,
            txn_ref = %txn_ref,
            amount = invoice.total_amount,
            "Payment intent created"
        );

        Ok(PaymentIntent {
            payment_id: payment.id,
            invoice_id,
            txn_ref,
            amount: invoice.total_amount,
            payment_url,
        })
    }

    /// Server-to-server settlement callback. Always replies with the
    /// gateway's `RspCode` contract, never an error status.
    pub async fn handle_ipn(&self, params: &HashMap<String, String>) -> IpnReply {
        match self.settle_from_ipn(params).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "IPN processing failed");
                IpnReply::new(RSP_UNKNOWN_ERROR, "Unknown error")
            }
        }
    }

    async fn settle_from_ipn(&self, params: &HashMap<String, String>) -> DomainResult<IpnReply> {
        if !verify_checksum(params, &self.config.hash_secret) {
            return Ok(IpnReply::new(RSP_INVALID_CHECKSUM, "Invalid checksum"));
        }

        let Some(txn_ref) = params.get("vnp_TxnRef") else {
            return Ok(IpnReply::new(RSP_ORDER_NOT_FOUND, "Order not found"));
        };
        let Some(payment) = self.storage.get_payment_by_txn_ref(txn_ref).await? else {
            return Ok(IpnReply::new(RSP_ORDER_NOT_FOUND, "Order not found"));
        };

        let received_amount: i64 = params
            .get("vnp_Amount")
            .and_then(|a| a.parse().ok())
            .unwrap_or(-1);
        if received_amount != payment.amount * 100 {
            return Ok(IpnReply::new(RSP_INVALID_AMOUNT, "Invalid amount"));
        }

        if !payment.is_pending() {
            return Ok(IpnReply::new(
                RSP_ALREADY_CONFIRMED,
                "Order already confirmed",
            ));
        }

        let response_code = params.get("vnp_ResponseCode").cloned();
        let transaction_status = params.get("vnp_TransactionStatus").cloned();
        let paid = response_code.as_deref() == Some("00")
            && transaction_status.as_deref() == Some("00");

        let mut settled = payment.clone();
        settled.status = if paid {
            PaymentStatus::Success
        } else {
            PaymentStatus::Failed
        };
        settled.checksum_ok = true;
        settled.bank_code = params.get("vnp_BankCode").cloned();
        settled.pay_date = params.get("vnp_PayDate").cloned();
        settled.transaction_no = params.get("vnp_TransactionNo").cloned();
        settled.response_code = response_code;
        settled.transaction_status = transaction_status;

        if !self.storage.update_payment_if_pending(settled).await? {
            // Raced another callback for the same transaction
            return Ok(IpnReply::new(
                RSP_ALREADY_CONFIRMED,
                "Order already confirmed",
            ));
        }

        self.settle_invoice(payment.invoice_id, paid).await?;
        info!(
            txn_ref = %txn_ref,
            invoice_id = payment.invoice_id,
            paid,
            "Payment settled via IPN"
        );
        Ok(IpnReply::new(RSP_SUCCESS, "Confirm success"))
    }

    /// Settle the invoice and cascade the verdict to its bookings.
    async fn settle_invoice(&self, invoice_id: u64, paid: bool) -> DomainResult<()> {
        let Some(mut invoice) = self.storage.get_invoice(invoice_id).await? else {
            return Err(DomainError::Integrity(format!(
                "payment references missing invoice #{}",
                invoice_id
            )));
        };
        invoice.status = if paid {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::PaymentFailed
        };
        self.storage.update_invoice(invoice.clone()).await?;

        if paid {
            self.subscriptions.activate_for_invoice(&invoice).await?;
        }

        for booking_id in &invoice.booking_ids {
            let Some(mut booking) = self.storage.get_booking(*booking_id).await? else {
                warn!(booking_id, invoice_id, "Invoice references missing booking");
                continue;
            };
            let next = if paid {
                BookingStatus::PendingSwapping
            } else {
                BookingStatus::Failed
            };
            match booking.transition_to(next) {
                Ok(()) => self.storage.update_booking(booking).await?,
                Err(e) => {
                    warn!(booking_id, error = %e, "Skipping booking cascade");
                }
            }
        }
        Ok(())
    }

    /// Browser return channel. Renders the verdict only, except for an
    /// explicit customer cancel (code 24) which fails the payment
    /// best-effort so the user is not left with a dangling PENDING
    /// attempt when the IPN never arrives.
    pub async fn handle_return(&self, params: &HashMap<String, String>) -> ReturnView {
        let checksum_ok = verify_checksum(params, &self.config.hash_secret);
        let txn_ref = params.get("vnp_TxnRef").cloned();
        let response_code = params.get("vnp_ResponseCode").cloned();

        if !checksum_ok {
            return ReturnView {
                success: false,
                checksum_ok: false,
                txn_ref,
                response_code,
                message: "Invalid checksum".to_string(),
            };
        }

        let success = response_code.as_deref() == Some("00");
        let message = response_message(response_code.as_deref().unwrap_or("")).to_string();

        if response_code.as_deref() == Some("24") {
            if let Some(ref txn) = txn_ref {
                if let Err(e) = self.fail_cancelled_payment(txn).await {
                    warn!(txn_ref = %txn, error = %e, "Best-effort cancel failed");
                }
            }
        }

        ReturnView {
            success,
            checksum_ok: true,
            txn_ref,
            response_code,
            message,
        }
    }

    async fn fail_cancelled_payment(&self, txn_ref: &str) -> DomainResult<()> {
        let Some(payment) = self.storage.get_payment_by_txn_ref(txn_ref).await? else {
            return Ok(());
        };
        if !payment.is_pending() {
            return Ok(());
        }
        let mut failed = payment.clone();
        failed.status = PaymentStatus::Failed;
        failed.checksum_ok = true;
        failed.response_code = Some("24".to_string());
        if self.storage.update_payment_if_pending(failed).await? {
            self.settle_invoice(payment.invoice_id, false).await?;
            info!(txn_ref = %txn_ref, "Payment cancelled by customer on return");
        }
        Ok(())
    }

    /// Refund one completed booking's share of its paid invoice through
    /// the merchant API.
    pub async fn refund_booking(
        &self,
        booking_id: u64,
        created_by: &str,
    ) -> DomainResult<(Booking, RefundResponse)> {
        let mut booking = self
            .storage
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking", "id", booking_id))?;

        if booking.status != BookingStatus::Completed {
            return Err(DomainError::Conflict(format!(
                "booking #{} is {}, only completed bookings are refundable",
                booking_id, booking.status
            )));
        }
        let invoice_id = booking.invoice_id.ok_or_else(|| {
            DomainError::Conflict(format!("booking #{} was never invoiced", booking_id))
        })?;
        let invoice = self
            .storage
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Invoice", "id", invoice_id))?;
        if invoice.status != InvoiceStatus::Paid {
            return Err(DomainError::Conflict(format!(
                "invoice #{} is {}, refunds require a paid invoice",
                invoice_id, invoice.status
            )));
        }
        let payment = self
            .storage
            .find_success_payment(invoice_id)
            .await?
            .ok_or_else(|| {
                DomainError::Integrity(format!(
                    "paid invoice #{} has no successful payment",
                    invoice_id
                ))
            })?;

        let request = self.build_refund_request(&booking, &payment, created_by);
        let response = self.refund_gateway.submit_refund(request).await?;
        if !response.is_accepted() {
            return Err(DomainError::Conflict(format!(
                "gateway declined refund for booking #{}: {} ({})",
                booking_id, response.message, response.response_code
            )));
        }

        booking
            .transition_to(BookingStatus::Refunded)
            .map_err(DomainError::Conflict)?;
        self.storage.update_booking(booking.clone()).await?;

        info!(
            booking_id,
            invoice_id,
            amount = booking.amount,
            "Booking refunded"
        );
        Ok((booking, response))
    }

    /// Merchant refund body: `|`-joined fields signed with HMAC-SHA512.
    fn build_refund_request(
        &self,
        booking: &Booking,
        payment: &Payment,
        created_by: &str,
    ) -> RefundRequest {
        let now = gateway_now();
        let request_id = format!("rf{}", now.timestamp_millis());
        let amount = booking.amount * 100;
        let transaction_no = payment.transaction_no.clone().unwrap_or_default();
        let transaction_date = payment.pay_date.clone().unwrap_or_default();
        let create_date = format_gateway_time(now);
        let order_info = format!("Refund booking #{}", booking.id);
        let ip_addr = "127.0.0.1".to_string();

        let data = [
            request_id.as_str(),
            self.config.api_version.as_str(),
            "refund",
            self.config.tmn_code.as_str(),
            "03",
            payment.txn_ref.as_str(),
            &amount.to_string(),
            transaction_no.as_str(),
            transaction_date.as_str(),
            created_by,
            create_date.as_str(),
            ip_addr.as_str(),
            order_info.as_str(),
        ]
        .join("|");
        let secure_hash = hmac_sha512(&self.config.hash_secret, &data);

        RefundRequest {
            vnp_request_id: request_id,
            vnp_version: self.config.api_version.clone(),
            vnp_command: "refund".to_string(),
            vnp_tmn_code: self.config.tmn_code.clone(),
            vnp_transaction_type: "03".to_string(),
            vnp_txn_ref: payment.txn_ref.clone(),
            vnp_amount: amount,
            vnp_order_info: order_info,
            vnp_transaction_no: transaction_no,
            vnp_transaction_date: transaction_date,
            vnp_create_by: created_by.to_string(),
            vnp_create_date: create_date,
            vnp_ip_addr: ip_addr,
            vnp_secure_hash: secure_hash,
        }
    }

    pub async fn get_payment(&self, txn_ref: &str) -> DomainResult<Payment> {
        self.storage
            .get_payment_by_txn_ref(txn_ref)
            .await?
            .ok_or_else(|| DomainError::not_found("Payment", "txn_ref", txn_ref))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{AutoApproveRefundGateway, LoggingSubscriptionActivator};
    use crate::domain::{BatteryType, Invoice, TimeSlot};
    use std::sync::Mutex;
    use crate::infrastructure::gateway::vnpay::sign_params;
    use crate::infrastructure::InMemoryStorage;
    use chrono::Utc;

    fn test_config() -> VnPayConfig {
        VnPayConfig::default()
    }

    async fn seed_invoice(storage: &Arc<InMemoryStorage>, booking_count: usize) -> Invoice {
        let mut booking_ids = Vec::new();
        for _ in 0..booking_count {
            let booking = Booking {
                id: storage.next_booking_id().await,
                user_id: "U001".into(),
                station_id: 1,
                vehicle_id: 4,
                battery_type: BatteryType::Lfp,
                battery_count: 1,
                amount: 15_000,
                date: Utc::now().date_naive(),
                time_slot: TimeSlot::Slot0130,
                status: BookingStatus::Pending,
                completed_date: None,
                cancellation_reason: None,
                invoice_id: None,
            };
            storage.save_booking(booking.clone()).await.unwrap();
            booking_ids.push(booking.id);
        }

        let invoice = Invoice::new(storage.next_invoice_id().await, booking_ids.clone());
        storage.save_invoice(invoice.clone()).await.unwrap();
        for id in booking_ids {
            let mut b = storage.get_booking(id).await.unwrap().unwrap();
            b.invoice_id = Some(invoice.id);
            storage.update_booking(b).await.unwrap();
        }
        invoice
    }

    fn service(storage: Arc<InMemoryStorage>) -> PaymentService {
        PaymentService::new(
            storage,
            test_config(),
            Arc::new(AutoApproveRefundGateway),
            Arc::new(LoggingSubscriptionActivator),
        )
    }

    /// Remembers which invoices had their subscription activated.
    #[derive(Default)]
    struct RecordingActivator {
        activated: Mutex<Vec<u64>>,
    }

    #[async_trait::async_trait]
    impl SubscriptionActivator for RecordingActivator {
        async fn activate_for_invoice(&self, invoice: &Invoice) -> DomainResult<()> {
            self.activated.lock().unwrap().push(invoice.id);
            Ok(())
        }
    }

    /// Gateway-side view of a settled transaction, properly signed.
    fn signed_callback(
        intent: &PaymentIntent,
        response_code: &str,
        amount_x100: i64,
    ) -> HashMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("vnp_TxnRef".to_string(), intent.txn_ref.clone());
        fields.insert("vnp_Amount".to_string(), amount_x100.to_string());
        fields.insert("vnp_ResponseCode".to_string(), response_code.to_string());
        fields.insert(
            "vnp_TransactionStatus".to_string(),
            response_code.to_string(),
        );
        fields.insert("vnp_TransactionNo".to_string(), "14226112".to_string());
        fields.insert("vnp_BankCode".to_string(), "NCB".to_string());
        fields.insert("vnp_PayDate".to_string(), "20260830120000".to_string());

        let hash = sign_params(&fields, &test_config().hash_secret);
        let mut params: HashMap<String, String> = fields.into_iter().collect();
        params.insert("vnp_SecureHash".to_string(), hash);
        params
    }

    #[tokio::test]
    async fn intent_builds_verifiable_redirect() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 2).await;
        let service = service(storage.clone());

        let intent = service
            .create_payment_intent(invoice.id, "192.168.1.10", None, None)
            .await
            .unwrap();

        assert_eq!(intent.amount, 30_000);
        assert!(intent.payment_url.contains("vnp_Amount=3000000"));
        assert!(intent.payment_url.contains("vnp_SecureHash="));

        let payment = storage
            .get_payment_by_txn_ref(&intent.txn_ref)
            .await
            .unwrap()
            .unwrap();
        assert!(payment.is_pending());
        assert_eq!(payment.amount, 30_000);
    }

    #[tokio::test]
    async fn intent_rejected_once_invoice_has_success_payment() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 1).await;
        let service = service(storage.clone());
        let intent = service.create_payment_intent(invoice.id, "10.0.0.1", None, None).await.unwrap();
        service
            .handle_ipn(&signed_callback(&intent, "00", intent.amount * 100))
            .await;

        let err = service
            .create_payment_intent(invoice.id, "10.0.0.1", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn intent_preselects_bank_when_given() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 1).await;
        let service = service(storage.clone());

        let intent = service
            .create_payment_intent(invoice.id, "10.0.0.1", Some("NCB"), Some("en"))
            .await
            .unwrap();
        assert!(intent.payment_url.contains("vnp_BankCode=NCB"));
        assert!(intent.payment_url.contains("vnp_Locale=en"));
    }

    #[tokio::test]
    async fn ipn_success_settles_payment_invoice_and_bookings() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 2).await;
        let service = service(storage.clone());
        let intent = service.create_payment_intent(invoice.id, "10.0.0.1", None, None).await.unwrap();

        let reply = service
            .handle_ipn(&signed_callback(&intent, "00", intent.amount * 100))
            .await;
        assert_eq!(reply.rsp_code, RSP_SUCCESS);

        let payment = storage
            .get_payment_by_txn_ref(&intent.txn_ref)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert!(payment.checksum_ok);
        assert_eq!(payment.bank_code.as_deref(), Some("NCB"));

        let invoice = storage.get_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        for id in &invoice.booking_ids {
            let b = storage.get_booking(*id).await.unwrap().unwrap();
            assert_eq!(b.status, BookingStatus::PendingSwapping);
        }
    }

    #[tokio::test]
    async fn ipn_success_activates_linked_subscription() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 1).await;
        let activator = Arc::new(RecordingActivator::default());
        let service = PaymentService::new(
            storage.clone(),
            test_config(),
            Arc::new(AutoApproveRefundGateway),
            activator.clone(),
        );
        let intent = service.create_payment_intent(invoice.id, "10.0.0.1", None, None).await.unwrap();

        let reply = service
            .handle_ipn(&signed_callback(&intent, "00", intent.amount * 100))
            .await;
        assert_eq!(reply.rsp_code, RSP_SUCCESS);
        assert_eq!(*activator.activated.lock().unwrap(), vec![invoice.id]);
    }

    #[tokio::test]
    async fn ipn_failure_does_not_activate_subscription() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 1).await;
        let activator = Arc::new(RecordingActivator::default());
        let service = PaymentService::new(
            storage.clone(),
            test_config(),
            Arc::new(AutoApproveRefundGateway),
            activator.clone(),
        );
        let intent = service.create_payment_intent(invoice.id, "10.0.0.1", None, None).await.unwrap();

        service
            .handle_ipn(&signed_callback(&intent, "51", intent.amount * 100))
            .await;
        assert!(activator.activated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ipn_replay_is_idempotent() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 1).await;
        let service = service(storage.clone());
        let intent = service.create_payment_intent(invoice.id, "10.0.0.1", None, None).await.unwrap();
        let callback = signed_callback(&intent, "00", intent.amount * 100);

        assert_eq!(service.handle_ipn(&callback).await.rsp_code, RSP_SUCCESS);
        // Second delivery of the same notification
        assert_eq!(
            service.handle_ipn(&callback).await.rsp_code,
            RSP_ALREADY_CONFIRMED
        );

        let payment = storage
            .get_payment_by_txn_ref(&intent.txn_ref)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn ipn_rejects_bad_checksum_without_mutation() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 1).await;
        let service = service(storage.clone());
        let intent = service.create_payment_intent(invoice.id, "10.0.0.1", None, None).await.unwrap();

        let mut callback = signed_callback(&intent, "00", intent.amount * 100);
        callback.insert("vnp_Amount".to_string(), "999999900".to_string());

        let reply = service.handle_ipn(&callback).await;
        assert_eq!(reply.rsp_code, RSP_INVALID_CHECKSUM);

        let payment = storage
            .get_payment_by_txn_ref(&intent.txn_ref)
            .await
            .unwrap()
            .unwrap();
        assert!(payment.is_pending());
        let invoice = storage.get_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending);
    }

    #[tokio::test]
    async fn ipn_rejects_unknown_transaction() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 1).await;
        let service = service(storage.clone());
        let intent = service.create_payment_intent(invoice.id, "10.0.0.1", None, None).await.unwrap();

        let mut other = intent.clone();
        other.txn_ref = "deadbeefdeadbeefdeadbeefdeadbeef".to_string();
        let reply = service
            .handle_ipn(&signed_callback(&other, "00", intent.amount * 100))
            .await;
        assert_eq!(reply.rsp_code, RSP_ORDER_NOT_FOUND);
    }

    #[tokio::test]
    async fn ipn_rejects_wrong_amount_with_valid_checksum() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 1).await;
        let service = service(storage.clone());
        let intent = service.create_payment_intent(invoice.id, "10.0.0.1", None, None).await.unwrap();

        // Signed correctly, but over the wrong amount
        let reply = service
            .handle_ipn(&signed_callback(&intent, "00", 4200))
            .await;
        assert_eq!(reply.rsp_code, RSP_INVALID_AMOUNT);
    }

    #[tokio::test]
    async fn ipn_failure_code_fails_invoice_and_bookings() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 2).await;
        let service = service(storage.clone());
        let intent = service.create_payment_intent(invoice.id, "10.0.0.1", None, None).await.unwrap();

        let reply = service
            .handle_ipn(&signed_callback(&intent, "51", intent.amount * 100))
            .await;
        assert_eq!(reply.rsp_code, RSP_SUCCESS);

        let payment = storage
            .get_payment_by_txn_ref(&intent.txn_ref)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        let invoice = storage.get_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::PaymentFailed);
        for id in &invoice.booking_ids {
            let b = storage.get_booking(*id).await.unwrap().unwrap();
            assert_eq!(b.status, BookingStatus::Failed);
        }
    }

    #[tokio::test]
    async fn return_renders_verdict_without_settling() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 1).await;
        let service = service(storage.clone());
        let intent = service.create_payment_intent(invoice.id, "10.0.0.1", None, None).await.unwrap();

        let view = service
            .handle_return(&signed_callback(&intent, "00", intent.amount * 100))
            .await;
        assert!(view.success);
        assert!(view.checksum_ok);

        // Settlement is the IPN's job
        let payment = storage
            .get_payment_by_txn_ref(&intent.txn_ref)
            .await
            .unwrap()
            .unwrap();
        assert!(payment.is_pending());
    }

    #[tokio::test]
    async fn return_code_24_fails_payment_best_effort() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 1).await;
        let service = service(storage.clone());
        let intent = service.create_payment_intent(invoice.id, "10.0.0.1", None, None).await.unwrap();

        let view = service
            .handle_return(&signed_callback(&intent, "24", intent.amount * 100))
            .await;
        assert!(!view.success);
        assert_eq!(view.message, "Customer cancelled the transaction");

        let payment = storage
            .get_payment_by_txn_ref(&intent.txn_ref)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        let invoice = storage.get_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::PaymentFailed);
    }

    #[tokio::test]
    async fn refund_completes_for_paid_completed_booking() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 1).await;
        let service = service(storage.clone());
        let intent = service.create_payment_intent(invoice.id, "10.0.0.1", None, None).await.unwrap();
        service
            .handle_ipn(&signed_callback(&intent, "00", intent.amount * 100))
            .await;

        let booking_id = invoice.booking_ids[0];
        let mut booking = storage.get_booking(booking_id).await.unwrap().unwrap();
        booking.status = BookingStatus::Completed;
        storage.update_booking(booking).await.unwrap();

        let (booking, response) = service.refund_booking(booking_id, "admin").await.unwrap();
        assert_eq!(booking.status, BookingStatus::Refunded);
        assert!(response.is_accepted());
    }

    #[tokio::test]
    async fn refund_rejects_uncompleted_booking() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 1).await;
        let service = service(storage.clone());

        let err = service
            .refund_booking(invoice.booking_ids[0], "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn refund_request_is_pipe_signed() {
        let storage = Arc::new(InMemoryStorage::new());
        let invoice = seed_invoice(&storage, 1).await;
        let service = service(storage.clone());

        let booking = storage
            .get_booking(invoice.booking_ids[0])
            .await
            .unwrap()
            .unwrap();
        let mut payment = Payment::new(1, invoice.id, invoice.total_amount, "abc123");
        payment.transaction_no = Some("14226112".into());
        payment.pay_date = Some("20260830120000".into());

        let request = service.build_refund_request(&booking, &payment, "admin");
        assert!(request.vnp_request_id.starts_with("rf"));
        assert_eq!(request.vnp_command, "refund");
        assert_eq!(request.vnp_transaction_type, "03");
        assert_eq!(request.vnp_amount, booking.amount * 100);
        assert_eq!(request.vnp_secure_hash.len(), 128);
    }
}
