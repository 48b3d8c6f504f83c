//! Payment and gateway callback handlers.
//!
//! The IPN endpoint never maps errors to HTTP statuses: the gateway
//! expects a 200 with its `RspCode` contract no matter what went wrong.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::application::ports::RefundResponse;
use crate::application::services::payment::{PaymentIntent, ReturnView};
use crate::domain::Booking;
use crate::infrastructure::gateway::vnpay::IpnReply;

use super::super::common::{ApiResponse, ValidatedJson};
use super::super::error::ApiResult;
use super::super::router::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentIntentRequest {
    pub invoice_id: u64,
    /// Customer IP forwarded to the gateway
    #[validate(length(min = 1, max = 45))]
    pub client_ip: Option<String>,
    /// Preselect a bank on the gateway's payment page
    #[validate(length(min = 1, max = 20))]
    pub bank_code: Option<String>,
    /// Gateway page language, `vn` or `en`
    #[validate(length(min = 2, max = 2))]
    pub locale: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundBookingRequest {
    #[validate(length(min = 1, max = 64))]
    pub created_by: String,
}

#[derive(Debug, Serialize)]
pub struct RefundBookingResponse {
    pub booking: Booking,
    pub gateway: RefundResponse,
}

pub async fn create_payment_intent(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreatePaymentIntentRequest>,
) -> ApiResult<PaymentIntent> {
    let client_ip = request.client_ip.as_deref().unwrap_or("127.0.0.1");
    let intent = state
        .payments
        .create_payment_intent(
            request.invoice_id,
            client_ip,
            request.bank_code.as_deref(),
            request.locale.as_deref(),
        )
        .await?;
    Ok(Json(ApiResponse::success(intent)))
}

pub async fn vnpay_ipn(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<IpnReply> {
    Json(state.payments.handle_ipn(&params).await)
}

pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<ReturnView> {
    Json(state.payments.handle_return(&params).await)
}

pub async fn refund_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<u64>,
    ValidatedJson(request): ValidatedJson<RefundBookingRequest>,
) -> ApiResult<RefundBookingResponse> {
    let (booking, gateway) = state
        .payments
        .refund_booking(booking_id, &request.created_by)
        .await?;
    Ok(Json(ApiResponse::success(RefundBookingResponse {
        booking,
        gateway,
    })))
}
