//! Swap HTTP handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::application::services::{CancelKind, SwapCommit};
use crate::domain::{Booking, Swap};

use super::super::common::{ApiResponse, ValidatedJson};
use super::super::error::ApiResult;
use super::super::router::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CommitSwapRequest {
    pub booking_id: u64,
    #[validate(length(min = 1, max = 64))]
    pub staff_id: String,
    #[validate(length(min = 1, max = 3))]
    pub battery_in_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelSwapRequest {
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelSwapResponse {
    pub booking: Booking,
    pub swap: Option<Swap>,
}

pub async fn commit_swap(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CommitSwapRequest>,
) -> ApiResult<SwapCommit> {
    let commit = state
        .swaps
        .commit_swap(request.booking_id, &request.staff_id, &request.battery_in_ids)
        .await?;
    Ok(Json(ApiResponse::success(commit)))
}

pub async fn cancel_swap_by_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<u64>,
    ValidatedJson(request): ValidatedJson<CancelSwapRequest>,
) -> ApiResult<CancelSwapResponse> {
    let (booking, swap) = state
        .swaps
        .cancel_swap_by_booking(booking_id, request.reason)
        .await?;
    Ok(Json(ApiResponse::success(CancelSwapResponse {
        booking,
        swap,
    })))
}

pub async fn cancel_swap_temp(
    State(state): State<AppState>,
    Path(swap_id): Path<u64>,
) -> ApiResult<Swap> {
    let swap = state
        .swaps
        .cancel_swap(swap_id, CancelKind::Temp, None)
        .await?;
    Ok(Json(ApiResponse::success(swap)))
}
