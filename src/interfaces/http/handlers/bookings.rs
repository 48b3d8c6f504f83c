//! Booking and invoice HTTP handlers.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::application::services::CreateBookingInput;
use crate::domain::{BatteryType, Booking, BookingStatus, Invoice, TimeSlot};
use crate::shared::DomainError;

use super::super::common::{ApiResponse, ValidatedJson};
use super::super::error::{ApiError, ApiResult};
use super::super::router::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    pub station_id: u32,
    pub vehicle_id: u32,
    pub battery_type: BatteryType,
    #[validate(range(min = 1, max = 3))]
    pub battery_count: u32,
    /// Booking date, `YYYY-MM-DD`
    pub date: NaiveDate,
    /// One of the published slot labels, e.g. `01:30`
    pub time_slot: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelBookingRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RaiseInvoiceRequest {
    #[validate(length(min = 1))]
    pub booking_ids: Vec<u64>,
}

pub async fn create_booking(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateBookingRequest>,
) -> ApiResult<Booking> {
    let time_slot = TimeSlot::parse(&request.time_slot).ok_or_else(|| {
        ApiError(DomainError::Validation(format!(
            "unknown time slot '{}'",
            request.time_slot
        )))
    })?;

    let booking = state
        .bookings
        .create_booking(CreateBookingInput {
            user_id: request.user_id,
            station_id: request.station_id,
            vehicle_id: request.vehicle_id,
            battery_type: request.battery_type,
            battery_count: request.battery_count,
            date: request.date,
            time_slot,
        })
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<u64>,
    ValidatedJson(request): ValidatedJson<CancelBookingRequest>,
) -> ApiResult<Booking> {
    let booking = state
        .bookings
        .cancel_booking(booking_id, &request.user_id, request.reason)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<u64>,
) -> ApiResult<Booking> {
    let booking = state.bookings.get_booking(booking_id).await?;
    Ok(Json(ApiResponse::success(booking)))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Booking>> {
    let raw = query
        .get("status")
        .ok_or_else(|| ApiError(DomainError::Validation("missing status filter".into())))?;
    let status = BookingStatus::parse(raw).ok_or_else(|| {
        ApiError(DomainError::Validation(format!(
            "unknown booking status '{}'",
            raw
        )))
    })?;
    let bookings = state.bookings.list_by_status(status).await?;
    Ok(Json(ApiResponse::success(bookings)))
}

pub async fn list_station_bookings(
    State(state): State<AppState>,
    Path(station_id): Path<u32>,
) -> ApiResult<Vec<Booking>> {
    let bookings = state.bookings.list_by_station(station_id).await?;
    Ok(Json(ApiResponse::success(bookings)))
}

pub async fn list_user_bookings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<Booking>> {
    let bookings = state.bookings.list_by_user(&user_id).await?;
    Ok(Json(ApiResponse::success(bookings)))
}

pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(booking_id): Path<u64>,
    Json(request): Json<UpdateBookingStatusRequest>,
) -> ApiResult<Booking> {
    let status = BookingStatus::parse(&request.status).ok_or_else(|| {
        ApiError(DomainError::Validation(format!(
            "unknown booking status '{}'",
            request.status
        )))
    })?;
    let booking = state
        .bookings
        .update_booking_status(booking_id, status)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

pub async fn raise_invoice(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RaiseInvoiceRequest>,
) -> ApiResult<Invoice> {
    let invoice = state.bookings.raise_invoice(request.booking_ids).await?;
    Ok(Json(ApiResponse::success(invoice)))
}
