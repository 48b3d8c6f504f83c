//! Booking lifecycle service

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::domain::{
    BatteryType, Booking, BookingStatus, Invoice, TimeSlot, BOOKING_WINDOW_DAYS,
};
use crate::infrastructure::Storage;
use crate::shared::{DomainError, DomainResult};

/// Input for creating a booking. The caller identity arrives explicitly;
/// it is resolved once at the HTTP boundary and never re-derived here.
#[derive(Debug, Clone)]
pub struct CreateBookingInput {
    pub user_id: String,
    pub station_id: u32,
    pub vehicle_id: u32,
    pub battery_type: BatteryType,
    pub battery_count: u32,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
}

/// Service driving booking creation, cancellation and status queries.
pub struct BookingService {
    storage: Arc<dyn Storage>,
}

impl BookingService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Create a booking in PENDING. All validations run before any write.
    pub async fn create_booking(&self, input: CreateBookingInput) -> DomainResult<Booking> {
        let station = self
            .storage
            .get_station(input.station_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Station", "id", input.station_id))?;

        let today = Utc::now().date_naive();
        if input.date < today || input.date > today + chrono::Duration::days(BOOKING_WINDOW_DAYS) {
            return Err(DomainError::Validation(format!(
                "booking date must fall within {} days from today",
                BOOKING_WINDOW_DAYS
            )));
        }

        if input.battery_count == 0 || input.battery_count > 3 {
            return Err(DomainError::Validation(
                "a booking exchanges between 1 and 3 batteries".to_string(),
            ));
        }

        if let Some(existing) = self
            .storage
            .find_active_booking_for_user(&input.user_id)
            .await?
        {
            return Err(DomainError::Conflict(format!(
                "user {} already holds active booking #{}",
                input.user_id, existing.id
            )));
        }

        if self
            .storage
            .booking_exists_at(input.station_id, input.date, input.time_slot)
            .await?
        {
            return Err(DomainError::Conflict(format!(
                "slot {} on {} at station {} is already booked",
                input.time_slot, input.date, input.station_id
            )));
        }

        let booking = Booking {
            id: self.storage.next_booking_id().await,
            user_id: input.user_id,
            station_id: station.id,
            vehicle_id: input.vehicle_id,
            battery_type: input.battery_type,
            battery_count: input.battery_count,
            amount: 0,
            date: input.date,
            time_slot: input.time_slot,
            status: BookingStatus::Pending,
            completed_date: None,
            cancellation_reason: None,
            invoice_id: None,
        };
        self.storage.save_booking(booking.clone()).await?;

        info!(
            booking_id = booking.id,
            user_id = %booking.user_id,
            station_id = booking.station_id,
            date = %booking.date,
            time_slot = %booking.time_slot,
            "Booking created"
        );
        Ok(booking)
    }

    /// Cancel a booking on behalf of its owner.
    pub async fn cancel_booking(
        &self,
        booking_id: u64,
        acting_user: &str,
        reason: Option<String>,
    ) -> DomainResult<Booking> {
        let mut booking = self
            .storage
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking", "id", booking_id))?;

        if booking.user_id != acting_user {
            return Err(DomainError::Forbidden(format!(
                "booking #{} does not belong to user {}",
                booking_id, acting_user
            )));
        }

        match booking.status {
            BookingStatus::Cancelled => {
                return Err(DomainError::Conflict(format!(
                    "booking #{} is already cancelled",
                    booking_id
                )))
            }
            BookingStatus::Completed => {
                return Err(DomainError::Conflict(format!(
                    "booking #{} is completed and cannot be cancelled",
                    booking_id
                )))
            }
            _ => {}
        }

        booking
            .cancel(reason.unwrap_or_else(|| "Cancelled by user".to_string()))
            .map_err(DomainError::Conflict)?;
        self.storage.update_booking(booking.clone()).await?;

        info!(booking_id, user_id = %acting_user, "Booking cancelled");
        Ok(booking)
    }

    /// Administrative status transition, guarded by the lifecycle edges.
    pub async fn update_booking_status(
        &self,
        booking_id: u64,
        new_status: BookingStatus,
    ) -> DomainResult<Booking> {
        let mut booking = self
            .storage
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking", "id", booking_id))?;

        booking
            .transition_to(new_status)
            .map_err(DomainError::Conflict)?;
        self.storage.update_booking(booking.clone()).await?;
        Ok(booking)
    }

    pub async fn get_booking(&self, booking_id: u64) -> DomainResult<Booking> {
        self.storage
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking", "id", booking_id))
    }

    pub async fn list_by_status(&self, status: BookingStatus) -> DomainResult<Vec<Booking>> {
        self.storage.list_bookings_by_status(status).await
    }

    pub async fn list_by_station(&self, station_id: u32) -> DomainResult<Vec<Booking>> {
        self.storage
            .get_station(station_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Station", "id", station_id))?;
        self.storage.list_bookings_by_station(station_id).await
    }

    pub async fn list_by_user(&self, user_id: &str) -> DomainResult<Vec<Booking>> {
        self.storage.list_bookings_by_user(user_id).await
    }

    /// Raise one invoice over a set of bookings, pricing each booking at
    /// the invoice's per-swap rate.
    pub async fn raise_invoice(&self, booking_ids: Vec<u64>) -> DomainResult<Invoice> {
        if booking_ids.is_empty() {
            return Err(DomainError::Validation(
                "an invoice needs at least one booking".to_string(),
            ));
        }
        let mut bookings = Vec::with_capacity(booking_ids.len());
        for id in &booking_ids {
            let booking = self
                .storage
                .get_booking(*id)
                .await?
                .ok_or_else(|| DomainError::not_found("Booking", "id", *id))?;
            if booking.invoice_id.is_some() {
                return Err(DomainError::Conflict(format!(
                    "booking #{} is already invoiced",
                    id
                )));
            }
            bookings.push(booking);
        }

        let invoice = Invoice::new(self.storage.next_invoice_id().await, booking_ids);
        self.storage.save_invoice(invoice.clone()).await?;

        for mut booking in bookings {
            booking.invoice_id = Some(invoice.id);
            booking.amount = invoice.price_per_swap;
            self.storage.update_booking(booking).await?;
        }

        info!(
            invoice_id = invoice.id,
            total = invoice.total_amount,
            swaps = invoice.number_of_swaps,
            "Invoice raised"
        );
        Ok(invoice)
    }
}

// ── Tests ──────────────────────────────────────────────────────
