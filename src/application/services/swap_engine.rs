//! Swap engine: allocates physical batteries against a booking, executes
//! the exchange and records swap history.
//!
//! Contention is scoped per station: a per-station mutex serializes
//! candidate selection and slot mutation, so two concurrent commits at
//! the same station can never pick the same outgoing battery. Different
//! stations proceed in parallel.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::{
    Battery, BatteryStatus, Booking, BookingStatus, DockSlot, SlotStatus, Swap, SwapStatus,
};
use crate::infrastructure::Storage;
use crate::shared::{DomainError, DomainResult};

/// How a staff cancel should treat an existing swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelKind {
    /// Park the swap; the user is expected to come back and retry.
    /// The sweeper auto-cancels it after the timeout.
    Temp,
    /// Cancel outright and roll the batteries back.
    Permanent,
}

/// Result of one incoming battery's exchange attempt.
#[derive(Debug, Clone, Serialize)]
pub struct SwapOutcome {
    pub battery_in_id: String,
    pub swap_id: Option<u64>,
    pub battery_out_id: Option<String>,
    pub slot_out_code: Option<String>,
    pub slot_in_code: Option<String>,
    pub success: bool,
    pub message: String,
}

/// Aggregate result of a batch commit.
#[derive(Debug, Clone, Serialize)]
pub struct SwapCommit {
    pub booking_id: u64,
    pub booking_status: BookingStatus,
    pub outcomes: Vec<SwapOutcome>,
}

/// Service executing physical battery exchanges.
pub struct SwapService {
    storage: Arc<dyn Storage>,
    station_locks: DashMap<u32, Arc<Mutex<()>>>,
}

impl SwapService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            station_locks: DashMap::new(),
        }
    }

    fn station_lock(&self, station_id: u32) -> Arc<Mutex<()>> {
        self.station_locks
            .entry(station_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Commit a swap batch for a booking.
    ///
    /// Validations (count, battery type/health flags, staff assignment,
    /// availability) all run before any mutation. The batch itself is
    /// deliberately partial-commit: each incoming battery's exchange is
    /// its own unit, and successes are kept even if a later item fails,
    /// leaving the booking retryable in PENDINGSWAPPING.
    pub async fn commit_swap(
        &self,
        booking_id: u64,
        staff_id: &str,
        battery_in_ids: &[String],
    ) -> DomainResult<SwapCommit> {
        let mut booking = self
            .storage
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking", "id", booking_id))?;

        if booking.status == BookingStatus::Completed {
            return Err(DomainError::Conflict(format!(
                "booking #{} is already completed",
                booking_id
            )));
        }
        if booking.status.is_terminal() {
            return Err(DomainError::Conflict(format!(
                "booking #{} is {} and cannot be swapped",
                booking_id, booking.status
            )));
        }

        let required = booking.battery_count as usize;
        if battery_in_ids.len() != required {
            return Err(DomainError::Validation(format!(
                "booking #{} requires exactly {} batteries, got {}",
                booking_id,
                required,
                battery_in_ids.len()
            )));
        }
        let unique: HashSet<&String> = battery_in_ids.iter().collect();
        if unique.len() != battery_in_ids.len() {
            return Err(DomainError::Validation(
                "duplicate incoming battery ids".to_string(),
            ));
        }

        let station = self
            .storage
            .get_station(booking.station_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Station", "id", booking.station_id))?;
        if !station.has_staff(staff_id) {
            return Err(DomainError::Forbidden(format!(
                "staff {} is not assigned to station {}",
                staff_id, station.id
            )));
        }

        // Inspect every incoming battery before touching anything
        for id in battery_in_ids {
            let battery = self
                .storage
                .get_battery(id)
                .await?
                .ok_or_else(|| DomainError::not_found("Battery", "id", id))?;
            if !battery.is_active {
                return Err(DomainError::Validation(format!(
                    "battery {} is deactivated",
                    id
                )));
            }
            if battery.status == BatteryStatus::Maintenance {
                return Err(DomainError::Validation(format!(
                    "battery {} is under maintenance",
                    id
                )));
            }
            if battery.battery_type != booking.battery_type {
                return Err(DomainError::Validation(format!(
                    "battery {} is {} but booking #{} requested {}",
                    id, battery.battery_type, booking_id, booking.battery_type
                )));
            }
        }

        let lock = self.station_lock(station.id);
        let _guard = lock.lock().await;

        let available = self
            .storage
            .count_available_batteries(station.id, booking.battery_type)
            .await?;
        if available < required {
            return Err(DomainError::Conflict(format!(
                "station {} has {} available {} batteries, booking #{} needs {}",
                station.id, available, booking.battery_type, booking_id, required
            )));
        }

        let incoming: HashSet<&str> = battery_in_ids.iter().map(|s| s.as_str()).collect();
        let mut outcomes = Vec::with_capacity(required);
        let mut all_success = true;

        for battery_in_id in battery_in_ids {
            match self
                .exchange_one(&booking, battery_in_id, staff_id, &incoming)
                .await
            {
                Ok(swap) => {
                    outcomes.push(SwapOutcome {
                        battery_in_id: battery_in_id.clone(),
                        swap_id: Some(swap.id),
                        battery_out_id: Some(swap.battery_out_id),
                        slot_out_code: Some(swap.slot_out_code),
                        slot_in_code: Some(swap.slot_in_code),
                        success: true,
                        message: swap.description,
                    });
                }
                Err(e) => {
                    all_success = false;
                    warn!(booking_id, battery_in_id = %battery_in_id, error = %e, "Exchange failed");
                    outcomes.push(SwapOutcome {
                        battery_in_id: battery_in_id.clone(),
                        swap_id: None,
                        battery_out_id: None,
                        slot_out_code: None,
                        slot_in_code: None,
                        success: false,
                        message: e.to_string(),
                    });
                }
            }
        }

        // The engine is a privileged mutator of booking status: a fully
        // successful batch completes the booking, anything else leaves it
        // retryable.
        if all_success {
            booking.status = BookingStatus::Completed;
            booking.completed_date = Some(Utc::now().date_naive());
        } else {
            booking.status = BookingStatus::PendingSwapping;
        }
        self.storage.update_booking(booking.clone()).await?;

        info!(
            booking_id,
            staff_id,
            status = %booking.status,
            batteries = battery_in_ids.len(),
            "Swap batch committed"
        );

        Ok(SwapCommit {
            booking_id,
            booking_status: booking.status,
            outcomes,
        })
    }

    /// Execute one exchange as an independent unit: pick the outgoing
    /// battery deterministically, hand it out, and reinsert the incoming
    /// battery into the very slot it vacated.
    async fn exchange_one(
        &self,
        booking: &Booking,
        battery_in_id: &str,
        staff_id: &str,
        incoming: &HashSet<&str>,
    ) -> DomainResult<Swap> {
        let station_id = booking.station_id;

        let mut battery_in = self
            .storage
            .get_battery(battery_in_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Battery", "id", battery_in_id))?;

        let mut slot = self
            .select_outgoing_slot(station_id, booking, incoming)
            .await?
            .ok_or_else(|| {
                DomainError::Conflict(format!(
                    "no available {} battery left at station {}",
                    booking.battery_type, station_id
                ))
            })?;

        let out_id = slot
            .battery_id
            .clone()
            .ok_or_else(|| DomainError::Storage(format!("occupied slot {} holds no battery", slot.code())))?;
        let mut battery_out = self
            .storage
            .get_battery(&out_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Battery", "id", &out_id))?;

        let slot_code = slot.code();
        let mut description = "Swap completed.".to_string();

        // Same-slot reinsertion: the incoming battery takes the exact
        // slot the outgoing one vacated.
        battery_in.dock_at(station_id);
        if battery_in.needs_maintenance() {
            slot.attach(battery_in.id.clone(), SlotStatus::Reserved);
            description.push_str(" Low SoH, battery routed to MAINTENANCE.");
        } else {
            slot.attach(battery_in.id.clone(), SlotStatus::Occupied);
        }
        battery_out.hand_out();

        self.storage.update_battery(battery_in.clone()).await?;
        self.storage.update_battery(battery_out.clone()).await?;
        self.storage.update_slot(slot).await?;

        let swap = Swap {
            id: self.storage.next_swap_id().await,
            booking_id: booking.id,
            user_id: booking.user_id.clone(),
            staff_id: staff_id.to_string(),
            battery_out_id: battery_out.id.clone(),
            battery_in_id: battery_in.id.clone(),
            slot_out_code: slot_code.clone(),
            slot_in_code: slot_code,
            status: SwapStatus::Success,
            completed_at: Utc::now(),
            description,
        };
        self.storage.save_swap(swap.clone()).await?;

        info!(
            swap_id = swap.id,
            booking_id = booking.id,
            battery_out = %swap.battery_out_id,
            battery_in = %swap.battery_in_id,
            slot = %swap.slot_out_code,
            "Exchange recorded"
        );
        Ok(swap)
    }

    /// Deterministic outgoing selection: the AVAILABLE battery of the
    /// booked type sitting in the OCCUPIED slot with the lowest
    /// `(dock_name, slot_number)` key. Batteries from the current
    /// incoming batch are never handed straight back out.
    async fn select_outgoing_slot(
        &self,
        station_id: u32,
        booking: &Booking,
        incoming: &HashSet<&str>,
    ) -> DomainResult<Option<DockSlot>> {
        let slots = self.storage.list_station_slots(station_id).await?;
        let mut candidates: Vec<(DockSlot, Battery)> = Vec::new();
        for slot in slots {
            if slot.status != SlotStatus::Occupied || !slot.is_active {
                continue;
            }
            let Some(id) = slot.battery_id.as_deref() else {
                continue;
            };
            if incoming.contains(id) {
                continue;
            }
            if let Some(battery) = self.storage.get_battery(id).await? {
                if battery.status == BatteryStatus::Available
                    && battery.battery_type == booking.battery_type
                {
                    candidates.push((slot, battery));
                }
            }
        }
        candidates.sort_by(|(a, _), (b, _)| a.ordering_key().cmp(&b.ordering_key()));
        Ok(candidates.into_iter().next().map(|(slot, _)| slot))
    }

    /// Rollback path: undo the most recent swap of a booking and cancel
    /// both records.
    ///
    /// The outgoing battery returns to the first empty slot; the incoming
    /// battery leaves with the customer again. If the station has no
    /// empty slot the call fails with a capacity error and nothing is
    /// touched.
    pub async fn cancel_swap_by_booking(
        &self,
        booking_id: u64,
        reason: Option<String>,
    ) -> DomainResult<(Booking, Option<Swap>)> {
        let mut booking = self
            .storage
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking", "id", booking_id))?;

        if booking.status.is_terminal() {
            return Err(DomainError::Conflict(format!(
                "booking #{} is {} and cannot be cancelled",
                booking_id, booking.status
            )));
        }

        let Some(mut swap) = self.storage.latest_swap_for_booking(booking_id).await? else {
            booking
                .cancel(reason.unwrap_or_else(|| "Cancelled before any swap attempt".to_string()))
                .map_err(DomainError::Conflict)?;
            self.storage.update_booking(booking.clone()).await?;
            info!(booking_id, "Booking cancelled, no swap yet");
            return Ok((booking, None));
        };

        let lock = self.station_lock(booking.station_id);
        let _guard = lock.lock().await;

        let mut return_slot = self
            .storage
            .first_empty_slot(booking.station_id)
            .await?
            .ok_or_else(|| DomainError::StationAtCapacity {
                station_id: booking.station_id,
                battery_id: swap.battery_out_id.clone(),
            })?;

        let mut battery_out = self
            .storage
            .get_battery(&swap.battery_out_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Battery", "id", &swap.battery_out_id))?;
        let mut battery_in = self
            .storage
            .get_battery(&swap.battery_in_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Battery", "id", &swap.battery_in_id))?;

        // Outgoing battery comes back into rotation
        return_slot.attach(battery_out.id.clone(), SlotStatus::Occupied);
        battery_out.station_id = Some(booking.station_id);
        battery_out.status = BatteryStatus::Available;

        // Incoming battery leaves with the customer again; free its slot
        if let Some(mut in_slot) = self
            .storage
            .find_slot_by_battery(booking.station_id, &battery_in.id)
            .await?
        {
            in_slot.detach();
            self.storage.update_slot(in_slot).await?;
        }
        battery_in.hand_out();

        self.storage.update_battery(battery_out).await?;
        self.storage.update_battery(battery_in).await?;
        self.storage.update_slot(return_slot).await?;

        let reason = reason.unwrap_or_else(|| "Swap cancelled by staff".to_string());
        swap.status = SwapStatus::Cancelled;
        swap.description = format!("Cancelled, batteries rolled back. {}", reason);
        self.storage.update_swap(swap.clone()).await?;

        booking.cancel(reason).map_err(DomainError::Conflict)?;
        self.storage.update_booking(booking.clone()).await?;

        info!(booking_id, swap_id = swap.id, "Swap rolled back and cancelled");
        Ok((booking, Some(swap)))
    }

    /// Staff cancel keyed by swap id. `Temp` parks the swap for the user
    /// to retry (the sweeper reaps it after the timeout); `Permanent`
    /// rolls the batteries back via the booking path.
    pub async fn cancel_swap(
        &self,
        swap_id: u64,
        kind: CancelKind,
        reason: Option<String>,
    ) -> DomainResult<Swap> {
        let mut swap = self
            .storage
            .get_swap(swap_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Swap", "id", swap_id))?;

        match kind {
            CancelKind::Temp => {
                if swap.status != SwapStatus::Success {
                    return Err(DomainError::Conflict(format!(
                        "swap #{} is {} and cannot be parked",
                        swap_id, swap.status
                    )));
                }
                swap.status = SwapStatus::WaitingUserRetry;
                swap.description =
                    "Temporarily cancelled, waiting for the user to come back and retry."
                        .to_string();
                self.storage.update_swap(swap.clone()).await?;
                info!(swap_id, "Swap parked for user retry");
                Ok(swap)
            }
            CancelKind::Permanent => {
                let (_, cancelled) = self
                    .cancel_swap_by_booking(swap.booking_id, reason)
                    .await?;
                cancelled.ok_or_else(|| {
                    DomainError::Conflict(format!("swap #{} vanished during cancel", swap_id))
                })
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
