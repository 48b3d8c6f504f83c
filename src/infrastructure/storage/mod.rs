//! Storage trait definitions

mod memory;

pub use memory::InMemoryStorage;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{
    Battery, BatteryType, Booking, BookingStatus, DockSlot, Invoice, Payment, Station, Swap,
    SwapStatus, TimeSlot,
};
use crate::shared::DomainResult;

/// Storage trait for persistence operations.
///
/// Users/stations/vehicles CRUD lives behind this boundary; the core only
/// needs key lookups and conditional updates. The `*_if_*` methods are
/// compare-and-set: they apply the update only when the stored record is
/// still in the expected state, atomically with the check.
#[async_trait]
pub trait Storage: Send + Sync {
    // Station operations
    async fn save_station(&self, station: Station) -> DomainResult<()>;
    async fn get_station(&self, id: u32) -> DomainResult<Option<Station>>;

    // Battery operations
    async fn save_battery(&self, battery: Battery) -> DomainResult<()>;
    async fn get_battery(&self, id: &str) -> DomainResult<Option<Battery>>;
    async fn update_battery(&self, battery: Battery) -> DomainResult<()>;
    async fn list_station_batteries(&self, station_id: u32) -> DomainResult<Vec<Battery>>;
    /// Number of AVAILABLE batteries of the given type docked at a station.
    async fn count_available_batteries(
        &self,
        station_id: u32,
        battery_type: BatteryType,
    ) -> DomainResult<usize>;

    // Dock slot operations (per-station arena)
    async fn save_slot(&self, slot: DockSlot) -> DomainResult<()>;
    async fn update_slot(&self, slot: DockSlot) -> DomainResult<()>;
    async fn list_station_slots(&self, station_id: u32) -> DomainResult<Vec<DockSlot>>;
    async fn find_slot_by_battery(
        &self,
        station_id: u32,
        battery_id: &str,
    ) -> DomainResult<Option<DockSlot>>;
    /// First empty active slot in `(dock_name, slot_number)` order.
    async fn first_empty_slot(&self, station_id: u32) -> DomainResult<Option<DockSlot>>;

    // Booking operations
    async fn next_booking_id(&self) -> u64;
    async fn save_booking(&self, booking: Booking) -> DomainResult<()>;
    async fn get_booking(&self, id: u64) -> DomainResult<Option<Booking>>;
    async fn update_booking(&self, booking: Booking) -> DomainResult<()>;
    async fn list_bookings_by_status(&self, status: BookingStatus) -> DomainResult<Vec<Booking>>;
    async fn list_bookings_by_station(&self, station_id: u32) -> DomainResult<Vec<Booking>>;
    async fn list_bookings_by_user(&self, user_id: &str) -> DomainResult<Vec<Booking>>;
    async fn find_active_booking_for_user(&self, user_id: &str) -> DomainResult<Option<Booking>>;
    async fn booking_exists_at(
        &self,
        station_id: u32,
        date: NaiveDate,
        time_slot: TimeSlot,
    ) -> DomainResult<bool>;

    // Invoice operations
    async fn next_invoice_id(&self) -> u64;
    async fn save_invoice(&self, invoice: Invoice) -> DomainResult<()>;
    async fn get_invoice(&self, id: u64) -> DomainResult<Option<Invoice>>;
    async fn update_invoice(&self, invoice: Invoice) -> DomainResult<()>;

    // Payment operations
    async fn next_payment_id(&self) -> u64;
    async fn save_payment(&self, payment: Payment) -> DomainResult<()>;
    async fn get_payment_by_txn_ref(&self, txn_ref: &str) -> DomainResult<Option<Payment>>;
    /// Latest SUCCESS payment for an invoice, if any.
    async fn find_success_payment(&self, invoice_id: u64) -> DomainResult<Option<Payment>>;
    /// Replace the stored payment only if it is still PENDING. Returns
    /// whether the update was applied; `false` means another delivery of
    /// the callback already settled it.
    async fn update_payment_if_pending(&self, payment: Payment) -> DomainResult<bool>;

    // Swap operations
    async fn next_swap_id(&self) -> u64;
    async fn save_swap(&self, swap: Swap) -> DomainResult<()>;
    async fn get_swap(&self, id: u64) -> DomainResult<Option<Swap>>;
    async fn update_swap(&self, swap: Swap) -> DomainResult<()>;
    /// Most recently created swap for a booking.
    async fn latest_swap_for_booking(&self, booking_id: u64) -> DomainResult<Option<Swap>>;
    async fn list_swaps_by_status(&self, status: SwapStatus) -> DomainResult<Vec<Swap>>;
    /// Replace the stored swap only if it is still in `expected` status.
    /// Returns whether the update was applied; `false` means a concurrent
    /// commit or cancel won the race.
    async fn update_swap_if_status(
        &self,
        swap: Swap,
        expected: SwapStatus,
    ) -> DomainResult<bool>;
}
