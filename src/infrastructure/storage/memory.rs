//! In-memory storage implementation

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;

use super::Storage;
use crate::domain::{
    Battery, BatteryStatus, BatteryType, Booking, BookingStatus, DockSlot, Invoice, Payment,
    PaymentStatus, Station, Swap, SwapStatus, TimeSlot,
};
use crate::shared::{DomainError, DomainResult};

/// In-memory storage for development and testing.
///
/// Slots are held as a per-station arena (`Vec<DockSlot>`); a battery's
/// slot is found by scanning its station's arena. DashMap entry locks
/// make the compare-and-set operations atomic.
pub struct InMemoryStorage {
    stations: DashMap<u32, Station>,
    batteries: DashMap<String, Battery>,
    slots: DashMap<u32, Vec<DockSlot>>,
    bookings: DashMap<u64, Booking>,
    invoices: DashMap<u64, Invoice>,
    payments: DashMap<String, Payment>,
    swaps: DashMap<u64, Swap>,
    booking_counter: AtomicU64,
    invoice_counter: AtomicU64,
    payment_counter: AtomicU64,
    swap_counter: AtomicU64,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            stations: DashMap::new(),
            batteries: DashMap::new(),
            slots: DashMap::new(),
            bookings: DashMap::new(),
            invoices: DashMap::new(),
            payments: DashMap::new(),
            swaps: DashMap::new(),
            booking_counter: AtomicU64::new(1),
            // Invoice ids start at 10000, matching the billing sequence
            invoice_counter: AtomicU64::new(10_000),
            payment_counter: AtomicU64::new(1),
            swap_counter: AtomicU64::new(1),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save_station(&self, station: Station) -> DomainResult<()> {
        self.slots.entry(station.id).or_default();
        self.stations.insert(station.id, station);
        Ok(())
    }

    async fn get_station(&self, id: u32) -> DomainResult<Option<Station>> {
        Ok(self.stations.get(&id).map(|s| s.clone()))
    }

    async fn save_battery(&self, battery: Battery) -> DomainResult<()> {
        self.batteries.insert(battery.id.clone(), battery);
        Ok(())
    }

    async fn get_battery(&self, id: &str) -> DomainResult<Option<Battery>> {
        Ok(self.batteries.get(id).map(|b| b.clone()))
    }

    async fn update_battery(&self, battery: Battery) -> DomainResult<()> {
        if !self.batteries.contains_key(&battery.id) {
            return Err(DomainError::not_found("Battery", "id", &battery.id));
        }
        self.batteries.insert(battery.id.clone(), battery);
        Ok(())
    }

    async fn list_station_batteries(&self, station_id: u32) -> DomainResult<Vec<Battery>> {
        Ok(self
            .batteries
            .iter()
            .filter(|b| b.station_id == Some(station_id))
            .map(|b| b.clone())
            .collect())
    }

    async fn count_available_batteries(
        &self,
        station_id: u32,
        battery_type: BatteryType,
    ) -> DomainResult<usize> {
        Ok(self
            .batteries
            .iter()
            .filter(|b| {
                b.station_id == Some(station_id)
                    && b.battery_type == battery_type
                    && b.status == BatteryStatus::Available
            })
            .count())
    }

    async fn save_slot(&self, slot: DockSlot) -> DomainResult<()> {
        let mut arena = self.slots.entry(slot.station_id).or_default();
        arena.push(slot);
        arena.sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()));
        Ok(())
    }

    async fn update_slot(&self, slot: DockSlot) -> DomainResult<()> {
        let mut arena = self
            .slots
            .get_mut(&slot.station_id)
            .ok_or_else(|| DomainError::not_found("Station", "id", slot.station_id))?;
        let existing = arena
            .iter_mut()
            .find(|s| s.dock_name == slot.dock_name && s.slot_number == slot.slot_number)
            .ok_or_else(|| DomainError::not_found("DockSlot", "code", slot.code()))?;
        *existing = slot;
        Ok(())
    }

    async fn list_station_slots(&self, station_id: u32) -> DomainResult<Vec<DockSlot>> {
        Ok(self
            .slots
            .get(&station_id)
            .map(|a| a.clone())
            .unwrap_or_default())
    }

    async fn find_slot_by_battery(
        &self,
        station_id: u32,
        battery_id: &str,
    ) -> DomainResult<Option<DockSlot>> {
        Ok(self.slots.get(&station_id).and_then(|arena| {
            arena
                .iter()
                .find(|s| s.battery_id.as_deref() == Some(battery_id))
                .cloned()
        }))
    }

    async fn first_empty_slot(&self, station_id: u32) -> DomainResult<Option<DockSlot>> {
        // Arena is kept sorted by ordering_key on insert
        Ok(self.slots.get(&station_id).and_then(|arena| {
            arena
                .iter()
                .find(|s| s.is_active && s.is_empty())
                .cloned()
        }))
    }

    async fn next_booking_id(&self) -> u64 {
        self.booking_counter.fetch_add(1, Ordering::SeqCst)
    }

    async fn save_booking(&self, booking: Booking) -> DomainResult<()> {
        self.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn get_booking(&self, id: u64) -> DomainResult<Option<Booking>> {
        Ok(self.bookings.get(&id).map(|b| b.clone()))
    }

    async fn update_booking(&self, booking: Booking) -> DomainResult<()> {
        if !self.bookings.contains_key(&booking.id) {
            return Err(DomainError::not_found("Booking", "id", booking.id));
        }
        self.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn list_bookings_by_status(&self, status: BookingStatus) -> DomainResult<Vec<Booking>> {
        Ok(self
            .bookings
            .iter()
            .filter(|b| b.status == status)
            .map(|b| b.clone())
            .collect())
    }

    async fn list_bookings_by_station(&self, station_id: u32) -> DomainResult<Vec<Booking>> {
        Ok(self
            .bookings
            .iter()
            .filter(|b| b.station_id == station_id)
            .map(|b| b.clone())
            .collect())
    }

    async fn list_bookings_by_user(&self, user_id: &str) -> DomainResult<Vec<Booking>> {
        Ok(self
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .map(|b| b.clone())
            .collect())
    }

    async fn find_active_booking_for_user(&self, user_id: &str) -> DomainResult<Option<Booking>> {
        Ok(self
            .bookings
            .iter()
            .find(|b| b.user_id == user_id && b.status.is_active())
            .map(|b| b.clone()))
    }

    async fn booking_exists_at(
        &self,
        station_id: u32,
        date: NaiveDate,
        time_slot: TimeSlot,
    ) -> DomainResult<bool> {
        Ok(self.bookings.iter().any(|b| {
            b.station_id == station_id
                && b.date == date
                && b.time_slot == time_slot
                && !matches!(b.status, BookingStatus::Cancelled | BookingStatus::Failed)
        }))
    }

    async fn next_invoice_id(&self) -> u64 {
        self.invoice_counter.fetch_add(1, Ordering::SeqCst)
    }

    async fn save_invoice(&self, invoice: Invoice) -> DomainResult<()> {
        self.invoices.insert(invoice.id, invoice);
        Ok(())
    }

    async fn get_invoice(&self, id: u64) -> DomainResult<Option<Invoice>> {
        Ok(self.invoices.get(&id).map(|i| i.clone()))
    }

    async fn update_invoice(&self, invoice: Invoice) -> DomainResult<()> {
        if !self.invoices.contains_key(&invoice.id) {
            return Err(DomainError::not_found("Invoice", "id", invoice.id));
        }
        self.invoices.insert(invoice.id, invoice);
        Ok(())
    }

    async fn next_payment_id(&self) -> u64 {
        self.payment_counter.fetch_add(1, Ordering::SeqCst)
    }

    async fn save_payment(&self, payment: Payment) -> DomainResult<()> {
        self.payments.insert(payment.txn_ref.clone(), payment);
        Ok(())
    }

    async fn get_payment_by_txn_ref(&self, txn_ref: &str) -> DomainResult<Option<Payment>> {
        Ok(self.payments.get(txn_ref).map(|p| p.clone()))
    }

    async fn find_success_payment(&self, invoice_id: u64) -> DomainResult<Option<Payment>> {
        Ok(self
            .payments
            .iter()
            .filter(|p| p.invoice_id == invoice_id && p.status == PaymentStatus::Success)
            .max_by_key(|p| p.created_at)
            .map(|p| p.clone()))
    }

    async fn update_payment_if_pending(&self, payment: Payment) -> DomainResult<bool> {
        // get_mut holds the shard lock, making check-and-set atomic
        match self.payments.get_mut(&payment.txn_ref) {
            Some(mut entry) => {
                if entry.status != PaymentStatus::Pending {
                    return Ok(false);
                }
                *entry = payment;
                Ok(true)
            }
            None => Err(DomainError::not_found("Payment", "txn_ref", &payment.txn_ref)),
        }
    }

    async fn next_swap_id(&self) -> u64 {
        self.swap_counter.fetch_add(1, Ordering::SeqCst)
    }

    async fn save_swap(&self, swap: Swap) -> DomainResult<()> {
        self.swaps.insert(swap.id, swap);
        Ok(())
    }

    async fn get_swap(&self, id: u64) -> DomainResult<Option<Swap>> {
        Ok(self.swaps.get(&id).map(|s| s.clone()))
    }

    async fn update_swap(&self, swap: Swap) -> DomainResult<()> {
        if !self.swaps.contains_key(&swap.id) {
            return Err(DomainError::not_found("Swap", "id", swap.id));
        }
        self.swaps.insert(swap.id, swap);
        Ok(())
    }

    async fn latest_swap_for_booking(&self, booking_id: u64) -> DomainResult<Option<Swap>> {
        Ok(self
            .swaps
            .iter()
            .filter(|s| s.booking_id == booking_id)
            .max_by_key(|s| s.id)
            .map(|s| s.clone()))
    }

    async fn list_swaps_by_status(&self, status: SwapStatus) -> DomainResult<Vec<Swap>> {
        Ok(self
            .swaps
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.clone())
            .collect())
    }

    async fn update_swap_if_status(&self, swap: Swap, expected: SwapStatus) -> DomainResult<bool> {
        match self.swaps.get_mut(&swap.id) {
            Some(mut entry) => {
                if entry.status != expected {
                    return Ok(false);
                }
                *entry = swap;
                Ok(true)
            }
            None => Err(DomainError::not_found("Swap", "id", swap.id)),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SlotStatus;

    #[tokio::test]
    async fn slot_arena_keeps_deterministic_order() {
        let storage = InMemoryStorage::new();
        storage.save_station(Station::new(1, "S1", "addr")).await.unwrap();
        storage.save_slot(DockSlot::new(1, "B", 1)).await.unwrap();
        storage.save_slot(DockSlot::new(1, "A", 2)).await.unwrap();
        storage.save_slot(DockSlot::new(1, "A", 1)).await.unwrap();

        let slots = storage.list_station_slots(1).await.unwrap();
        let codes: Vec<String> = slots.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec!["A1", "A2", "B1"]);

        let first = storage.first_empty_slot(1).await.unwrap().unwrap();
        assert_eq!(first.code(), "A1");
    }

    #[tokio::test]
    async fn payment_cas_rejects_settled_payment() {
        let storage = InMemoryStorage::new();
        let mut payment = Payment::new(1, 10_000, 15_000, "ref001");
        storage.save_payment(payment.clone()).await.unwrap();

        payment.status = PaymentStatus::Success;
        assert!(storage.update_payment_if_pending(payment.clone()).await.unwrap());
        // Second settlement attempt observes SUCCESS and is a no-op
        payment.status = PaymentStatus::Failed;
        assert!(!storage.update_payment_if_pending(payment).await.unwrap());

        let stored = storage.get_payment_by_txn_ref("ref001").await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn swap_cas_is_a_noop_on_wrong_status() {
        let storage = InMemoryStorage::new();
        let swap = Swap {
            id: 7,
            booking_id: 1,
            user_id: "U001".into(),
            staff_id: "ST001".into(),
            battery_out_id: "OUT".into(),
            battery_in_id: "IN".into(),
            slot_out_code: "A1".into(),
            slot_in_code: "A1".into(),
            status: SwapStatus::Success,
            completed_at: chrono::Utc::now(),
            description: String::new(),
        };
        storage.save_swap(swap.clone()).await.unwrap();

        let mut cancelled = swap.clone();
        cancelled.status = SwapStatus::Cancelled;
        let applied = storage
            .update_swap_if_status(cancelled, SwapStatus::WaitingUserRetry)
            .await
            .unwrap();
        assert!(!applied);
        assert_eq!(
            storage.get_swap(7).await.unwrap().unwrap().status,
            SwapStatus::Success
        );
    }

    #[tokio::test]
    async fn booking_slot_collision_ignores_cancelled() {
        let storage = InMemoryStorage::new();
        let date = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let mut booking = Booking {
            id: storage.next_booking_id().await,
            user_id: "U001".into(),
            station_id: 1,
            vehicle_id: 1,
            battery_type: BatteryType::Lfp,
            battery_count: 1,
            amount: 15_000,
            date,
            time_slot: TimeSlot::Slot0200,
            status: BookingStatus::Cancelled,
            completed_date: None,
            cancellation_reason: None,
            invoice_id: None,
        };
        storage.save_booking(booking.clone()).await.unwrap();
        assert!(!storage.booking_exists_at(1, date, TimeSlot::Slot0200).await.unwrap());

        booking.id = storage.next_booking_id().await;
        booking.status = BookingStatus::Pending;
        storage.save_booking(booking).await.unwrap();
        assert!(storage.booking_exists_at(1, date, TimeSlot::Slot0200).await.unwrap());
    }

    #[tokio::test]
    async fn latest_swap_wins_by_id() {
        let storage = InMemoryStorage::new();
        for i in 1..=3u64 {
            storage
                .save_swap(Swap {
                    id: i,
                    booking_id: 42,
                    user_id: "U".into(),
                    staff_id: "S".into(),
                    battery_out_id: format!("OUT{i}"),
                    battery_in_id: format!("IN{i}"),
                    slot_out_code: "A1".into(),
                    slot_in_code: "A1".into(),
                    status: SwapStatus::Success,
                    completed_at: chrono::Utc::now(),
                    description: String::new(),
                })
                .await
                .unwrap();
        }
        let latest = storage.latest_swap_for_booking(42).await.unwrap().unwrap();
        assert_eq!(latest.id, 3);
    }
}
