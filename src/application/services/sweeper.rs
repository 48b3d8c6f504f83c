//! Background sweeper that expires parked swaps.
//!
//! Swaps parked in WAITING_USER_RETRY get one timeout window for the
//! customer to come back. Once the window elapses the sweeper cancels
//! the swap and cascades the cancellation to its booking. Transitions go
//! through compare-and-set storage updates, so a concurrent staff retry
//! always wins over the sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::domain::SwapStatus;
use crate::infrastructure::Storage;
use crate::shared::{DomainResult, ShutdownSignal};

const EXPIRY_REASON: &str = "Auto-cancelled: user did not return within the retry window";

/// One sweep pass. Returns how many swaps were expired.
pub async fn sweep_once(storage: &Arc<dyn Storage>, timeout: Duration) -> DomainResult<usize> {
    let now = Utc::now();
    let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
    let parked = storage
        .list_swaps_by_status(SwapStatus::WaitingUserRetry)
        .await?;

    let mut expired = 0;
    for mut swap in parked {
        if !swap.is_overdue(now, timeout) {
            continue;
        }

        let swap_id = swap.id;
        let booking_id = swap.booking_id;
        swap.status = SwapStatus::Cancelled;
        swap.description = EXPIRY_REASON.to_string();
        if !storage
            .update_swap_if_status(swap, SwapStatus::WaitingUserRetry)
            .await?
        {
            // Lost the race against a staff action, leave it alone
            debug!(swap_id, "Swap changed state mid-sweep, skipping");
            continue;
        }

        expired += 1;
        info!(swap_id, "Parked swap expired");

        // Cascade to the booking unless it already reached a terminal
        // state through another path
        match storage.get_booking(booking_id).await? {
            Some(mut booking) if !booking.status.is_terminal() => {
                if let Err(e) = booking.cancel(EXPIRY_REASON) {
                    warn!(booking_id, error = %e, "Could not cascade cancellation");
                    continue;
                }
                storage.update_booking(booking).await?;
                info!(booking_id, swap_id, "Booking cancelled by sweeper");
            }
            Some(booking) => {
                debug!(booking_id, status = %booking.status, "Booking already terminal");
            }
            None => warn!(booking_id, swap_id, "Swap references missing booking"),
        }
    }

    Ok(expired)
}

/// Spawn the periodic sweeper. Runs until the shutdown signal fires.
pub fn start_swap_sweeper(
    storage: Arc<dyn Storage>,
    interval: Duration,
    timeout: Duration,
    shutdown: ShutdownSignal,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            timeout_secs = timeout.as_secs(),
            "Swap sweeper started"
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match sweep_once(&storage, timeout).await {
                        Ok(0) => {}
                        Ok(n) => info!(expired = n, "Sweep pass finished"),
                        Err(e) => error!(error = %e, "Sweep pass failed"),
                    }
                }
                _ = shutdown.notified().wait() => {
                    info!("Swap sweeper stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatteryType, Booking, BookingStatus, Swap, TimeSlot};
    use crate::infrastructure::InMemoryStorage;
    use chrono::Duration as ChronoDuration;

    const TIMEOUT: Duration = Duration::from_secs(60 * 60);

    async fn seed_parked_swap(
        storage: &Arc<InMemoryStorage>,
        minutes_ago: i64,
    ) -> (u64, u64) {
        let booking = Booking {
            id: storage.next_booking_id().await,
            user_id: "U001".into(),
            station_id: 1,
            vehicle_id: 3,
            battery_type: BatteryType::Lfp,
            battery_count: 1,
            amount: 15_000,
            date: Utc::now().date_naive(),
            time_slot: TimeSlot::Slot0200,
            status: BookingStatus::PendingSwapping,
            completed_date: None,
            cancellation_reason: None,
            invoice_id: None,
        };
        storage.save_booking(booking.clone()).await.unwrap();

        let swap = Swap {
            id: storage.next_swap_id().await,
            booking_id: booking.id,
            user_id: booking.user_id.clone(),
            staff_id: "ST001".into(),
            battery_out_id: "LFP-A".into(),
            battery_in_id: "IN-1".into(),
            slot_out_code: "A1".into(),
            slot_in_code: "A1".into(),
            status: SwapStatus::WaitingUserRetry,
            completed_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
            description: String::new(),
        };
        storage.save_swap(swap.clone()).await.unwrap();
        (swap.id, booking.id)
    }

    #[tokio::test]
    async fn expires_swap_past_the_timeout_and_cascades() {
        let storage = Arc::new(InMemoryStorage::new());
        let (swap_id, booking_id) = seed_parked_swap(&storage, 61).await;

        let dyn_storage: Arc<dyn Storage> = storage.clone();
        let expired = sweep_once(&dyn_storage, TIMEOUT).await.unwrap();
        assert_eq!(expired, 1);

        let swap = storage.get_swap(swap_id).await.unwrap().unwrap();
        assert_eq!(swap.status, SwapStatus::Cancelled);

        let booking = storage.get_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.cancellation_reason.as_deref(), Some(EXPIRY_REASON));
    }

    #[tokio::test]
    async fn leaves_swap_inside_the_window_alone() {
        let storage = Arc::new(InMemoryStorage::new());
        let (swap_id, booking_id) = seed_parked_swap(&storage, 59).await;

        let dyn_storage: Arc<dyn Storage> = storage.clone();
        let expired = sweep_once(&dyn_storage, TIMEOUT).await.unwrap();
        assert_eq!(expired, 0);

        let swap = storage.get_swap(swap_id).await.unwrap().unwrap();
        assert_eq!(swap.status, SwapStatus::WaitingUserRetry);
        let booking = storage.get_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::PendingSwapping);
    }

    #[tokio::test]
    async fn skips_swap_that_left_the_parked_state() {
        let storage = Arc::new(InMemoryStorage::new());
        let (swap_id, _) = seed_parked_swap(&storage, 120).await;

        // Staff resolved it between listing and sweeping
        let mut swap = storage.get_swap(swap_id).await.unwrap().unwrap();
        swap.status = SwapStatus::Success;
        storage.update_swap(swap).await.unwrap();

        let dyn_storage: Arc<dyn Storage> = storage.clone();
        let expired = sweep_once(&dyn_storage, TIMEOUT).await.unwrap();
        assert_eq!(expired, 0);
        let swap = storage.get_swap(swap_id).await.unwrap().unwrap();
        assert_eq!(swap.status, SwapStatus::Success);
    }

    #[tokio::test]
    async fn does_not_touch_terminal_bookings() {
        let storage = Arc::new(InMemoryStorage::new());
        let (swap_id, booking_id) = seed_parked_swap(&storage, 90).await;

        let mut booking = storage.get_booking(booking_id).await.unwrap().unwrap();
        booking.status = BookingStatus::Completed;
        storage.update_booking(booking).await.unwrap();

        let dyn_storage: Arc<dyn Storage> = storage.clone();
        sweep_once(&dyn_storage, TIMEOUT).await.unwrap();

        let swap = storage.get_swap(swap_id).await.unwrap().unwrap();
        assert_eq!(swap.status, SwapStatus::Cancelled);
        let booking = storage.get_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);
    }
}
