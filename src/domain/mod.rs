pub mod battery;
pub mod booking;
pub mod dock;
pub mod invoice;
pub mod payment;
pub mod station;
pub mod swap;

pub use battery::{Battery, BatteryStatus, BatteryType, SOH_MAINTENANCE_THRESHOLD};
pub use booking::{Booking, BookingStatus, TimeSlot, BOOKING_WINDOW_DAYS};
pub use dock::{DockSlot, SlotStatus};
pub use invoice::{Invoice, InvoiceStatus};
pub use payment::{Payment, PaymentStatus};
pub use station::Station;
pub use swap::{Swap, SwapStatus};
