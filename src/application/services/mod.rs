pub mod booking;
pub mod payment;
pub mod swap_engine;
pub mod sweeper;

pub use booking::{BookingService, CreateBookingInput};
pub use payment::{PaymentIntent, PaymentService, ReturnView};
pub use swap_engine::{CancelKind, SwapCommit, SwapOutcome, SwapService};
pub use sweeper::{start_swap_sweeper, sweep_once};
