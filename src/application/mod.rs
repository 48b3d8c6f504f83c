pub mod ports;
pub mod services;

pub use services::{
    start_swap_sweeper, BookingService, CancelKind, PaymentService, SwapService,
};
