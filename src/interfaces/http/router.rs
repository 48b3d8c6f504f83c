//! HTTP router wiring the services behind the REST surface.

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::application::{BookingService, PaymentService, SwapService};

use super::handlers::{bookings, health, payments, swaps};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub swaps: Arc<SwapService>,
    pub payments: Arc<PaymentService>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/bookings", post(bookings::create_booking).get(bookings::list_bookings))
        .route("/bookings/{id}", get(bookings::get_booking))
        .route("/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route("/bookings/{id}/status", put(bookings::update_booking_status))
        .route("/stations/{id}/bookings", get(bookings::list_station_bookings))
        .route("/users/{id}/bookings", get(bookings::list_user_bookings))
        .route("/invoices", post(bookings::raise_invoice))
        .route("/swaps/commit", post(swaps::commit_swap))
        .route("/swaps/{booking_id}/cancel", post(swaps::cancel_swap_by_booking))
        .route("/swaps/{swap_id}/cancel-temp", post(swaps::cancel_swap_temp))
        .route("/payments/intent", post(payments::create_payment_intent))
        .route("/payments/vnpay/ipn", get(payments::vnpay_ipn))
        .route("/payments/vnpay/return", get(payments::vnpay_return))
        .route("/payments/refund/{booking_id}", post(payments::refund_booking))
        .with_state(state);

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
