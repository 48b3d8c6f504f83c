//! # Battery Swap Station Service
//!
//! Booking, battery-exchange and payment-settlement backend for a
//! network of battery swap stations.
//!
//! ## Architecture
//!
//! - **domain**: entities and closed status enums with transition rules
//! - **application**: booking lifecycle, swap engine, payment settlement,
//!   background sweeper
//! - **infrastructure**: storage trait + in-memory implementation, payment
//!   gateway plumbing
//! - **interfaces**: REST API
//! - **shared**: error taxonomy and shutdown coordination

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod shared;

pub use config::{default_config_path, AppConfig};
pub use infrastructure::{InMemoryStorage, Storage};
pub use interfaces::http::{create_router, AppState};
