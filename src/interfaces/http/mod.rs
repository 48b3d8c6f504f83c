//! REST boundary. Thin handlers over the application services; no
//! business rules live here.

pub mod common;
pub mod error;
pub mod handlers;
pub mod router;

pub use common::{ApiResponse, ValidatedJson};
pub use error::{ApiError, ApiResult};
pub use router::{create_router, AppState};
