pub mod gateway;
pub mod storage;

pub use storage::{InMemoryStorage, Storage};
