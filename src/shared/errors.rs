use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Station has no empty slot left to receive a returned battery.
    /// Operator intervention required; never retried automatically.
    #[error("Station {station_id} has no empty slot to receive battery {battery_id}")]
    StationAtCapacity { station_id: u32, battery_id: String },

    /// Signature or amount mismatch on a gateway message. Potential
    /// tamper signal, not a user error.
    #[error("Integrity: {0}")]
    Integrity(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, field: &'static str, value: impl ToString) -> Self {
        Self::NotFound {
            entity,
            field,
            value: value.to_string(),
        }
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
