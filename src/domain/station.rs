//! Station domain entity

use serde::{Deserialize, Serialize};

/// Swap station. Battery and slot state live in the storage layer; the
/// station record carries identity plus the staff roster used for the
/// swap authorization check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: u32,
    pub name: String,
    pub address: String,
    /// User ids of staff assigned to this station
    pub staff_ids: Vec<String>,
}

impl Station {
    pub fn new(id: u32, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            address: address.into(),
            staff_ids: Vec::new(),
        }
    }

    pub fn with_staff(mut self, staff: impl Into<String>) -> Self {
        self.staff_ids.push(staff.into());
        self
    }

    pub fn has_staff(&self, staff_id: &str) -> bool {
        self.staff_ids.iter().any(|s| s == staff_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_roster_check() {
        let station = Station::new(1, "District 1", "12 Nguyen Hue").with_staff("ST001");
        assert!(station.has_staff("ST001"));
        assert!(!station.has_staff("ST002"));
    }
}
