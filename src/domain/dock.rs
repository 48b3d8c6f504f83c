//! Dock slot domain entity
//!
//! Slots live in a per-station arena and hold a battery id as a weak
//! reference. A battery's slot is found by scanning the station's arena,
//! so there is no bidirectional pointer bookkeeping.

use serde::{Deserialize, Serialize};

/// Dock slot status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    Empty,
    Occupied,
    /// Holds a battery that must not be handed out (e.g. low SoH)
    Reserved,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Occupied => "OCCUPIED",
            Self::Reserved => "RESERVED",
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One physical mounting position at a station.
///
/// Invariant: `status == Empty` iff `battery_id` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockSlot {
    pub station_id: u32,
    pub dock_name: String,
    pub slot_number: u32,
    pub is_active: bool,
    pub status: SlotStatus,
    pub battery_id: Option<String>,
}

impl DockSlot {
    pub fn new(station_id: u32, dock_name: impl Into<String>, slot_number: u32) -> Self {
        Self {
            station_id,
            dock_name: dock_name.into(),
            slot_number,
            is_active: true,
            status: SlotStatus::Empty,
            battery_id: None,
        }
    }

    /// Human-readable slot code, e.g. `A3` for dock `A`, slot `3`.
    pub fn code(&self) -> String {
        format!("{}{}", self.dock_name, self.slot_number)
    }

    /// Stable ordering key used for deterministic outgoing-battery
    /// selection: lowest `(dock_name, slot_number)` wins.
    pub fn ordering_key(&self) -> (&str, u32) {
        (self.dock_name.as_str(), self.slot_number)
    }

    pub fn is_empty(&self) -> bool {
        self.battery_id.is_none()
    }

    /// Put a battery into this slot.
    pub fn attach(&mut self, battery_id: impl Into<String>, status: SlotStatus) {
        self.battery_id = Some(battery_id.into());
        self.status = status;
    }

    /// Take the battery out of this slot.
    pub fn detach(&mut self) -> Option<String> {
        self.status = SlotStatus::Empty;
        self.battery_id.take()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_slot_is_empty() {
        let s = DockSlot::new(1, "A", 2);
        assert!(s.is_empty());
        assert_eq!(s.status, SlotStatus::Empty);
        assert_eq!(s.code(), "A2");
    }

    #[test]
    fn attach_detach_roundtrip() {
        let mut s = DockSlot::new(1, "B", 1);
        s.attach("BAT-001", SlotStatus::Occupied);
        assert!(!s.is_empty());
        assert_eq!(s.status, SlotStatus::Occupied);

        let taken = s.detach();
        assert_eq!(taken.as_deref(), Some("BAT-001"));
        assert!(s.is_empty());
        assert_eq!(s.status, SlotStatus::Empty);
    }

    #[test]
    fn ordering_key_sorts_by_dock_then_number() {
        let a10 = DockSlot::new(1, "A", 10);
        let b1 = DockSlot::new(1, "B", 1);
        let a2 = DockSlot::new(1, "A", 2);

        let mut slots = vec![&b1, &a10, &a2];
        slots.sort_by_key(|s| s.ordering_key());
        let codes: Vec<String> = slots.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec!["A2", "A10", "B1"]);
    }
}
