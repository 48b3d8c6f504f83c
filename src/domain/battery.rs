//! Battery domain entity

use serde::{Deserialize, Serialize};

/// State-of-health floor below which an incoming battery is routed to
/// maintenance instead of going back into rotation.
pub const SOH_MAINTENANCE_THRESHOLD: f64 = 70.0;

/// Battery chemistry / pack type. A booking requests exactly one type and
/// the swap engine only exchanges batteries of that type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatteryType {
    Lfp,
    Nmc,
    Lto,
}

impl BatteryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lfp => "LFP",
            Self::Nmc => "NMC",
            Self::Lto => "LTO",
        }
    }
}

impl std::fmt::Display for BatteryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Battery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryStatus {
    /// Charged, docked, ready to hand out
    Available,
    /// With a customer, not at any station
    InUse,
    /// Docked and charging
    Charging,
    /// Docked, flagged damaged
    Damaged,
    /// Docked, held back for maintenance (low SoH or manual flag)
    Maintenance,
}

impl BatteryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::InUse => "IN_USE",
            Self::Charging => "CHARGING",
            Self::Damaged => "DAMAGED",
            Self::Maintenance => "MAINTENANCE",
        }
    }
}

impl std::fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Physical battery pack.
///
/// Residency is a weak link: `station_id` says where the battery is
/// docked, and the slot holding it is found through the station's slot
/// arena, never through a held reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battery {
    /// Serial number, unique across the fleet
    pub id: String,
    pub battery_type: BatteryType,
    /// State of health, percent
    pub state_of_health: f64,
    pub is_active: bool,
    pub status: BatteryStatus,
    /// Station the battery is docked at; `None` while with a customer
    pub station_id: Option<u32>,
}

impl Battery {
    pub fn new(id: impl Into<String>, battery_type: BatteryType, state_of_health: f64) -> Self {
        Self {
            id: id.into(),
            battery_type,
            state_of_health,
            is_active: true,
            status: BatteryStatus::Available,
            station_id: None,
        }
    }

    /// Whether the battery must go to maintenance instead of rotation.
    pub fn needs_maintenance(&self) -> bool {
        self.state_of_health < SOH_MAINTENANCE_THRESHOLD
    }

    /// Detach from any station: the battery leaves with a customer.
    pub fn hand_out(&mut self) {
        self.status = BatteryStatus::InUse;
        self.station_id = None;
    }

    /// Dock at a station. Status is decided by the SoH rule.
    pub fn dock_at(&mut self, station_id: u32) {
        self.station_id = Some(station_id);
        self.status = if self.needs_maintenance() {
            BatteryStatus::Maintenance
        } else {
            BatteryStatus::Available
        };
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_battery_docks_available() {
        let mut b = Battery::new("BAT-001", BatteryType::Lfp, 92.5);
        b.dock_at(3);
        assert_eq!(b.status, BatteryStatus::Available);
        assert_eq!(b.station_id, Some(3));
        assert!(!b.needs_maintenance());
    }

    #[test]
    fn low_soh_battery_docks_into_maintenance() {
        let mut b = Battery::new("BAT-002", BatteryType::Nmc, 69.9);
        b.dock_at(3);
        assert_eq!(b.status, BatteryStatus::Maintenance);
        assert!(b.needs_maintenance());
    }

    #[test]
    fn threshold_is_exclusive() {
        let b = Battery::new("BAT-003", BatteryType::Lfp, 70.0);
        assert!(!b.needs_maintenance());
    }

    #[test]
    fn hand_out_clears_residency() {
        let mut b = Battery::new("BAT-004", BatteryType::Lto, 88.0);
        b.dock_at(1);
        b.hand_out();
        assert_eq!(b.status, BatteryStatus::InUse);
        assert_eq!(b.station_id, None);
    }

    #[test]
    fn status_strings() {
        assert_eq!(BatteryStatus::InUse.as_str(), "IN_USE");
        assert_eq!(BatteryStatus::Maintenance.to_string(), "MAINTENANCE");
        assert_eq!(BatteryType::Lfp.as_str(), "LFP");
    }
}
