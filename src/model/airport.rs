//! Built-in catalog for the airport operations centre.
//!
//! Static readings per posture. Every table lists its overrides strongest
//! flag first so the precedence reads top-down; the resolution itself does
//! not depend on insertion order.

use crate::model::catalog::{KpiPolicy, MetricCatalog, MetricDefinition, PolicyTable, RawReading};
use crate::model::mode::ModeFlag::{Emergency, OperationsAlert, SystemOptimized};
use crate::model::status::KpiStatus;
use crate::model::status::SubsystemStatus::{
    Critical, Maintenance, Operational, Optimal, Warning,
};

/// Ids of the built-in KPIs, in display order.
pub const KPI_IDS: [&str; 5] = [
    "active_flights",
    "on_time_performance",
    "passenger_throughput",
    "system_health",
    "security_level",
];

/// Ids of the built-in subsystems, in display order.
pub const SUBSYSTEM_IDS: [&str; 8] = [
    "atc", "runway", "bhs", "security", "fuel", "power", "hvac", "comms",
];

impl MetricCatalog {
    /// Catalog of the airport dashboard: five headline KPIs and eight
    /// subsystems.
    #[must_use]
    pub fn airport_default() -> Self {
        let mut defs = kpis();
        defs.extend(subsystems());
        // Ids above are distinct literals.
        Self::new(defs).unwrap_or_default()
    }
}

fn kpis() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition::kpi(
            "active_flights",
            "Active Flights",
            "Flights currently airborne within the terminal control area or taxiing.",
            PolicyTable::new(RawReading::count(24.0, 8.3))
                .when(Emergency, RawReading::count(18.0, -25.0))
                .when(OperationsAlert, RawReading::count(22.0, -8.3))
                .when(SystemOptimized, RawReading::count(27.0, 12.5)),
            KpiPolicy::CHANGE_SIGN,
        )
        .with_icon("plane"),
        MetricDefinition::kpi(
            "on_time_performance",
            "On-Time Performance",
            "Share of departures leaving within 15 minutes of schedule.",
            PolicyTable::new(RawReading::percent(87.5, 2.1))
                .when(Emergency, RawReading::percent(64.3, -26.5))
                .when(OperationsAlert, RawReading::percent(81.4, -7.0))
                .when(SystemOptimized, RawReading::percent(93.2, 6.5)),
            KpiPolicy::CHANGE_SIGN,
        )
        .with_icon("clock"),
        MetricDefinition::kpi(
            "passenger_throughput",
            "Passenger Throughput",
            "Passengers processed through security and boarding per hour.",
            PolicyTable::new(RawReading::count(12_450.0, 5.2))
                .when(Emergency, RawReading::count(8_200.0, -34.1))
                .when(OperationsAlert, RawReading::count(11_100.0, -10.8))
                .when(SystemOptimized, RawReading::count(13_900.0, 11.6)),
            KpiPolicy::CHANGE_SIGN,
        )
        .with_icon("users")
        .with_unit("pax/h"),
        MetricDefinition::kpi(
            "system_health",
            "System Health",
            "Weighted availability across all monitored subsystems.",
            PolicyTable::new(RawReading::percent(94.2, 1.3))
                .when(Emergency, RawReading::percent(72.5, -23.0))
                .when(OperationsAlert, RawReading::percent(88.0, -6.6))
                .when(SystemOptimized, RawReading::percent(98.7, 4.8)),
            KpiPolicy::Floor {
                warning_below: 90.0,
                critical_below: 80.0,
            },
        )
        .with_icon("activity"),
        MetricDefinition::kpi(
            "security_level",
            "Security Level",
            "Current threat posture published by airport security.",
            PolicyTable::new(RawReading::category("Normal", "Stable"))
                .when(Emergency, RawReading::category("Lockdown", "Escalated"))
                .when(OperationsAlert, RawReading::category("Elevated", "Raised")),
            KpiPolicy::Categorical(vec![
                ("Normal".to_string(), KpiStatus::Good),
                ("Elevated".to_string(), KpiStatus::Warning),
                ("Lockdown".to_string(), KpiStatus::Critical),
            ]),
        )
        .with_icon("shield"),
    ]
}

fn subsystems() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition::subsystem(
            "atc",
            "Air Traffic Control",
            "Radar, flight data processing and controller positions.",
            PolicyTable::new(RawReading::uptime(99.8, Optimal))
                .when(Emergency, RawReading::uptime(92.1, Warning))
                .when(OperationsAlert, RawReading::uptime(97.5, Operational))
                .when(SystemOptimized, RawReading::uptime(99.9, Optimal)),
        )
        .with_icon("radio-tower"),
        MetricDefinition::subsystem(
            "runway",
            "Runway Systems",
            "Runway lighting, ILS and surface condition sensors.",
            PolicyTable::new(RawReading::uptime(98.5, Operational))
                .when(Emergency, RawReading::uptime(85.0, Warning))
                .when(SystemOptimized, RawReading::uptime(99.2, Optimal)),
        )
        .with_icon("road"),
        MetricDefinition::subsystem(
            "bhs",
            "Baggage Handling System",
            "Check-in conveyors, sorters and make-up carousels.",
            PolicyTable::new(RawReading::uptime(89.2, Maintenance))
                .when(Emergency, RawReading::uptime(45.2, Critical))
                .when(OperationsAlert, RawReading::uptime(87.0, Warning))
                .when(SystemOptimized, RawReading::uptime(96.8, Operational)),
        )
        .with_icon("luggage"),
        MetricDefinition::subsystem(
            "security",
            "Security Screening",
            "Checkpoint scanners, hold baggage screening and access control.",
            PolicyTable::new(RawReading::uptime(97.3, Optimal))
                .when(Emergency, RawReading::uptime(78.4, Critical))
                .when(OperationsAlert, RawReading::uptime(91.5, Warning))
                .when(SystemOptimized, RawReading::uptime(98.9, Optimal)),
        )
        .with_icon("scan"),
        MetricDefinition::subsystem(
            "fuel",
            "Fuel Management",
            "Hydrant network, bowser dispatch and tank farm telemetry.",
            PolicyTable::new(RawReading::uptime(95.6, Operational))
                .when(Emergency, RawReading::uptime(88.3, Warning))
                .when(SystemOptimized, RawReading::uptime(98.1, Optimal)),
        )
        .with_icon("fuel"),
        MetricDefinition::subsystem(
            "power",
            "Power Grid",
            "Main supply, UPS banks and standby generators.",
            PolicyTable::new(RawReading::uptime(99.1, Optimal))
                .when(Emergency, RawReading::uptime(96.0, Operational)),
        )
        .with_icon("zap"),
        MetricDefinition::subsystem(
            "hvac",
            "Terminal HVAC",
            "Terminal climate control and air handling units.",
            PolicyTable::new(RawReading::uptime(93.4, Operational))
                .when(Emergency, RawReading::uptime(86.1, Maintenance))
                .when(SystemOptimized, RawReading::uptime(97.2, Optimal)),
        )
        .with_icon("wind"),
        MetricDefinition::subsystem(
            "comms",
            "Communications Network",
            "Voice, data and radio links between operational units.",
            PolicyTable::new(RawReading::uptime(99.5, Optimal))
                .when(Emergency, RawReading::uptime(94.2, Warning))
                .when(OperationsAlert, RawReading::uptime(98.0, Operational)),
        )
        .with_icon("wifi"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog::MetricCategory;

    #[test]
    fn default_catalog_has_every_listed_id_in_order() {
        let catalog = MetricCatalog::airport_default();
        let kpis: Vec<&str> = catalog.kpis().map(|d| d.id.as_str()).collect();
        let subsystems: Vec<&str> = catalog.subsystems().map(|d| d.id.as_str()).collect();
        assert_eq!(kpis, KPI_IDS);
        assert_eq!(subsystems, SUBSYSTEM_IDS);
        assert_eq!(catalog.len(), KPI_IDS.len() + SUBSYSTEM_IDS.len());
    }

    #[test]
    fn default_catalog_passes_validation() {
        let findings = MetricCatalog::airport_default().validate();
        assert!(findings.is_empty(), "unexpected findings: {findings:?}");
    }

    #[test]
    fn every_subsystem_is_governed_by_emergency() {
        let catalog = MetricCatalog::airport_default();
        for def in catalog.iter().filter(|d| d.category == MetricCategory::Subsystem) {
            assert!(
                def.formula.governed_by().contains(&Emergency),
                "{} ignores emergency",
                def.id
            );
        }
    }
}
