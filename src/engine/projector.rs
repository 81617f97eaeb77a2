//! Selection projector: turns a clicked summary item into a detail record.
//!
//! The projector reads the snapshot the item was selected from and builds a
//! fresh [`DetailRecord`]. It never mutates either input and never fails: an
//! item missing from the snapshot yields a record of documented defaults.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::ProjectionConfig;
use crate::core::errors::{OpsError, Result};
use crate::engine::derive::{KpiRecord, OperationalSnapshot, SubsystemHealthRecord};
use crate::model::catalog::{MetricCategory, MetricValue};

/// Status label used when the selection could not be resolved.
pub const DEFAULT_STATUS: &str = "normal";
/// Title used when the selection could not be resolved.
pub const UNKNOWN_TITLE: &str = "Unknown selection";
/// Changes within this band (percentage points) count as stable.
const TREND_DEADBAND: f64 = 0.05;

// ──────────────────── selection ────────────────────

/// A summary item the operator clicked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum Selection {
    Kpi(KpiRecord),
    Subsystem(SubsystemHealthRecord),
}

impl Selection {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Kpi(k) => &k.id,
            Self::Subsystem(s) => &s.id,
        }
    }

    #[must_use]
    pub const fn category(&self) -> MetricCategory {
        match self {
            Self::Kpi(_) => MetricCategory::Kpi,
            Self::Subsystem(_) => MetricCategory::Subsystem,
        }
    }

    /// Look up a record by id in a snapshot, KPIs first.
    #[must_use]
    pub fn find(snapshot: &OperationalSnapshot, id: &str) -> Option<Self> {
        snapshot
            .kpi(id)
            .cloned()
            .map(Self::Kpi)
            .or_else(|| snapshot.subsystem(id).cloned().map(Self::Subsystem))
    }
}

impl From<KpiRecord> for Selection {
    fn from(record: KpiRecord) -> Self {
        Self::Kpi(record)
    }
}

impl From<SubsystemHealthRecord> for Selection {
    fn from(record: SubsystemHealthRecord) -> Self {
        Self::Subsystem(record)
    }
}

// ──────────────────── detail record ────────────────────

/// Direction of a key metric's change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    #[must_use]
    pub fn of(change: f64) -> Self {
        if change > TREND_DEADBAND {
            Self::Up
        } else if change < -TREND_DEADBAND {
            Self::Down
        } else {
            Self::Stable
        }
    }
}

/// One row of the detail view's metric table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMetric {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub trend: Trend,
    pub change_percent: f64,
}

impl KeyMetric {
    fn new(name: &str, value: f64, unit: &str, change_percent: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            unit: unit.to_string(),
            trend: Trend::of(change_percent),
            change_percent,
        }
    }
}

/// Normalized detail view of one selected item. A frozen copy: later mode
/// changes never reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub id: String,
    pub title: String,
    pub status: String,
    pub current_value: MetricValue,
    pub unit: String,
    /// When this projection was built (not when the data was measured).
    pub last_updated: DateTime<Utc>,
    pub description: String,
    /// Subsystems: Uptime, Performance, Alerts. KPIs: Performance, Efficiency.
    pub key_metrics: Vec<KeyMetric>,
    pub related_assets: Vec<String>,
    /// False when the selection was not found in the snapshot.
    pub known: bool,
}

impl DetailRecord {
    /// Record of documented defaults for a selection the snapshot lacks.
    #[must_use]
    pub fn unknown(selection: &Selection, captured_at: DateTime<Utc>) -> Self {
        let (unit, key_metrics) = match selection.category() {
            MetricCategory::Subsystem => (
                "%",
                vec![
                    KeyMetric::new("Uptime", 0.0, "%", 0.0),
                    KeyMetric::new("Performance", 0.0, "%", 0.0),
                    KeyMetric::new("Alerts", 0.0, "count", 0.0),
                ],
            ),
            MetricCategory::Kpi => (
                "",
                vec![
                    KeyMetric::new("Performance", 0.0, "", 0.0),
                    KeyMetric::new("Efficiency", 0.0, "%", 0.0),
                ],
            ),
        };
        Self {
            id: selection.id().to_string(),
            title: UNKNOWN_TITLE.to_string(),
            status: DEFAULT_STATUS.to_string(),
            current_value: MetricValue::Count(0.0),
            unit: unit.to_string(),
            last_updated: captured_at,
            description: String::new(),
            key_metrics,
            related_assets: Vec::new(),
            known: false,
        }
    }
}

// ──────────────────── related assets ────────────────────

/// Source of the "related assets" list shown in detail views.
pub trait RelatedAssets: Send + Sync {
    fn related_to(&self, selection: &Selection) -> Vec<String>;
}

/// Fixed asset list with optional per-item overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticAssets {
    default: Vec<String>,
    overrides: BTreeMap<String, Vec<String>>,
}

impl StaticAssets {
    #[must_use]
    pub fn new(default: Vec<String>, overrides: BTreeMap<String, Vec<String>>) -> Self {
        Self { default, overrides }
    }

    #[must_use]
    pub fn from_config(cfg: &ProjectionConfig) -> Self {
        Self::new(cfg.related_assets.clone(), cfg.overrides.clone())
    }
}

impl RelatedAssets for StaticAssets {
    fn related_to(&self, selection: &Selection) -> Vec<String> {
        self.overrides
            .get(selection.id())
            .unwrap_or(&self.default)
            .clone()
    }
}

// ──────────────────── projector ────────────────────

/// Builds detail records from selections.
#[derive(Debug, Clone, Default)]
pub struct SelectionProjector<A = StaticAssets> {
    assets: A,
}

impl<A: RelatedAssets> SelectionProjector<A> {
    #[must_use]
    pub const fn new(assets: A) -> Self {
        Self { assets }
    }

    /// Project `selection` against the snapshot it was taken from, stamped
    /// with the current time.
    #[must_use]
    pub fn project(&self, selection: &Selection, snapshot: &OperationalSnapshot) -> DetailRecord {
        self.project_at(selection, snapshot, Utc::now())
    }

    /// Strict variant of [`Self::project`].
    pub fn try_project(
        &self,
        selection: &Selection,
        snapshot: &OperationalSnapshot,
    ) -> Result<DetailRecord> {
        self.try_project_at(selection, snapshot, Utc::now())
    }

    /// Project with an explicit capture time.
    #[must_use]
    pub fn project_at(
        &self,
        selection: &Selection,
        snapshot: &OperationalSnapshot,
        captured_at: DateTime<Utc>,
    ) -> DetailRecord {
        self.try_project_at(selection, snapshot, captured_at)
            .unwrap_or_else(|_| DetailRecord::unknown(selection, captured_at))
    }

    /// Strict variant: fails with `UnknownSelection` instead of defaulting.
    pub fn try_project_at(
        &self,
        selection: &Selection,
        snapshot: &OperationalSnapshot,
        captured_at: DateTime<Utc>,
    ) -> Result<DetailRecord> {
        let unknown = || OpsError::UnknownSelection {
            id: selection.id().to_string(),
        };
        // The snapshot's copy is authoritative; the selection is only a key.
        let record = match selection {
            Selection::Kpi(k) => {
                let current = snapshot.kpi(&k.id).ok_or_else(unknown)?;
                kpi_detail(current, captured_at)
            }
            Selection::Subsystem(s) => {
                let current = snapshot.subsystem(&s.id).ok_or_else(unknown)?;
                subsystem_detail(current, snapshot, captured_at)
            }
        };
        Ok(DetailRecord {
            related_assets: self.assets.related_to(selection),
            ..record
        })
    }
}

fn subsystem_detail(
    record: &SubsystemHealthRecord,
    snapshot: &OperationalSnapshot,
    captured_at: DateTime<Utc>,
) -> DetailRecord {
    let change = record.delta_from_nominal;
    let performance = round1(record.uptime_percent * record.status.performance_factor());
    let banners = u32::try_from(snapshot.banners.len()).unwrap_or(u32::MAX);
    let alerts = banners.saturating_add(record.status.alert_weight());

    DetailRecord {
        id: record.id.clone(),
        title: record.name.clone(),
        status: record.status.label().to_string(),
        current_value: MetricValue::Percent(record.uptime_percent),
        unit: "%".to_string(),
        last_updated: captured_at,
        description: record.description.clone(),
        key_metrics: vec![
            KeyMetric::new("Uptime", record.uptime_percent, "%", change),
            KeyMetric::new("Performance", performance, "%", change),
            KeyMetric::new("Alerts", f64::from(alerts), "count", 0.0),
        ],
        related_assets: Vec::new(),
        known: true,
    }
}

fn kpi_detail(record: &KpiRecord, captured_at: DateTime<Utc>) -> DetailRecord {
    let change = record.change.as_percent().unwrap_or(0.0);
    let performance = record.value.as_number().unwrap_or(0.0);
    let efficiency = round1((record.status.efficiency_base() + change / 2.0).clamp(0.0, 100.0));
    // Display units such as `pax/h` stay on the Performance row.
    let unit = if record.value.is_percent() { "%" } else { "" };

    DetailRecord {
        id: record.id.clone(),
        title: record.label.clone(),
        status: record.status.label().to_string(),
        current_value: record.value.clone(),
        unit: unit.to_string(),
        last_updated: captured_at,
        description: record.description.clone(),
        key_metrics: vec![
            KeyMetric::new("Performance", performance, &record.unit, change),
            KeyMetric::new("Efficiency", efficiency, "%", change),
        ],
        related_assets: Vec::new(),
        known: true,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
