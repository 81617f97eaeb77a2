//! Metric catalog: every monitored subsystem and KPI, and how each one reacts
//! to the operator flags.
//!
//! Each [`MetricDefinition`] owns a [`Formula`]. The common case is a
//! [`PolicyTable`]: a nominal reading plus at most one override per flag,
//! resolved strictly by [`ModeFlag::PRECEDENCE`]. Live integrations plug in a
//! [`Formula::Custom`] closure instead; the engine treats both the same way.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::errors::{OpsError, Result};
use crate::model::mode::{ModeFlag, ModeState};
use crate::model::status::{KpiStatus, SubsystemStatus};

// ──────────────────── values ────────────────────

/// Whether a definition feeds the KPI strip or the subsystem health grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Kpi,
    Subsystem,
}

/// Value of a metric reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    /// Plain quantity (flights, passengers per hour, ...).
    Count(f64),
    /// Percentage in `[0, 100]`; subject to banding.
    Percent(f64),
    /// Categorical level ("Normal", "Elevated", ...).
    Category(String),
}

impl MetricValue {
    /// Numeric view of the value, if it has one.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Count(v) | Self::Percent(v) => Some(*v),
            Self::Category(_) => None,
        }
    }

    #[must_use]
    pub const fn is_percent(&self) -> bool {
        matches!(self, Self::Percent(_))
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(v) if v.fract() == 0.0 => write!(f, "{v:.0}"),
            Self::Count(v) => write!(f, "{v:.1}"),
            Self::Percent(v) => write!(f, "{v:.1}%"),
            Self::Category(label) => f.write_str(label),
        }
    }
}

/// Change relative to the previous reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ChangeIndicator {
    /// Signed percentage change.
    Percent(f64),
    /// Categorical delta ("Stable", "Raised", ...).
    Category(String),
}

impl ChangeIndicator {
    /// Signed percentage, or `None` for categorical deltas.
    #[must_use]
    pub fn as_percent(&self) -> Option<f64> {
        match self {
            Self::Percent(v) => Some(*v),
            Self::Category(_) => None,
        }
    }
}

impl fmt::Display for ChangeIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(v) => write!(f, "{v:+.1}%"),
            Self::Category(label) => f.write_str(label),
        }
    }
}

/// Status a formula may declare alongside its value. The engine may
/// override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredStatus {
    Subsystem(SubsystemStatus),
    Kpi(KpiStatus),
}

/// Unprocessed output of a formula.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub value: MetricValue,
    pub change: ChangeIndicator,
    pub status: Option<DeclaredStatus>,
}

impl RawReading {
    /// Subsystem reading: uptime percentage with a declared health tier.
    #[must_use]
    pub const fn uptime(uptime_pct: f64, status: SubsystemStatus) -> Self {
        Self {
            value: MetricValue::Percent(uptime_pct),
            change: ChangeIndicator::Percent(0.0),
            status: Some(DeclaredStatus::Subsystem(status)),
        }
    }

    /// KPI count with a signed percentage change.
    #[must_use]
    pub const fn count(value: f64, change_pct: f64) -> Self {
        Self {
            value: MetricValue::Count(value),
            change: ChangeIndicator::Percent(change_pct),
            status: None,
        }
    }

    /// KPI percentage with a signed percentage change.
    #[must_use]
    pub const fn percent(value: f64, change_pct: f64) -> Self {
        Self {
            value: MetricValue::Percent(value),
            change: ChangeIndicator::Percent(change_pct),
            status: None,
        }
    }

    /// KPI categorical level with a categorical delta.
    #[must_use]
    pub fn category(level: impl Into<String>, delta: impl Into<String>) -> Self {
        Self {
            value: MetricValue::Category(level.into()),
            change: ChangeIndicator::Category(delta.into()),
            status: None,
        }
    }

    /// Attach a declared KPI status.
    #[must_use]
    pub fn with_kpi_status(mut self, status: KpiStatus) -> Self {
        self.status = Some(DeclaredStatus::Kpi(status));
        self
    }
}

// ──────────────────── formulas ────────────────────

/// Pure derivation from mode flags to a raw reading.
///
/// Implementations must be total over all eight [`ModeState`] values and
/// must not read external mutable state during a call.
pub trait DeriveFn: Send + Sync {
    fn derive(&self, modes: &ModeState) -> RawReading;
}

impl<F> DeriveFn for F
where
    F: Fn(&ModeState) -> RawReading + Send + Sync,
{
    fn derive(&self, modes: &ModeState) -> RawReading {
        self(modes)
    }
}

/// Declarative per-flag policy for one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    nominal: RawReading,
    overrides: BTreeMap<ModeFlag, RawReading>,
}

impl PolicyTable {
    /// Table that reads `nominal` while no governing flag is active.
    #[must_use]
    pub fn new(nominal: RawReading) -> Self {
        Self {
            nominal,
            overrides: BTreeMap::new(),
        }
    }

    /// Reading to use while `flag` is the strongest active governing flag.
    #[must_use]
    pub fn when(mut self, flag: ModeFlag, reading: RawReading) -> Self {
        self.overrides.insert(flag, reading);
        self
    }

    /// Flags that change this metric, strongest first.
    pub fn governed_by(&self) -> impl Iterator<Item = ModeFlag> + '_ {
        ModeFlag::PRECEDENCE
            .into_iter()
            .filter(|flag| self.overrides.contains_key(flag))
    }

    /// Flag whose override applies under `modes`, if any.
    #[must_use]
    pub fn winning_flag(&self, modes: &ModeState) -> Option<ModeFlag> {
        modes.active().find(|flag| self.overrides.contains_key(flag))
    }

    /// Resolve the reading for `modes`.
    #[must_use]
    pub fn resolve(&self, modes: &ModeState) -> &RawReading {
        self.winning_flag(modes)
            .and_then(|flag| self.overrides.get(&flag))
            .unwrap_or(&self.nominal)
    }

    #[must_use]
    pub const fn nominal(&self) -> &RawReading {
        &self.nominal
    }
}

/// How a metric's reading is produced.
#[derive(Clone)]
pub enum Formula {
    /// Table-driven policy (static data).
    Policy(PolicyTable),
    /// Arbitrary derive function (live data sources, tests).
    Custom(Arc<dyn DeriveFn>),
}

impl Formula {
    /// Wrap a closure as a custom formula.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&ModeState) -> RawReading + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Evaluate the formula for `modes`.
    #[must_use]
    pub fn evaluate(&self, modes: &ModeState) -> RawReading {
        match self {
            Self::Policy(table) => table.resolve(modes).clone(),
            Self::Custom(derive) => derive.derive(modes),
        }
    }

    /// Flags documented as governing this metric. Custom formulas are
    /// opaque and report every flag.
    #[must_use]
    pub fn governed_by(&self) -> Vec<ModeFlag> {
        match self {
            Self::Policy(table) => table.governed_by().collect(),
            Self::Custom(_) => ModeFlag::PRECEDENCE.to_vec(),
        }
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy(table) => f.debug_tuple("Policy").field(table).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<PolicyTable> for Formula {
    fn from(table: PolicyTable) -> Self {
        Self::Policy(table)
    }
}

// ──────────────────── KPI status policy ────────────────────

/// Per-KPI rule for turning a reading into a [`KpiStatus`].
#[derive(Debug, Clone, PartialEq)]
pub enum KpiPolicy {
    /// Status follows the signed change: `good` at or above `warning_below`,
    /// `critical` below `critical_below`, `warning` in between.
    ChangeSign {
        warning_below: f64,
        critical_below: f64,
    },
    /// Status follows the value regardless of change direction.
    Floor {
        warning_below: f64,
        critical_below: f64,
    },
    /// Categorical value mapped to a status; unmapped levels are `warning`.
    Categorical(Vec<(String, KpiStatus)>),
    /// Use whatever the formula declares (`good` when it declares nothing).
    Declared,
}

impl KpiPolicy {
    /// Good on any non-negative change, critical beyond a 20% drop (exactly
    /// -20% is still a warning).
    pub const CHANGE_SIGN: Self = Self::ChangeSign {
        warning_below: 0.0,
        critical_below: -20.0,
    };

    /// Classify a raw KPI reading.
    #[must_use]
    pub fn classify(&self, reading: &RawReading) -> KpiStatus {
        let declared = match reading.status {
            Some(DeclaredStatus::Kpi(status)) => Some(status),
            _ => None,
        };
        match self {
            Self::ChangeSign {
                warning_below,
                critical_below,
            } => reading.change.as_percent().map_or_else(
                || declared.unwrap_or(KpiStatus::Warning),
                |change| {
                    if change >= *warning_below {
                        KpiStatus::Good
                    } else if change < *critical_below {
                        KpiStatus::Critical
                    } else {
                        KpiStatus::Warning
                    }
                },
            ),
            Self::Floor {
                warning_below,
                critical_below,
            } => reading.value.as_number().map_or_else(
                || declared.unwrap_or(KpiStatus::Warning),
                |value| {
                    if value < *critical_below {
                        KpiStatus::Critical
                    } else if value < *warning_below {
                        KpiStatus::Warning
                    } else {
                        KpiStatus::Good
                    }
                },
            ),
            Self::Categorical(table) => match &reading.value {
                MetricValue::Category(level) => table
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(level))
                    .map_or(KpiStatus::Warning, |(_, status)| *status),
                _ => declared.unwrap_or(KpiStatus::Warning),
            },
            Self::Declared => declared.unwrap_or(KpiStatus::Good),
        }
    }
}

// ──────────────────── definitions ────────────────────

/// One catalog entry.
#[derive(Debug, Clone)]
pub struct MetricDefinition {
    pub id: String,
    pub category: MetricCategory,
    pub label: String,
    pub description: String,
    /// Icon token for the rendering layer; never interpreted here.
    pub icon: String,
    /// Display unit for KPI counts (`pax/h`, ...). Ignored for subsystems and
    /// percentages, which always read `%`.
    pub unit: String,
    pub formula: Formula,
    /// Status rule; only consulted for KPIs.
    pub kpi_policy: KpiPolicy,
}

impl MetricDefinition {
    /// Subsystem entry.
    pub fn subsystem(
        id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        formula: impl Into<Formula>,
    ) -> Self {
        Self {
            id: id.into(),
            category: MetricCategory::Subsystem,
            label: label.into(),
            description: description.into(),
            icon: String::new(),
            unit: String::new(),
            formula: formula.into(),
            kpi_policy: KpiPolicy::Declared,
        }
    }

    /// KPI entry.
    pub fn kpi(
        id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        formula: impl Into<Formula>,
        kpi_policy: KpiPolicy,
    ) -> Self {
        Self {
            id: id.into(),
            category: MetricCategory::Kpi,
            label: label.into(),
            description: description.into(),
            icon: String::new(),
            unit: String::new(),
            formula: formula.into(),
            kpi_policy,
        }
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Check the formula's output over every mode combination.
    ///
    /// Returns one finding per offending mode. Findings are advisory: the
    /// engine still derives a banded record for this entry.
    #[must_use]
    pub fn check(&self) -> Vec<OpsError> {
        ModeState::all()
            .into_iter()
            .filter_map(|modes| {
                self.check_reading(&self.formula.evaluate(&modes))
                    .map(|problem| {
                        OpsError::invalid_metric(
                            &self.id,
                            format!(
                                "{problem} (emergency={}, operations_alert={}, system_optimized={})",
                                modes.emergency, modes.operations_alert, modes.system_optimized
                            ),
                        )
                    })
            })
            .collect()
    }

    fn check_reading(&self, reading: &RawReading) -> Option<String> {
        match (&reading.value, self.category) {
            (MetricValue::Category(level), MetricCategory::Subsystem) => {
                return Some(format!("subsystem value must be numeric, got {level:?}"));
            }
            (MetricValue::Percent(v), _) if !(0.0..=100.0).contains(v) => {
                return Some(format!("percentage {v} outside [0, 100]"));
            }
            (MetricValue::Count(v), _) if !v.is_finite() || *v < 0.0 => {
                return Some(format!("count {v} must be finite and non-negative"));
            }
            (MetricValue::Count(v), MetricCategory::Subsystem) if *v > 100.0 => {
                return Some(format!("uptime {v} outside [0, 100]"));
            }
            _ => {}
        }
        if let ChangeIndicator::Percent(change) = reading.change
            && !change.is_finite()
        {
            return Some(format!("change {change} must be finite"));
        }
        match (reading.status, self.category) {
            (Some(DeclaredStatus::Kpi(_)), MetricCategory::Subsystem) => {
                Some("subsystem declared a KPI status".to_string())
            }
            (Some(DeclaredStatus::Subsystem(_)), MetricCategory::Kpi) => {
                Some("KPI declared a subsystem status".to_string())
            }
            _ => None,
        }
    }
}

// ──────────────────── catalog ────────────────────

/// Ordered, id-unique set of metric definitions.
///
/// Order is display order: the snapshot lists KPIs and subsystems in the
/// order they appear here.
#[derive(Debug, Clone, Default)]
pub struct MetricCatalog {
    definitions: Vec<MetricDefinition>,
}

impl MetricCatalog {
    /// Build a catalog, rejecting duplicate ids.
    pub fn new(definitions: Vec<MetricDefinition>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(definitions.len());
        for def in &definitions {
            if !seen.insert(def.id.as_str()) {
                return Err(OpsError::DuplicateMetric { id: def.id.clone() });
            }
        }
        Ok(Self { definitions })
    }

    /// Every definition in display order.
    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.definitions.iter()
    }

    /// KPI definitions in display order.
    pub fn kpis(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.iter()
            .filter(|def| def.category == MetricCategory::Kpi)
    }

    /// Subsystem definitions in display order.
    pub fn subsystems(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.iter()
            .filter(|def| def.category == MetricCategory::Subsystem)
    }

    /// Look up a definition by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&MetricDefinition> {
        self.definitions.iter().find(|def| def.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Validate every entry over all mode combinations.
    #[must_use]
    pub fn validate(&self) -> Vec<OpsError> {
        self.definitions
            .iter()
            .flat_map(MetricDefinition::check)
            .collect()
    }
}
