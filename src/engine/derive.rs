//! Derivation engine: `(ModeState, MetricCatalog) → OperationalSnapshot`.
//!
//! One pass over the catalog produces every KPI, every subsystem record and
//! the alert banners from the same mode value. Nothing is patched
//! incrementally, so two widgets can never disagree about which posture they
//! are showing.
//!
//! **Design invariant:** derivation is pure. Identical inputs give
//! value-identical snapshots, and formula output outside its declared domain
//! is clamped and banded here rather than trusted.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::errors::OpsError;
use crate::model::catalog::{
    ChangeIndicator, DeclaredStatus, MetricCatalog, MetricDefinition, MetricValue, RawReading,
};
use crate::model::mode::{ModeFlag, ModeState, Severity};
use crate::model::status::{
    Band, KpiStatus, SubsystemStatus, band_kpi_percent, band_subsystem, clamp_pct,
};

// ──────────────────── records ────────────────────

/// One headline KPI as displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRecord {
    pub id: String,
    pub label: String,
    pub value: MetricValue,
    /// Display unit for counts; empty when the value speaks for itself.
    pub unit: String,
    pub change: ChangeIndicator,
    pub status: KpiStatus,
    pub description: String,
    pub icon: String,
}

/// Health of one subsystem as displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsystemHealthRecord {
    pub id: String,
    pub name: String,
    pub status: SubsystemStatus,
    pub uptime_percent: f64,
    /// Uptime minus the all-flags-off uptime, in percentage points.
    pub delta_from_nominal: f64,
    pub description: String,
    pub icon: String,
}

/// Banner shown while a mode flag is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertBanner {
    pub flag: ModeFlag,
    pub label: String,
    pub severity: Severity,
}

impl AlertBanner {
    fn for_flag(flag: ModeFlag) -> Self {
        Self {
            flag,
            label: flag.label().to_string(),
            severity: flag.active_severity(),
        }
    }
}

// ──────────────────── snapshot ────────────────────

/// Complete, internally consistent dashboard state for one mode value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalSnapshot {
    /// Mode value every record below was derived from.
    pub modes: ModeState,
    pub kpis: Vec<KpiRecord>,
    pub subsystems: Vec<SubsystemHealthRecord>,
    /// One banner per active flag, strongest first.
    pub banners: Vec<AlertBanner>,
}

impl OperationalSnapshot {
    #[must_use]
    pub fn kpi(&self, id: &str) -> Option<&KpiRecord> {
        self.kpis.iter().find(|k| k.id == id)
    }

    #[must_use]
    pub fn subsystem(&self, id: &str) -> Option<&SubsystemHealthRecord> {
        self.subsystems.iter().find(|s| s.id == id)
    }

    /// Flags that have a banner in this snapshot.
    pub fn bannered_flags(&self) -> impl Iterator<Item = ModeFlag> + '_ {
        self.banners.iter().map(|b| b.flag)
    }

    /// Worst subsystem status (`optimal` when there are no subsystems).
    #[must_use]
    pub fn overall_status(&self) -> SubsystemStatus {
        self.subsystems
            .iter()
            .map(|s| s.status)
            .max()
            .unwrap_or(SubsystemStatus::Optimal)
    }

    /// SHA-256 over the canonical JSON encoding, lowercase hex.
    ///
    /// Value-identical snapshots always share a fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        // Only plain data and finite floats: encoding cannot fail.
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        digest.iter().fold(String::with_capacity(64), |mut hex, byte| {
            use std::fmt::Write as _;
            let _ = write!(hex, "{byte:02x}");
            hex
        })
    }
}

// ──────────────────── corrections ────────────────────

/// What the engine had to fix in a formula's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
    /// Value outside its domain (or non-finite) was clamped.
    ValueClamped,
    /// Categorical value where a number was required; read as 0.
    NonNumericValue,
    /// Status of the wrong family was declared and ignored.
    StatusKindMismatch,
    /// Status disagreed with the value's band and was overridden.
    StatusBanded,
}

/// One fix applied during derivation. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub metric_id: String,
    pub kind: CorrectionKind,
    pub details: String,
}

impl Correction {
    fn new(metric_id: &str, kind: CorrectionKind, details: String) -> Self {
        Self {
            metric_id: metric_id.to_string(),
            kind,
            details,
        }
    }

    /// The catalog error this correction stands for.
    #[must_use]
    pub fn to_error(&self) -> OpsError {
        OpsError::invalid_metric(&self.metric_id, &self.details)
    }
}

// ──────────────────── engine ────────────────────

/// Stateless derivation of snapshots from mode flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivationEngine;

impl DerivationEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Derive the snapshot for `modes`.
    #[must_use]
    pub fn derive(&self, modes: &ModeState, catalog: &MetricCatalog) -> OperationalSnapshot {
        self.derive_with_report(modes, catalog).0
    }

    /// Derive the snapshot and list every correction applied on the way.
    #[must_use]
    pub fn derive_with_report(
        &self,
        modes: &ModeState,
        catalog: &MetricCatalog,
    ) -> (OperationalSnapshot, Vec<Correction>) {
        let mut corrections = Vec::new();

        let kpis = catalog
            .kpis()
            .map(|def| derive_kpi(def, modes, &mut corrections))
            .collect();
        let subsystems = catalog
            .subsystems()
            .map(|def| derive_subsystem(def, modes, &mut corrections))
            .collect();
        let banners = modes.active().map(AlertBanner::for_flag).collect();

        let snapshot = OperationalSnapshot {
            modes: *modes,
            kpis,
            subsystems,
            banners,
        };
        (snapshot, corrections)
    }
}

fn derive_subsystem(
    def: &MetricDefinition,
    modes: &ModeState,
    corrections: &mut Vec<Correction>,
) -> SubsystemHealthRecord {
    let reading = def.formula.evaluate(modes);
    let uptime = subsystem_uptime(def, &reading, Some(&mut *corrections));

    let declared = match reading.status {
        Some(DeclaredStatus::Subsystem(status)) => status,
        Some(DeclaredStatus::Kpi(status)) => {
            corrections.push(Correction::new(
                &def.id,
                CorrectionKind::StatusKindMismatch,
                format!("subsystem declared KPI status {status}"),
            ));
            default_subsystem_status(uptime)
        }
        None => default_subsystem_status(uptime),
    };
    let status = band_subsystem(uptime, declared);
    if status != declared {
        corrections.push(Correction::new(
            &def.id,
            CorrectionKind::StatusBanded,
            format!("status {declared} inconsistent with uptime {uptime}; using {status}"),
        ));
    }

    let nominal = def.formula.evaluate(&ModeState::NOMINAL);
    let nominal_uptime = subsystem_uptime(def, &nominal, None);

    SubsystemHealthRecord {
        id: def.id.clone(),
        name: def.label.clone(),
        status,
        uptime_percent: uptime,
        delta_from_nominal: round2(uptime - nominal_uptime),
        description: def.description.clone(),
        icon: def.icon.clone(),
    }
}

/// Clamped uptime of a reading; records corrections when a sink is given.
fn subsystem_uptime(
    def: &MetricDefinition,
    reading: &RawReading,
    corrections: Option<&mut Vec<Correction>>,
) -> f64 {
    let (uptime, problem) = match reading.value.as_number() {
        Some(raw) => {
            let clamped = clamp_pct(raw);
            let problem = (clamped != raw).then(|| {
                (
                    CorrectionKind::ValueClamped,
                    format!("uptime {raw} outside [0, 100]; clamped to {clamped}"),
                )
            });
            (clamped, problem)
        }
        None => (
            0.0,
            Some((
                CorrectionKind::NonNumericValue,
                format!("uptime must be numeric, got {}", reading.value),
            )),
        ),
    };
    if let (Some(sink), Some((kind, details))) = (corrections, problem) {
        sink.push(Correction::new(&def.id, kind, details));
    }
    uptime
}

fn default_subsystem_status(uptime: f64) -> SubsystemStatus {
    match Band::of(uptime) {
        Band::Healthy => SubsystemStatus::Operational,
        Band::Degraded => SubsystemStatus::Warning,
        Band::Failing => SubsystemStatus::Critical,
    }
}

fn derive_kpi(
    def: &MetricDefinition,
    modes: &ModeState,
    corrections: &mut Vec<Correction>,
) -> KpiRecord {
    let mut reading = def.formula.evaluate(modes);

    match &mut reading.value {
        MetricValue::Percent(value) => {
            let clamped = clamp_pct(*value);
            if clamped != *value {
                corrections.push(Correction::new(
                    &def.id,
                    CorrectionKind::ValueClamped,
                    format!("percentage {value} outside [0, 100]; clamped to {clamped}"),
                ));
                *value = clamped;
            }
        }
        MetricValue::Count(value) => {
            let sane = if value.is_finite() { value.max(0.0) } else { 0.0 };
            if sane != *value {
                corrections.push(Correction::new(
                    &def.id,
                    CorrectionKind::ValueClamped,
                    format!("count {value} must be finite and non-negative; using {sane}"),
                ));
                *value = sane;
            }
        }
        MetricValue::Category(_) => {}
    }
    if let ChangeIndicator::Percent(change) = &mut reading.change
        && !change.is_finite()
    {
        corrections.push(Correction::new(
            &def.id,
            CorrectionKind::ValueClamped,
            format!("change {change} must be finite; using 0"),
        ));
        *change = 0.0;
    }
    if let Some(DeclaredStatus::Subsystem(status)) = reading.status {
        corrections.push(Correction::new(
            &def.id,
            CorrectionKind::StatusKindMismatch,
            format!("KPI declared subsystem status {status}"),
        ));
        reading.status = None;
    }

    let classified = def.kpi_policy.classify(&reading);
    let status = match reading.value {
        MetricValue::Percent(value) => band_kpi_percent(value, classified),
        _ => classified,
    };
    if status != classified {
        corrections.push(Correction::new(
            &def.id,
            CorrectionKind::StatusBanded,
            format!("status {classified} inconsistent with value {}; using {status}", reading.value),
        ));
    }

    let unit = if reading.value.is_percent() {
        "%".to_string()
    } else {
        def.unit.clone()
    };

    KpiRecord {
        id: def.id.clone(),
        label: def.label.clone(),
        value: reading.value,
        unit,
        change: reading.change,
        status,
        description: def.description.clone(),
        icon: def.icon.clone(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
