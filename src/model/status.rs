//! Status tiers and the fixed uptime/value banding.
//!
//! Banding is the single authority on which statuses are compatible with a
//! percentage. The derivation engine runs every reading through
//! [`band_subsystem`] or [`band_kpi_percent`]; formulas never get the last
//! word.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lower bound of the healthy band (inclusive).
pub const HEALTHY_MIN_PCT: f64 = 95.0;
/// Lower bound of the degraded band (inclusive). Below this is critical.
pub const DEGRADED_MIN_PCT: f64 = 80.0;

// ──────────────────── subsystem status ────────────────────

/// Health tier of a monitored subsystem, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubsystemStatus {
    Optimal,
    Operational,
    Warning,
    Maintenance,
    Critical,
}

impl SubsystemStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Optimal => "optimal",
            Self::Operational => "operational",
            Self::Warning => "warning",
            Self::Maintenance => "maintenance",
            Self::Critical => "critical",
        }
    }

    /// Multiplier applied to uptime for the detail view's performance figure.
    #[must_use]
    pub const fn performance_factor(self) -> f64 {
        match self {
            Self::Optimal => 1.0,
            Self::Operational => 0.97,
            Self::Warning => 0.90,
            Self::Maintenance => 0.85,
            Self::Critical => 0.60,
        }
    }

    /// Alerts this status contributes on its own.
    #[must_use]
    pub const fn alert_weight(self) -> u32 {
        match self {
            Self::Optimal | Self::Operational => 0,
            Self::Warning | Self::Maintenance => 1,
            Self::Critical => 2,
        }
    }
}

impl fmt::Display for SubsystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ──────────────────── KPI status ────────────────────

/// Tier of a headline KPI, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiStatus {
    Good,
    Warning,
    Critical,
}

impl KpiStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Baseline efficiency figure used by the detail view.
    #[must_use]
    pub const fn efficiency_base(self) -> f64 {
        match self {
            Self::Good => 92.0,
            Self::Warning => 78.0,
            Self::Critical => 55.0,
        }
    }
}

impl fmt::Display for KpiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ──────────────────── banding ────────────────────

/// Band a percentage falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    /// `pct >= 95`
    Healthy,
    /// `80 <= pct < 95`
    Degraded,
    /// `pct < 80`
    Failing,
}

impl Band {
    /// Classify an already-clamped percentage.
    #[must_use]
    pub fn of(pct: f64) -> Self {
        if pct >= HEALTHY_MIN_PCT {
            Self::Healthy
        } else if pct >= DEGRADED_MIN_PCT {
            Self::Degraded
        } else {
            Self::Failing
        }
    }

    /// Whether a subsystem status is allowed in this band.
    #[must_use]
    pub const fn admits_subsystem(self, status: SubsystemStatus) -> bool {
        match self {
            Self::Healthy => matches!(
                status,
                SubsystemStatus::Optimal | SubsystemStatus::Operational
            ),
            Self::Degraded => matches!(
                status,
                SubsystemStatus::Operational
                    | SubsystemStatus::Warning
                    | SubsystemStatus::Maintenance
            ),
            Self::Failing => matches!(status, SubsystemStatus::Critical),
        }
    }

    /// Whether a KPI status is allowed in this band.
    #[must_use]
    pub const fn admits_kpi(self, status: KpiStatus) -> bool {
        match self {
            Self::Healthy => matches!(status, KpiStatus::Good),
            Self::Degraded => matches!(status, KpiStatus::Good | KpiStatus::Warning),
            Self::Failing => matches!(status, KpiStatus::Critical),
        }
    }
}

/// Clamp a percentage into `[0, 100]`. Infinities saturate; NaN becomes 0.
#[must_use]
pub fn clamp_pct(raw: f64) -> f64 {
    if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 100.0) }
}

/// Nearest subsystem status admitted by the band of `uptime`.
///
/// `uptime` must already be clamped. Statuses the band admits pass through
/// untouched.
#[must_use]
pub fn band_subsystem(uptime: f64, status: SubsystemStatus) -> SubsystemStatus {
    let band = Band::of(uptime);
    if band.admits_subsystem(status) {
        return status;
    }
    match band {
        Band::Healthy => SubsystemStatus::Operational,
        Band::Degraded if status == SubsystemStatus::Optimal => SubsystemStatus::Operational,
        Band::Degraded => SubsystemStatus::Warning,
        Band::Failing => SubsystemStatus::Critical,
    }
}

/// Nearest KPI status admitted by the band of a percentage value.
#[must_use]
pub fn band_kpi_percent(value: f64, status: KpiStatus) -> KpiStatus {
    let band = Band::of(value);
    if band.admits_kpi(status) {
        return status;
    }
    match band {
        Band::Healthy => KpiStatus::Good,
        Band::Degraded => KpiStatus::Warning,
        Band::Failing => KpiStatus::Critical,
    }
}
