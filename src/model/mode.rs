//! Operator mode flags and the transitions between them.
//!
//! [`ModeState`] is a plain value: three independent booleans, every one of
//! the eight combinations valid. The only writer is the mode controller; the
//! derivation engine only ever reads a copy.

use std::fmt;

use serde::{Deserialize, Serialize};

// ──────────────────── flags ────────────────────

/// One operator-controlled posture toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeFlag {
    /// Airport-wide emergency posture. Degrades most metrics.
    Emergency,
    /// Operations alert (weather hold, security sweep, ...).
    OperationsAlert,
    /// Optimization pass running. Improves metrics unless overridden.
    SystemOptimized,
}

impl ModeFlag {
    /// Fixed precedence, strongest first. When two active flags prescribe
    /// different readings for the same metric, the earlier one wins.
    pub const PRECEDENCE: [Self; 3] = [Self::Emergency, Self::OperationsAlert, Self::SystemOptimized];

    /// Zero-based rank in [`Self::PRECEDENCE`] (0 = strongest).
    #[must_use]
    pub const fn rank(self) -> usize {
        match self {
            Self::Emergency => 0,
            Self::OperationsAlert => 1,
            Self::SystemOptimized => 2,
        }
    }

    /// Human label carried on alert banners.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Emergency => "Emergency Mode Active",
            Self::OperationsAlert => "Operations Alert",
            Self::SystemOptimized => "System Optimization Active",
        }
    }

    /// Stable machine key, also used by the CLI and activity log.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::OperationsAlert => "operations_alert",
            Self::SystemOptimized => "system_optimized",
        }
    }

    /// Severity of the posture while this flag is on.
    #[must_use]
    pub const fn active_severity(self) -> Severity {
        match self {
            Self::Emergency => Severity::Critical,
            Self::OperationsAlert => Severity::Warning,
            Self::SystemOptimized => Severity::Info,
        }
    }
}

impl fmt::Display for ModeFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Severity attached to transitions and banners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// ──────────────────── state ────────────────────

/// The current operator-set flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeState {
    pub emergency: bool,
    pub operations_alert: bool,
    pub system_optimized: bool,
}

impl ModeState {
    /// All flags off.
    pub const NOMINAL: Self = Self {
        emergency: false,
        operations_alert: false,
        system_optimized: false,
    };

    /// Build a state from the three flags.
    #[must_use]
    pub const fn new(emergency: bool, operations_alert: bool, system_optimized: bool) -> Self {
        Self {
            emergency,
            operations_alert,
            system_optimized,
        }
    }

    /// Every combination, in binary-count order starting at [`Self::NOMINAL`].
    #[must_use]
    pub fn all() -> [Self; 8] {
        std::array::from_fn(|bits| Self::new(bits & 0b100 != 0, bits & 0b010 != 0, bits & 0b001 != 0))
    }

    /// Current value of one flag.
    #[must_use]
    pub const fn get(self, flag: ModeFlag) -> bool {
        match flag {
            ModeFlag::Emergency => self.emergency,
            ModeFlag::OperationsAlert => self.operations_alert,
            ModeFlag::SystemOptimized => self.system_optimized,
        }
    }

    /// Copy of this state with one flag set to `value`.
    #[must_use]
    pub const fn with(mut self, flag: ModeFlag, value: bool) -> Self {
        match flag {
            ModeFlag::Emergency => self.emergency = value,
            ModeFlag::OperationsAlert => self.operations_alert = value,
            ModeFlag::SystemOptimized => self.system_optimized = value,
        }
        self
    }

    /// Copy of this state with one flag inverted.
    #[must_use]
    pub const fn flipped(self, flag: ModeFlag) -> Self {
        self.with(flag, !self.get(flag))
    }

    /// Active flags, strongest first.
    pub fn active(self) -> impl Iterator<Item = ModeFlag> {
        ModeFlag::PRECEDENCE
            .into_iter()
            .filter(move |flag| self.get(*flag))
    }

    /// Whether no flag is set.
    #[must_use]
    pub const fn is_nominal(self) -> bool {
        !(self.emergency || self.operations_alert || self.system_optimized)
    }
}

// ──────────────────── transitions ────────────────────

/// Description of one applied toggle, handed to observers.
///
/// Carries enough for a notification layer to compose its own message; no
/// message text is produced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDescription {
    pub flag: ModeFlag,
    pub previous_value: bool,
    pub new_value: bool,
    pub severity: Severity,
    /// Publication tick at which the new state became visible.
    pub tick: u64,
}

impl TransitionDescription {
    /// Describe flipping `flag` from `previous_value`.
    #[must_use]
    pub const fn new(flag: ModeFlag, previous_value: bool, new_value: bool, tick: u64) -> Self {
        Self {
            flag,
            previous_value,
            new_value,
            severity: transition_severity(flag, new_value),
            tick,
        }
    }
}

/// Engaging emergency is critical, engaging an operations alert is a
/// warning; every other transition is informational.
#[must_use]
pub const fn transition_severity(flag: ModeFlag, new_value: bool) -> Severity {
    if new_value {
        flag.active_severity()
    } else {
        Severity::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_yields_eight_distinct_states() {
        let states = ModeState::all();
        let unique: std::collections::HashSet<ModeState> = states.iter().copied().collect();
        assert_eq!(unique.len(), 8);
        assert_eq!(states[0], ModeState::NOMINAL);
        assert_eq!(states[7], ModeState::new(true, true, true));
    }

    #[test]
    fn flip_touches_exactly_one_flag() {
        for state in ModeState::all() {
            for flag in ModeFlag::PRECEDENCE {
                let next = state.flipped(flag);
                assert_ne!(next.get(flag), state.get(flag));
                for other in ModeFlag::PRECEDENCE.into_iter().filter(|f| *f != flag) {
                    assert_eq!(next.get(other), state.get(other));
                }
                assert_eq!(next.flipped(flag), state);
            }
        }
    }

    #[test]
    fn active_lists_flags_in_precedence_order() {
        let state = ModeState::new(true, false, true);
        let active: Vec<ModeFlag> = state.active().collect();
        assert_eq!(active, vec![ModeFlag::Emergency, ModeFlag::SystemOptimized]);
        assert_eq!(ModeState::NOMINAL.active().count(), 0);
    }

    #[test]
    fn precedence_ranks_match_array_positions() {
        for (idx, flag) in ModeFlag::PRECEDENCE.into_iter().enumerate() {
            assert_eq!(flag.rank(), idx);
        }
    }

    #[test]
    fn transition_severity_table() {
        assert_eq!(transition_severity(ModeFlag::Emergency, true), Severity::Critical);
        assert_eq!(transition_severity(ModeFlag::Emergency, false), Severity::Info);
        assert_eq!(transition_severity(ModeFlag::OperationsAlert, true), Severity::Warning);
        assert_eq!(transition_severity(ModeFlag::OperationsAlert, false), Severity::Info);
        assert_eq!(transition_severity(ModeFlag::SystemOptimized, true), Severity::Info);
        assert_eq!(transition_severity(ModeFlag::SystemOptimized, false), Severity::Info);
    }

    #[test]
    fn mode_state_toml_fields_default_to_false() {
        let parsed: ModeState = toml::from_str("emergency = true").unwrap();
        assert_eq!(parsed, ModeState::new(true, false, false));
    }
}
