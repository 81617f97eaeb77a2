//! Property-based tests for snapshot derivation and the mode controller.
//!
//! Arbitrary toggle sequences and arbitrary formula outputs must keep every
//! published snapshot deterministic, banded and consistent with its modes.

use proptest::prelude::*;

use super::controller::ModeController;
use super::derive::{DerivationEngine, OperationalSnapshot};
use super::projector::{Selection, SelectionProjector};
use crate::model::catalog::{
    Formula, KpiPolicy, MetricCatalog, MetricDefinition, MetricValue, RawReading,
};
use crate::model::mode::{ModeFlag, ModeState};
use crate::model::status::{Band, KpiStatus, SubsystemStatus};

// ──────────────────── strategies ────────────────────

fn arb_flag() -> impl Strategy<Value = ModeFlag> {
    prop_oneof![
        Just(ModeFlag::Emergency),
        Just(ModeFlag::OperationsAlert),
        Just(ModeFlag::SystemOptimized),
    ]
}

fn arb_modes() -> impl Strategy<Value = ModeState> {
    (any::<bool>(), any::<bool>(), any::<bool>())
        .prop_map(|(e, a, o)| ModeState::new(e, a, o))
}

fn arb_subsystem_status() -> impl Strategy<Value = SubsystemStatus> {
    prop_oneof![
        Just(SubsystemStatus::Optimal),
        Just(SubsystemStatus::Operational),
        Just(SubsystemStatus::Warning),
        Just(SubsystemStatus::Maintenance),
        Just(SubsystemStatus::Critical),
    ]
}

fn arb_kpi_status() -> impl Strategy<Value = KpiStatus> {
    prop_oneof![
        Just(KpiStatus::Good),
        Just(KpiStatus::Warning),
        Just(KpiStatus::Critical),
    ]
}

/// Percent-ish readings, including out-of-domain and non-finite values.
fn arb_raw_pct() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => -50.0f64..150.0,
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
    ]
}

// ──────────────────── helpers ────────────────────

fn assert_snapshot_invariants(snap: &OperationalSnapshot) {
    for sub in &snap.subsystems {
        assert!(
            (0.0..=100.0).contains(&sub.uptime_percent),
            "{} uptime {} out of range",
            sub.id,
            sub.uptime_percent
        );
        assert!(
            Band::of(sub.uptime_percent).admits_subsystem(sub.status),
            "{} status {} outside band of {}",
            sub.id,
            sub.status,
            sub.uptime_percent
        );
    }
    for kpi in &snap.kpis {
        if let MetricValue::Percent(value) = kpi.value {
            assert!((0.0..=100.0).contains(&value));
            assert!(Band::of(value).admits_kpi(kpi.status), "{} misbanded", kpi.id);
        }
    }
    let bannered: Vec<ModeFlag> = snap.bannered_flags().collect();
    let active: Vec<ModeFlag> = snap.modes.active().collect();
    assert_eq!(bannered, active);
}

// ──────────────────── property tests ────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Deriving twice from the same modes gives value-identical snapshots.
    #[test]
    fn derivation_is_deterministic(modes in arb_modes()) {
        let catalog = MetricCatalog::airport_default();
        let engine = DerivationEngine::new();
        let a = engine.derive(&modes, &catalog);
        let b = engine.derive(&modes, &catalog);
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
        prop_assert_eq!(a, b);
    }

    /// Any toggle sequence keeps every published snapshot consistent, and the
    /// published snapshot always equals a fresh derivation of its modes.
    #[test]
    fn toggle_sequences_preserve_invariants(
        flags in prop::collection::vec(arb_flag(), 1..40)
    ) {
        let catalog = MetricCatalog::airport_default();
        let controller = ModeController::new(catalog.clone(), ModeState::NOMINAL);
        let engine = DerivationEngine::new();
        let mut expected = ModeState::NOMINAL;

        for (i, flag) in flags.into_iter().enumerate() {
            let t = controller.toggle(flag);
            expected = expected.flipped(flag);
            prop_assert_eq!(t.new_value, !t.previous_value);
            prop_assert_eq!(t.tick, i as u64 + 1);

            let view = controller.view();
            prop_assert_eq!(view.modes, expected);
            prop_assert_eq!(view.snapshot.modes, expected);
            assert_snapshot_invariants(&view.snapshot);
            prop_assert_eq!(&*view.snapshot, &engine.derive(&expected, &catalog));
        }
    }

    /// Flipping the same flag twice restores modes and snapshot.
    #[test]
    fn double_flip_is_identity(start in arb_modes(), flag in arb_flag()) {
        let controller = ModeController::new(MetricCatalog::airport_default(), start);
        let before = controller.snapshot();
        controller.toggle(flag);
        controller.toggle(flag);
        prop_assert_eq!(controller.modes(), start);
        prop_assert_eq!(&*controller.snapshot(), &*before);
    }

    /// Emergency decides every metric it governs, whatever else is on.
    #[test]
    fn emergency_dominates(alert in any::<bool>(), optimized in any::<bool>()) {
        let catalog = MetricCatalog::airport_default();
        let engine = DerivationEngine::new();
        let alone = engine.derive(&ModeState::new(true, false, false), &catalog);
        let mixed = engine.derive(&ModeState::new(true, alert, optimized), &catalog);
        prop_assert_eq!(&mixed.subsystems, &alone.subsystems);
        prop_assert_eq!(&mixed.kpis, &alone.kpis);
    }

    /// Arbitrary formula output is clamped and banded before publication.
    #[test]
    fn arbitrary_readings_are_banded(
        uptime in arb_raw_pct(),
        status in arb_subsystem_status(),
        pct in arb_raw_pct(),
        kpi_status in arb_kpi_status(),
        modes in arb_modes(),
    ) {
        let catalog = MetricCatalog::new(vec![
            MetricDefinition::subsystem(
                "probe",
                "Probe",
                "",
                Formula::custom(move |_: &ModeState| RawReading::uptime(uptime, status)),
            ),
            MetricDefinition::kpi(
                "probe_kpi",
                "Probe KPI",
                "",
                Formula::custom(move |_: &ModeState| {
                    RawReading::percent(pct, 0.0).with_kpi_status(kpi_status)
                }),
                KpiPolicy::Declared,
            ),
        ])
        .unwrap();
        let snap = DerivationEngine::new().derive(&modes, &catalog);
        assert_snapshot_invariants(&snap);
    }

    /// Every item of every snapshot projects to a known record, and
    /// subsystems always report in percent.
    #[test]
    fn projection_is_total(modes in arb_modes()) {
        let snap = DerivationEngine::new().derive(&modes, &MetricCatalog::airport_default());
        let projector: SelectionProjector = SelectionProjector::default();
        let selections = snap
            .kpis
            .iter()
            .cloned()
            .map(Selection::Kpi)
            .chain(snap.subsystems.iter().cloned().map(Selection::Subsystem));
        for selection in selections {
            let detail = projector.project(&selection, &snap);
            prop_assert!(detail.known);
            prop_assert_eq!(&detail.id, selection.id());
            prop_assert!(!detail.key_metrics.is_empty());
            if matches!(selection, Selection::Subsystem(_)) {
                prop_assert_eq!(detail.unit.as_str(), "%");
            }
        }
    }
}
