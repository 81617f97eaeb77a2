//! Mode controller: the single writer of [`ModeState`].
//!
//! Flipping a flag, deriving the new snapshot and publishing it happen under
//! one write lock, so a reader sees either the old `(modes, snapshot)` pair or
//! the new one, never a mix. Observer notification and activity logging run
//! after the lock is released; the outbox mutex is taken before release so
//! deliveries keep publication order.

#![allow(missing_docs)]

use std::sync::Arc;

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Mutex, RwLock};

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::engine::derive::{Correction, DerivationEngine, OperationalSnapshot};
use crate::engine::projector::{
    DetailRecord, RelatedAssets, Selection, SelectionProjector, StaticAssets,
};
use crate::logger::jsonl::{ActivityLog, EventType, LogEntry};
use crate::model::catalog::MetricCatalog;
use crate::model::mode::{ModeFlag, ModeState, TransitionDescription};

/// Consistent read of the controller: `snapshot` was derived from `modes`.
#[derive(Debug, Clone)]
pub struct SnapshotView {
    /// Publication counter; advances by one per published snapshot.
    pub tick: u64,
    pub modes: ModeState,
    pub snapshot: Arc<OperationalSnapshot>,
}

/// Everything readers may observe, swapped as a unit.
struct Published {
    tick: u64,
    modes: ModeState,
    catalog: Arc<MetricCatalog>,
    snapshot: Arc<OperationalSnapshot>,
}

impl Published {
    fn view(&self) -> SnapshotView {
        SnapshotView {
            tick: self.tick,
            modes: self.modes,
            snapshot: Arc::clone(&self.snapshot),
        }
    }
}

/// Side effects of a publication, delivered outside the state lock.
#[derive(Default)]
struct Outbox {
    observers: Vec<Sender<TransitionDescription>>,
    log: Option<ActivityLog>,
}

impl Outbox {
    fn deliver(
        &mut self,
        transition: Option<TransitionDescription>,
        event: EventType,
        view: &SnapshotView,
        corrections: &[Correction],
    ) {
        if let Some(transition) = transition {
            // Unbounded senders only fail once the receiver is gone.
            self.observers.retain(|tx| tx.send(transition).is_ok());
        }

        let Some(log) = self.log.as_mut() else {
            return;
        };
        if let Some(transition) = transition {
            log.append(&LogEntry::transition(&transition));
        }
        log.append(&LogEntry::published(event, view.tick, &view.snapshot));
        for correction in corrections {
            log.append(&LogEntry::correction(view.tick, correction));
        }
        log.flush();
    }
}

/// Owns the mode flags and the published snapshot.
pub struct ModeController<A = StaticAssets> {
    state: RwLock<Published>,
    engine: DerivationEngine,
    projector: SelectionProjector<A>,
    outbox: Mutex<Outbox>,
}

impl ModeController<StaticAssets> {
    /// Controller over `catalog`, starting in `modes`, with no related
    /// assets and no activity log.
    #[must_use]
    pub fn new(catalog: MetricCatalog, modes: ModeState) -> Self {
        Self::with_assets(catalog, modes, StaticAssets::default())
    }

    /// Controller configured from `cfg`: initial modes, related assets and,
    /// when enabled, the activity log.
    #[must_use]
    pub fn from_config(catalog: MetricCatalog, cfg: &Config) -> Self {
        let controller =
            Self::with_assets(catalog, cfg.modes, StaticAssets::from_config(&cfg.projection));
        if cfg.logging.enabled {
            controller.attach_log(ActivityLog::open(&cfg.logging), cfg.stable_hash().ok())
        } else {
            controller
        }
    }
}

impl<A: RelatedAssets> ModeController<A> {
    /// Controller with a custom related-assets source.
    pub fn with_assets(catalog: MetricCatalog, modes: ModeState, assets: A) -> Self {
        let engine = DerivationEngine::new();
        let snapshot = engine.derive(&modes, &catalog);
        Self {
            state: RwLock::new(Published {
                tick: 0,
                modes,
                catalog: Arc::new(catalog),
                snapshot: Arc::new(snapshot),
            }),
            engine,
            projector: SelectionProjector::new(assets),
            outbox: Mutex::new(Outbox::default()),
        }
    }

    /// Attach an activity log and record the starting state in it.
    #[must_use]
    pub fn with_log(self, log: ActivityLog) -> Self {
        self.attach_log(log, None)
    }

    fn attach_log(mut self, mut log: ActivityLog, config_hash: Option<String>) -> Self {
        let state = self.state.get_mut();
        let (_, corrections) = self.engine.derive_with_report(&state.modes, &state.catalog);

        let mut start = LogEntry::published(EventType::ControllerStart, state.tick, &state.snapshot);
        start.config_hash = config_hash;
        log.append(&start);
        for correction in &corrections {
            log.append(&LogEntry::correction(state.tick, correction));
        }
        log.flush();

        self.outbox.get_mut().log = Some(log);
        self
    }

    // ──────────────────────── writes ────────────────────────

    /// Flip one flag and publish the re-derived snapshot. Never fails.
    pub fn toggle(&self, flag: ModeFlag) -> TransitionDescription {
        let state = self.state.write();
        let value = !state.modes.get(flag);
        self.commit(state, flag, value)
    }

    /// Set one flag. Returns `None` (and publishes nothing) when the flag
    /// already has that value.
    pub fn set(&self, flag: ModeFlag, value: bool) -> Option<TransitionDescription> {
        let state = self.state.write();
        if state.modes.get(flag) == value {
            return None;
        }
        Some(self.commit(state, flag, value))
    }

    /// Swap the catalog and republish under the current modes.
    pub fn replace_catalog(&self, catalog: MetricCatalog) -> SnapshotView {
        let mut state = self.state.write();
        state.catalog = Arc::new(catalog);
        let modes = state.modes;
        let corrections = self.republish(&mut state, modes);
        let view = state.view();

        let mut outbox = self.outbox.lock();
        drop(state);
        outbox.deliver(None, EventType::CatalogReplaced, &view, &corrections);
        view
    }

    fn commit(
        &self,
        mut state: parking_lot::RwLockWriteGuard<'_, Published>,
        flag: ModeFlag,
        value: bool,
    ) -> TransitionDescription {
        let previous = state.modes.get(flag);
        let next = state.modes.with(flag, value);
        let corrections = self.republish(&mut state, next);
        let view = state.view();
        let transition = TransitionDescription::new(flag, previous, value, view.tick);

        let mut outbox = self.outbox.lock();
        drop(state);
        outbox.deliver(
            Some(transition),
            EventType::SnapshotPublished,
            &view,
            &corrections,
        );
        transition
    }

    fn republish(&self, state: &mut Published, modes: ModeState) -> Vec<Correction> {
        let (snapshot, corrections) = self.engine.derive_with_report(&modes, &state.catalog);
        state.modes = modes;
        state.snapshot = Arc::new(snapshot);
        state.tick = state.tick.saturating_add(1);
        corrections
    }

    // ──────────────────────── reads ────────────────────────

    #[must_use]
    pub fn view(&self) -> SnapshotView {
        self.state.read().view()
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<OperationalSnapshot> {
        Arc::clone(&self.state.read().snapshot)
    }

    #[must_use]
    pub fn modes(&self) -> ModeState {
        self.state.read().modes
    }

    #[must_use]
    pub fn tick(&self) -> u64 {
        self.state.read().tick
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<MetricCatalog> {
        Arc::clone(&self.state.read().catalog)
    }

    /// Channel receiving every future transition. Dropping the receiver
    /// unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<TransitionDescription> {
        let (tx, rx) = unbounded();
        self.outbox.lock().observers.push(tx);
        rx
    }

    /// Detail record for `selection` against `snapshot` (normally the one
    /// the selection was taken from). Unknown items get defaults and are
    /// logged.
    pub fn project(&self, selection: &Selection, snapshot: &OperationalSnapshot) -> DetailRecord {
        match self.try_project(selection, snapshot) {
            Ok(record) => record,
            Err(err) => {
                let tick = self.tick();
                if let Some(log) = self.outbox.lock().log.as_mut() {
                    log.append(&LogEntry::unknown_selection(tick, &err));
                    log.flush();
                }
                DetailRecord::unknown(selection, Utc::now())
            }
        }
    }

    /// Strict projection: fails with `UnknownSelection`.
    pub fn try_project(
        &self,
        selection: &Selection,
        snapshot: &OperationalSnapshot,
    ) -> Result<DetailRecord> {
        self.projector.try_project(selection, snapshot)
    }
}
