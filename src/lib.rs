#![forbid(unsafe_code)]

//! opsdeck: core of an airport operational-status dashboard.
//!
//! Operators flip three mode flags (emergency, operations alert, system
//! optimized). Every flip re-derives one complete, internally consistent
//! snapshot of KPIs, subsystem health and alert banners; clicking an item
//! projects it into a detail record.
//!
//! 1. **Catalog**: metric definitions with per-flag policy tables
//! 2. **Engine**: pure `(modes, catalog) → snapshot` derivation with banding
//! 3. **Controller**: single writer of the mode flags, publishing snapshots
//!
//! # Library usage
//!
//! ```rust,no_run
//! use opsdeck::prelude::*;
//!
//! let controller = ModeController::new(MetricCatalog::airport_default(), ModeState::NOMINAL);
//! controller.toggle(ModeFlag::Emergency);
//! let snapshot = controller.snapshot();
//! assert_eq!(snapshot.subsystem("bhs").map(|s| s.status), Some(SubsystemStatus::Critical));
//! ```

pub mod prelude;

pub mod core;
pub mod engine;
pub mod logger;
pub mod model;
