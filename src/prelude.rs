//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use opsdeck::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{OpsError, Result};

// Model
pub use crate::model::catalog::{
    ChangeIndicator, Formula, KpiPolicy, MetricCatalog, MetricCategory, MetricDefinition,
    MetricValue, PolicyTable, RawReading,
};
pub use crate::model::mode::{ModeFlag, ModeState, Severity, TransitionDescription};
pub use crate::model::status::{KpiStatus, SubsystemStatus};

// Engine
pub use crate::engine::controller::{ModeController, SnapshotView};
pub use crate::engine::derive::{
    AlertBanner, DerivationEngine, KpiRecord, OperationalSnapshot, SubsystemHealthRecord,
};
pub use crate::engine::projector::{
    DetailRecord, KeyMetric, RelatedAssets, Selection, SelectionProjector, StaticAssets, Trend,
};

// Logger
pub use crate::logger::jsonl::{ActivityLog, EventType, LogEntry};
