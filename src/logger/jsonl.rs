//! JSONL activity log: one self-contained JSON object per line recording mode
//! transitions, snapshot publications and engine corrections.
//!
//! Lines are built in memory and written with a single `write_all` so a
//! concurrent `tail -f` never sees a partial record. Writing degrades through
//! primary file → fallback file → stderr (`[OPS-JSONL]` prefix) → discard;
//! the dashboard never fails because its log did.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::config::LoggingConfig;
use crate::core::errors::{OpsError, Result};
use crate::engine::derive::{Correction, OperationalSnapshot};
use crate::model::mode::{ModeFlag, Severity, TransitionDescription};

// ──────────────────── entries ────────────────────

/// Kinds of activity recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ControllerStart,
    ModeToggled,
    SnapshotPublished,
    MetricCorrected,
    CatalogReplaced,
    UnknownSelection,
}

/// One line of the activity log. Only `ts`, `event` and `severity` are
/// always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<ModeFlag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<bool>,
    /// Publication tick the event belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Snapshot fingerprint (SHA-256 hex).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Hash of the effective configuration, on `controller_start`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

impl LogEntry {
    /// Bare entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            severity,
            flag: None,
            previous: None,
            new: None,
            tick: None,
            metric_id: None,
            error_code: None,
            details: None,
            fingerprint: None,
            config_hash: None,
        }
    }

    /// A toggle was applied.
    pub fn transition(transition: &TransitionDescription) -> Self {
        Self {
            flag: Some(transition.flag),
            previous: Some(transition.previous_value),
            new: Some(transition.new_value),
            tick: Some(transition.tick),
            ..Self::new(EventType::ModeToggled, transition.severity)
        }
    }

    /// A new snapshot became visible to readers.
    pub fn published(event: EventType, tick: u64, snapshot: &OperationalSnapshot) -> Self {
        let active: Vec<&str> = snapshot.modes.active().map(ModeFlag::key).collect();
        Self {
            tick: Some(tick),
            fingerprint: Some(snapshot.fingerprint()),
            details: Some(format!("active=[{}]", active.join(","))),
            ..Self::new(event, Severity::Info)
        }
    }

    /// The engine fixed a formula's output.
    pub fn correction(tick: u64, correction: &Correction) -> Self {
        Self {
            tick: Some(tick),
            metric_id: Some(correction.metric_id.clone()),
            error_code: Some(correction.to_error().code().to_string()),
            details: Some(correction.details.clone()),
            ..Self::new(EventType::MetricCorrected, Severity::Warning)
        }
    }

    /// A detail view was requested for an item the snapshot lacks.
    pub fn unknown_selection(tick: u64, error: &OpsError) -> Self {
        Self {
            tick: Some(tick),
            error_code: Some(error.code().to_string()),
            details: Some(error.to_string()),
            ..Self::new(EventType::UnknownSelection, Severity::Warning)
        }
    }
}

// ──────────────────── writer ────────────────────

/// Where lines currently go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Primary,
    Fallback,
    Stderr,
    Discard,
}

/// Append-only JSONL writer with size rotation and degradation.
pub struct ActivityLog {
    path: PathBuf,
    fallback_path: Option<PathBuf>,
    max_size_bytes: u64,
    max_rotated_files: u32,
    writer: Option<BufWriter<File>>,
    sink: Sink,
    bytes_written: u64,
}

impl ActivityLog {
    /// Open the log described by `cfg`, degrading as far as needed.
    pub fn open(cfg: &LoggingConfig) -> Self {
        let mut log = Self {
            path: cfg.jsonl_path.clone(),
            fallback_path: cfg.fallback_path.clone(),
            max_size_bytes: cfg.max_size_bytes,
            max_rotated_files: cfg.max_rotated_files.max(1),
            writer: None,
            sink: Sink::Discard,
            bytes_written: 0,
        };
        let primary = log.path.clone();
        if !log.attach(&primary, Sink::Primary) {
            log.fall_back();
        }
        log
    }

    /// Append one entry as a single line.
    pub fn append(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.emit(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[OPS-JSONL] serialize error: {e}");
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    #[must_use]
    pub const fn sink(&self) -> Sink {
        self.sink
    }

    /// Bytes in the current file (0 when not writing to a file).
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    // ──────────────────────── internals ────────────────────────

    fn emit(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.writer.is_some() && self.bytes_written + len > self.max_size_bytes {
            self.rotate();
        }

        match self.sink {
            Sink::Primary | Sink::Fallback => {
                let ok = self
                    .writer
                    .as_mut()
                    .is_some_and(|w| w.write_all(line.as_bytes()).is_ok());
                if ok {
                    self.bytes_written += len;
                } else {
                    self.degrade();
                    self.emit(line);
                }
            }
            Sink::Stderr => {
                let _ = write!(io::stderr(), "[OPS-JSONL] {line}");
            }
            Sink::Discard => {}
        }
    }

    /// Point the writer at `path`. Returns false if it cannot be opened.
    fn attach(&mut self, path: &Path, sink: Sink) -> bool {
        match open_append(path) {
            Ok((file, size)) => {
                self.writer = Some(BufWriter::new(file));
                self.sink = sink;
                self.bytes_written = size;
                true
            }
            Err(_) => false,
        }
    }

    fn fall_back(&mut self) {
        self.writer = None;
        let fallback = self.fallback_path.clone();
        match fallback {
            Some(fb) if self.attach(&fb, Sink::Fallback) => {
                let _ = writeln!(
                    io::stderr(),
                    "[OPS-JSONL] primary path failed, using fallback: {}",
                    fb.display()
                );
            }
            _ => {
                self.sink = Sink::Stderr;
                let _ = writeln!(io::stderr(), "[OPS-JSONL] no writable log file, using stderr");
            }
        }
    }

    fn degrade(&mut self) {
        match self.sink {
            Sink::Primary => self.fall_back(),
            Sink::Fallback => {
                self.writer = None;
                self.sink = Sink::Stderr;
                let _ = writeln!(io::stderr(), "[OPS-JSONL] fallback write failed, using stderr");
            }
            Sink::Stderr | Sink::Discard => {
                self.writer = None;
                self.sink = Sink::Discard;
            }
        }
    }

    /// `log.jsonl` → `log.jsonl.1` → ... → `log.jsonl.N` (oldest dropped).
    fn rotate(&mut self) {
        self.flush();
        self.writer = None;
        let base = match self.sink {
            Sink::Primary => self.path.clone(),
            Sink::Fallback => match &self.fallback_path {
                Some(p) => p.clone(),
                None => return,
            },
            Sink::Stderr | Sink::Discard => return,
        };

        let _ = fs::remove_file(rotated_name(&base, self.max_rotated_files));
        for index in (1..self.max_rotated_files).rev() {
            let _ = fs::rename(rotated_name(&base, index), rotated_name(&base, index + 1));
        }
        let _ = fs::rename(&base, rotated_name(&base, 1));

        let sink = self.sink;
        if !self.attach(&base, sink) {
            self.degrade();
        }
    }
}

impl Drop for ActivityLog {
    fn drop(&mut self) {
        self.flush();
    }
}

fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| OpsError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| OpsError::io(path, source))?;
    let size = file.metadata().map_or(0, |m| m.len());
    Ok((file, size))
}

fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}
