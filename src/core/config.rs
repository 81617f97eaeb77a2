//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{OpsError, Result};
use crate::model::mode::ModeState;

/// Full opsdeck configuration model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Posture the controller starts in.
    pub modes: ModeState,
    pub logging: LoggingConfig,
    pub projection: ProjectionConfig,
    pub paths: PathsConfig,
}

/// Activity log (JSONL) settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub jsonl_path: PathBuf,
    /// Used when the primary path cannot be opened or written.
    pub fallback_path: Option<PathBuf>,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
}

/// Detail-view projection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Assets listed on every detail view without an override.
    pub related_assets: Vec<String>,
    /// Per-item asset lists keyed by metric id.
    pub overrides: BTreeMap<String, Vec<String>>,
}

/// Filesystem paths used by opsdeck.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jsonl_path: data_dir().join("activity.jsonl"),
            fallback_path: Some(PathBuf::from("/dev/shm/opsdeck.jsonl")),
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 5,
        }
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            related_assets: ["Terminal A", "Terminal B", "Control Tower", "Runway 09L/27R"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            overrides: BTreeMap::new(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_file: home_dir().join(".config").join("opsdeck").join("config.toml"),
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[OPS-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("opsdeck")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| OpsError::Io {
                path: path_buf.clone(),
                source,
            })?;
            toml::from_str::<Self>(&raw)?
        } else if path.is_some() {
            return Err(OpsError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over the canonical JSON encoding, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        for (name, slot) in [
            ("OPSDECK_MODES_EMERGENCY", &mut self.modes.emergency),
            ("OPSDECK_MODES_OPERATIONS_ALERT", &mut self.modes.operations_alert),
            ("OPSDECK_MODES_SYSTEM_OPTIMIZED", &mut self.modes.system_optimized),
            ("OPSDECK_LOGGING_ENABLED", &mut self.logging.enabled),
        ] {
            if let Some(raw) = lookup(name) {
                *slot = parse_env(name, &raw)?;
            }
        }

        if let Some(raw) = lookup("OPSDECK_LOGGING_JSONL_PATH") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("OPSDECK_LOGGING_MAX_SIZE_BYTES") {
            self.logging.max_size_bytes = parse_env("OPSDECK_LOGGING_MAX_SIZE_BYTES", &raw)?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.logging.max_size_bytes < 1024 {
            return Err(OpsError::InvalidConfig {
                details: format!(
                    "logging.max_size_bytes must be >= 1024, got {}",
                    self.logging.max_size_bytes
                ),
            });
        }
        if self.logging.max_rotated_files == 0 {
            return Err(OpsError::InvalidConfig {
                details: "logging.max_rotated_files must be >= 1".to_string(),
            });
        }

        let blank = |assets: &[String]| assets.iter().any(|a| a.trim().is_empty());
        if blank(&self.projection.related_assets) {
            return Err(OpsError::InvalidConfig {
                details: "projection.related_assets must not contain blank names".to_string(),
            });
        }
        for (id, assets) in &self.projection.overrides {
            if blank(assets) {
                return Err(OpsError::InvalidConfig {
                    details: format!("projection.overrides.{id} must not contain blank names"),
                });
            }
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| OpsError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{Config, OpsError};
    use crate::model::mode::ModeState;
    use std::collections::HashMap;
    use std::path::Path;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.modes, ModeState::NOMINAL);
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let err = Config::load(Some(Path::new("/nonexistent/opsdeck/config.toml"))).unwrap_err();
        assert!(matches!(err, OpsError::MissingConfig { .. }));
    }

    #[test]
    fn load_reads_toml_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[modes]
operations_alert = true

[logging]
enabled = false
max_rotated_files = 2

[projection]
related_assets = ["Pier C"]

[projection.overrides]
bhs = ["Baggage Hall", "Sorter Line 3"]
"#,
        )
        .unwrap();

        let cfg = Config::load(Some(&path)).expect("config should load");
        assert_eq!(cfg.modes, ModeState::new(false, true, false));
        assert!(!cfg.logging.enabled);
        assert_eq!(cfg.logging.max_rotated_files, 2);
        assert_eq!(cfg.projection.related_assets, vec!["Pier C".to_string()]);
        assert_eq!(cfg.projection.overrides["bhs"].len(), 2);
        assert_eq!(cfg.paths.config_file, path);
    }

    #[test]
    fn load_surfaces_toml_errors_as_config_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[modes\nemergency = ").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert_eq!(err.code(), "OPS-1003");
    }

    #[test]
    fn env_overrides_set_modes_and_logging() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("OPSDECK_MODES_EMERGENCY", "true"),
            ("OPSDECK_MODES_SYSTEM_OPTIMIZED", " true "),
            ("OPSDECK_LOGGING_ENABLED", "false"),
            ("OPSDECK_LOGGING_JSONL_PATH", "/tmp/opsdeck/custom.jsonl"),
            ("OPSDECK_LOGGING_MAX_SIZE_BYTES", "4096"),
        ]);

        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("env overrides should parse");

        assert_eq!(cfg.modes, ModeState::new(true, false, true));
        assert!(!cfg.logging.enabled);
        assert_eq!(
            cfg.logging.jsonl_path,
            std::path::PathBuf::from("/tmp/opsdeck/custom.jsonl")
        );
        assert_eq!(cfg.logging.max_size_bytes, 4096);
    }

    #[test]
    fn env_invalid_boolean_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("OPSDECK_MODES_OPERATIONS_ALERT", "yes-please")]);

        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid bool should fail");
        match err {
            OpsError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("OPSDECK_MODES_OPERATIONS_ALERT"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tiny_log_size_rejected() {
        let mut cfg = Config::default();
        cfg.logging.max_size_bytes = 100;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("max_size_bytes"));
    }

    #[test]
    fn zero_rotations_rejected() {
        let mut cfg = Config::default();
        cfg.logging.max_rotated_files = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn blank_related_asset_rejected() {
        let mut cfg = Config::default();
        cfg.projection
            .overrides
            .insert("bhs".to_string(), vec!["  ".to_string()]);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("overrides.bhs"));
    }

    #[test]
    fn stable_hash_deterministic_and_sensitive() {
        let cfg = Config::default();
        assert_eq!(cfg.stable_hash().unwrap(), cfg.stable_hash().unwrap());
        let mut modified = Config::default();
        modified.modes.emergency = true;
        assert_ne!(cfg.stable_hash().unwrap(), modified.stable_hash().unwrap());
    }
}
