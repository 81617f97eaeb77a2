//! OPS-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, OpsError>;

/// Top-level error type for opsdeck.
#[derive(Debug, Error)]
pub enum OpsError {
    #[error("[OPS-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[OPS-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[OPS-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[OPS-2001] invalid metric definition {id}: {details}")]
    InvalidMetricDefinition { id: String, details: String },

    #[error("[OPS-2002] duplicate metric id in catalog: {id}")]
    DuplicateMetric { id: String },

    #[error("[OPS-2003] selection not present in snapshot: {id}")]
    UnknownSelection { id: String },

    #[error("[OPS-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[OPS-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OpsError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "OPS-1001",
            Self::MissingConfig { .. } => "OPS-1002",
            Self::ConfigParse { .. } => "OPS-1003",
            Self::InvalidMetricDefinition { .. } => "OPS-2001",
            Self::DuplicateMetric { .. } => "OPS-2002",
            Self::UnknownSelection { .. } => "OPS-2003",
            Self::Serialization { .. } => "OPS-2101",
            Self::Io { .. } => "OPS-3002",
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for catalog validation findings.
    #[must_use]
    pub fn invalid_metric(id: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidMetricDefinition {
            id: id.into(),
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for OpsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for OpsError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_variant() -> Vec<OpsError> {
        vec![
            OpsError::InvalidConfig {
                details: String::new(),
            },
            OpsError::MissingConfig {
                path: PathBuf::new(),
            },
            OpsError::ConfigParse {
                context: "",
                details: String::new(),
            },
            OpsError::invalid_metric("", ""),
            OpsError::DuplicateMetric { id: String::new() },
            OpsError::UnknownSelection { id: String::new() },
            OpsError::Serialization {
                context: "",
                details: String::new(),
            },
            OpsError::io("", std::io::Error::other("test")),
        ]
    }

    #[test]
    fn error_codes_are_unique_and_prefixed() {
        let codes: Vec<&str> = every_variant().iter().map(OpsError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(codes.len(), unique.len(), "duplicate codes: {codes:?}");
        for code in codes {
            assert!(code.starts_with("OPS-"), "code {code} must start with OPS-");
        }
    }

    #[test]
    fn display_includes_code_and_details() {
        let err = OpsError::invalid_metric("bhs", "uptime 130 outside [0, 100]");
        let msg = err.to_string();
        assert!(msg.contains("OPS-2001"), "{msg}");
        assert!(msg.contains("bhs"), "{msg}");
        assert!(msg.contains("outside"), "{msg}");
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: OpsError = json_err.into();
        assert_eq!(err.code(), "OPS-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: OpsError = toml_err.into();
        assert_eq!(err.code(), "OPS-1003");
    }
}
