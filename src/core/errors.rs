//! UIA-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, UiError>;

/// Top-level error type for the UI arbiter.
#[derive(Debug, Error)]
pub enum UiError {
    #[error("[UIA-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[UIA-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[UIA-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[UIA-2001] unknown screen kind: {kind}")]
    UnknownScreen { kind: String },

    #[error("[UIA-2002] duplicate registration of {what} '{name}'")]
    DuplicateRegistration { what: &'static str, name: String },

    #[error("[UIA-2003] invalid settings snapshot: {details}")]
    InvalidSnapshot { details: String },

    #[error("[UIA-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[UIA-3001] storage failure for key '{key}': {details}")]
    Storage { key: String, details: String },

    #[error("[UIA-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[UIA-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[UIA-3101] scene load failed for '{scene}': {details}")]
    SceneLoad { scene: String, details: String },

    #[error("[UIA-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl UiError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "UIA-1001",
            Self::MissingConfig { .. } => "UIA-1002",
            Self::ConfigParse { .. } => "UIA-1003",
            Self::UnknownScreen { .. } => "UIA-2001",
            Self::DuplicateRegistration { .. } => "UIA-2002",
            Self::InvalidSnapshot { .. } => "UIA-2003",
            Self::Serialization { .. } => "UIA-2101",
            Self::Storage { .. } => "UIA-3001",
            Self::Io { .. } => "UIA-3002",
            Self::ChannelClosed { .. } => "UIA-3003",
            Self::SceneLoad { .. } => "UIA-3101",
            Self::Runtime { .. } => "UIA-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::Storage { .. }
                | Self::ChannelClosed { .. }
                | Self::SceneLoad { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for UiError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for UiError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
