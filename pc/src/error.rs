//! Catalog error types
//!
//! Every failure in the crate is a single [`CatalogError`] tagged with an
//! [`ErrorKind`]. The kind decides the [`Severity`], and the severity decides
//! which `tracing` level the error is reported at.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, CatalogError>;

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The mandatory built-in root (or one of its category dirs) cannot be read
    MissingRoot,
    /// A strategy document failed schema validation
    InvalidDocument,
    /// A category metadata file failed schema validation
    InvalidMetadata,
    /// Filesystem error outside the mandatory root
    Io,
    /// Malformed JSON or YAML
    Parse,
    CollectionExists,
    CollectionNotFound,
    /// Collection key does not match the allowed key format
    InvalidKey,
    /// Writing the collection registry failed
    Persistence,
    /// The filesystem watch subscription could not be set up
    Watch,
}

/// How bad an error is, used to pick the log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

const SEVERITY_TABLE: &[(ErrorKind, Severity)] = &[
    (ErrorKind::MissingRoot, Severity::Critical),
    (ErrorKind::InvalidDocument, Severity::Medium),
    (ErrorKind::InvalidMetadata, Severity::Medium),
    (ErrorKind::Io, Severity::Medium),
    (ErrorKind::Parse, Severity::Medium),
    (ErrorKind::CollectionExists, Severity::Low),
    (ErrorKind::CollectionNotFound, Severity::Low),
    (ErrorKind::InvalidKey, Severity::Low),
    (ErrorKind::Persistence, Severity::High),
    (ErrorKind::Watch, Severity::High),
];

impl ErrorKind {
    /// Severity for this kind, from the static lookup table
    pub fn severity(self) -> Severity {
        SEVERITY_TABLE
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, severity)| *severity)
            .unwrap_or(Severity::Medium)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingRoot => "missing_root",
            ErrorKind::InvalidDocument => "invalid_document",
            ErrorKind::InvalidMetadata => "invalid_metadata",
            ErrorKind::Io => "io",
            ErrorKind::Parse => "parse",
            ErrorKind::CollectionExists => "collection_exists",
            ErrorKind::CollectionNotFound => "collection_not_found",
            ErrorKind::InvalidKey => "invalid_key",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Watch => "watch",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged catalog error with a structured context payload
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct CatalogError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: BTreeMap<String, String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CatalogError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: BTreeMap::new(),
            source: None,
        }
    }

    /// Attach a context field
    pub fn with(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.context.insert(key.to_string(), value.to_string());
        self
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn missing_root(path: &Path, source: std::io::Error) -> Self {
        Self::new(
            ErrorKind::MissingRoot,
            format!("Strategies directory not readable: {}: {}", path.display(), source),
        )
        .with("path", path.display())
        .with_source(source)
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, format!("{}: {}", path.display(), source))
            .with("path", path.display())
            .with_source(source)
    }

    pub fn parse(path: &Path, source: serde_json::Error) -> Self {
        Self::new(ErrorKind::Parse, format!("Invalid JSON in {}: {}", path.display(), source))
            .with("path", path.display())
            .with_source(source)
    }

    pub fn collection_not_found(key: &str) -> Self {
        Self::new(ErrorKind::CollectionNotFound, format!("Collection '{}' not found", key)).with("collection", key)
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// True when the owning process cannot continue
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Critical
    }

    /// Report this error through `tracing` at the level its severity maps to
    pub fn log(&self) {
        let log_fn = LOG_TABLE
            .iter()
            .find(|(severity, _)| *severity == self.severity())
            .map(|(_, f)| *f)
            .unwrap_or(log_medium);
        log_fn(self);
    }
}

type LogFn = fn(&CatalogError);

const LOG_TABLE: &[(Severity, LogFn)] = &[
    (Severity::Critical, log_critical),
    (Severity::High, log_high),
    (Severity::Medium, log_medium),
    (Severity::Low, log_low),
];

fn log_critical(e: &CatalogError) {
    error!(kind = %e.kind, context = ?e.context, "CRITICAL: {}", e.message);
}

fn log_high(e: &CatalogError) {
    error!(kind = %e.kind, context = ?e.context, "{}", e.message);
}

fn log_medium(e: &CatalogError) {
    warn!(kind = %e.kind, context = ?e.context, "{}", e.message);
}

fn log_low(e: &CatalogError) {
    info!(kind = %e.kind, context = ?e.context, "{}", e.message);
}
