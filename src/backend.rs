use std::path::PathBuf;
use std::sync::Arc;

use crate::env::{env_or, LOG_SCOPE_DSN_ENV};
use crate::sink::{LogSink, NoopSink, WriterSink};

/// Supported sink kinds that can be selected via DSN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Noop,
    Stdout,
    Stderr,
    File(PathBuf),
}

/// Backend selection parsed from a DSN string.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Selected sink implementation.
    pub kind: BackendKind,
    /// Raw DSN that was used to construct this config.
    pub dsn: String,
}

impl BackendConfig {
    pub fn new(kind: BackendKind, dsn: impl Into<String>) -> Self {
        BackendConfig {
            kind,
            dsn: dsn.into(),
        }
    }

    /// Parse `LOG_SCOPE_DSN`, defaulting to `stdout://`.
    pub fn from_env() -> Result<Self, DsnError> {
        parse_dsn(&env_or(LOG_SCOPE_DSN_ENV, "stdout://"))
    }
}

/// Parse a DSN string and infer the sink kind from its scheme.
///
/// Examples:
/// - "noop://"
/// - "stdout://"
/// - "stderr://"
/// - "file:///var/log/app.jsonl"
pub fn parse_dsn(dsn: &str) -> Result<BackendConfig, DsnError> {
    let trimmed = dsn.trim();
    let Some((scheme, rest)) = trimmed.split_once("://") else {
        return Err(DsnError::UnknownScheme(trimmed.to_string()));
    };

    let kind = match scheme.to_ascii_lowercase().as_str() {
        "noop" => BackendKind::Noop,
        "stdout" => BackendKind::Stdout,
        "stderr" => BackendKind::Stderr,
        "file" if rest.is_empty() => return Err(DsnError::MissingPath),
        "file" => BackendKind::File(PathBuf::from(rest)),
        _ => return Err(DsnError::UnknownScheme(scheme.to_string())),
    };
    Ok(BackendConfig::new(kind, trimmed))
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DsnError {
    #[error("unknown or unsupported DSN scheme: {0:?}")]
    UnknownScheme(String),

    #[error("file DSN needs a path, e.g. file:///var/log/app.jsonl")]
    MissingPath,
}

/// Error type returned when building a sink from configuration.
#[derive(thiserror::Error, Debug)]
pub enum BackendBuildError {
    #[error("failed to open log file: {0}")]
    Io(#[from] std::io::Error),
}

/// Create a concrete [`LogSink`] from a [`BackendConfig`].
///
/// This is the main entry point for applications that select a sink with a
/// single DSN string instead of constructing one manually.
pub async fn make_sink_from_config(
    cfg: &BackendConfig,
) -> Result<Arc<dyn LogSink>, BackendBuildError> {
    let sink: Arc<dyn LogSink> = match &cfg.kind {
        BackendKind::Noop => Arc::new(NoopSink),
        BackendKind::Stdout => Arc::new(WriterSink::stdout()),
        BackendKind::Stderr => Arc::new(WriterSink::stderr()),
        BackendKind::File(path) => Arc::new(WriterSink::open(path).await?),
    };
    Ok(sink)
}
