//! Errors carried as attributes.
//!
//! An [`ErrorReport`] attached under the key [`ERROR_KEY`] is lifted out of
//! the flattened fields by [`DispatchHandler`](crate::dispatch::DispatchHandler)
//! and sent as the record's structured [`Exception`].

use crate::value::Attribute;
use serde::Serialize;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Key under which [`ErrorReport::attr`] stores the report.
pub const ERROR_KEY: &str = "error";

/// An error together with its type name and, optionally, the stack trace at
/// the point it was reported.
#[derive(Clone)]
pub struct ErrorReport {
    type_name: String,
    message: String,
    source: Option<Arc<dyn Error + Send + Sync>>,
    backtrace: Option<Arc<Backtrace>>,
}

impl ErrorReport {
    /// Wraps an existing error, keeping it as the report's source.
    pub fn new<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            type_name: std::any::type_name::<E>().to_string(),
            message: err.to_string(),
            source: Some(Arc::new(err)),
            backtrace: None,
        }
    }

    /// A report with no underlying error value, e.g. built with `format!`.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            type_name: "ErrorReport".to_string(),
            message: message.into(),
            source: None,
            backtrace: None,
        }
    }

    /// Captures the current stack trace regardless of `RUST_BACKTRACE`.
    pub fn with_backtrace(mut self) -> Self {
        self.backtrace = Some(Arc::new(Backtrace::force_capture()));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The captured stack trace, if one was requested and the platform
    /// supports it.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace
            .as_deref()
            .filter(|bt| bt.status() == BacktraceStatus::Captured)
    }

    /// This report as the `error` attribute.
    pub fn attr(self) -> Attribute {
        Attribute::any(ERROR_KEY, self)
    }

    pub fn to_exception(&self) -> Exception {
        Exception {
            type_name: self.type_name.clone(),
            value: self.message.clone(),
            stacktrace: self.backtrace().map(|bt| bt.to_string()),
        }
    }
}

impl fmt::Debug for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReport")
            .field("type", &self.type_name)
            .field("message", &self.message)
            .field("backtrace", &self.backtrace().is_some())
            .finish()
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ErrorReport {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn Error + 'static))
    }
}

/// Structured error sent alongside a [`LogRecord`](crate::record::LogRecord).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exception {
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}
