//! Environment variable names read by [`crate::init`] and
//! [`crate::backend`].
//!
//! These are conveniences only; every handler and sink can be configured
//! without touching the environment.

/// Sink DSN, e.g. `stdout://` or `file:///var/log/app.jsonl`.
pub const LOG_SCOPE_DSN_ENV: &str = "LOG_SCOPE_DSN";

/// Comma separated levels forwarded by the dispatcher, e.g. `warn,error`.
pub const LOG_SCOPE_LEVELS_ENV: &str = "LOG_SCOPE_LEVELS";

/// Separator joining group names and keys into field names.
pub const LOG_SCOPE_SEPARATOR_ENV: &str = "LOG_SCOPE_SEPARATOR";

/// Optional logical service name stamped on every record.
pub const LOG_SCOPE_SERVICE_NAME_ENV: &str = "LOG_SCOPE_SERVICE_NAME";

/// `false`/`0`/`off` disables echoing records to stdout.
pub const LOG_SCOPE_STDOUT_ENV: &str = "LOG_SCOPE_STDOUT";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
