use crate::chain::{self, Chain};
use crate::context::Context;
use crate::level::Level;
use crate::record::Record;
use crate::value::Attribute;
use std::error::Error;
use std::ops::ControlFlow;
use std::sync::Arc;

/// Backend-facing half of a logger.
///
/// A handler is immutable: [`Handler::with_attrs`] and
/// [`Handler::with_group`] return new handlers and leave `self` untouched, so
/// one handler can be the parent of many scoped children across threads.
/// Implementations usually keep a [`Chain`] for these two calls and replay it
/// with [`Chain::apply`] inside [`Handler::handle`].
pub trait Handler: Send + Sync {
    /// Whether a record at `level` would be emitted at all.
    fn enabled(&self, ctx: &Context, level: Level) -> bool;

    /// Emit one record.
    ///
    /// **Returns**
    /// - `Ok(())` once the record was accepted by the backend.
    /// - `Err(..)` when the backend failed; callers decide whether to
    ///   surface or ignore it.
    fn handle(&self, ctx: &Context, record: Record) -> Result<(), HandleError>;

    fn with_attrs(&self, attrs: Vec<Attribute>) -> Arc<dyn Handler>;

    fn with_group(&self, name: &str) -> Arc<dyn Handler>;
}

/// Failure reported by a [`Handler`].
#[derive(thiserror::Error, Debug)]
pub enum HandleError {
    #[error("i/o error while writing record: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("log sink failed: {0}")]
    Sink(Box<dyn Error + Send + Sync>),

    #[error("dispatch channel is closed")]
    ChannelClosed,

    #[error("{} handlers failed", .0.len())]
    Multiple(Vec<HandleError>),
}

/// Joins a group path and a key with `separator`.
pub fn join_key(groups: &[String], key: &str, separator: &str) -> String {
    if groups.is_empty() {
        return key.to_string();
    }
    let mut joined = groups.join(separator);
    joined.push_str(separator);
    joined.push_str(key);
    joined
}

/// Replays `chain` and then the record's own attributes under the chain's
/// final group path, calling `visit` with the separator-joined key of every
/// leaf attribute.
pub fn for_each_field<F>(chain: &Chain, record: &Record, separator: &str, mut visit: F)
where
    F: FnMut(String, &Attribute),
{
    let groups = chain.apply(|groups, attr| {
        visit(join_key(groups, &attr.key, separator), attr);
        ControlFlow::Continue(())
    });
    chain::apply_attrs(&groups, record.attrs(), |groups, attr| {
        visit(join_key(groups, &attr.key, separator), attr);
        ControlFlow::Continue(())
    });
}

/// `key` when `fields` has no entry for it, otherwise the first free name of
/// `key#1`, `key#2`, ... so a repeated key never replaces an earlier value.
pub fn vacant_key(fields: &serde_json::Map<String, serde_json::Value>, key: String) -> String {
    if !fields.contains_key(&key) {
        return key;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{key}#{n}");
        if !fields.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
