//! Request-scoped context: an append-only attribute list plus an optional
//! bound [`Logger`].
//!
//! Context attributes are independent of any handler's chain. Sinks that
//! honour them (see [`crate::data::DataHandler`]) place them ahead of the
//! attributes passed to an individual log call.

use crate::logger::Logger;
use crate::value::Attribute;
use std::fmt;
use std::sync::Arc;

/// Immutable, cheap-to-clone request context.
///
/// Every `with_*` call returns a new context; bound attribute lists are shared
/// and never modified, so one context can parent many derived ones.
#[derive(Clone, Default)]
pub struct Context {
    attrs: Option<Arc<[Attribute]>>,
    logger: Option<Logger>,
}

impl Context {
    /// An empty context with nothing bound.
    pub fn background() -> Self {
        Self::default()
    }

    /// Context whose attribute list is the current one followed by `attrs`.
    ///
    /// Empty `attrs` returns a clone of `self`.
    pub fn with_attrs(&self, attrs: impl IntoIterator<Item = Attribute>) -> Context {
        let attrs: Vec<Attribute> = attrs.into_iter().collect();
        if attrs.is_empty() {
            return self.clone();
        }
        let merged: Arc<[Attribute]> = match &self.attrs {
            Some(existing) => existing.iter().cloned().chain(attrs).collect(),
            None => attrs.into(),
        };
        Context {
            attrs: Some(merged),
            logger: self.logger.clone(),
        }
    }

    /// The bound attribute list, empty when none was bound.
    pub fn attrs(&self) -> &[Attribute] {
        self.attrs.as_deref().unwrap_or(&[])
    }

    /// This context with `src`'s bound attributes appended, leaving the rest
    /// of `src` behind.
    pub fn transfer_attrs(&self, src: &Context) -> Context {
        self.with_attrs(src.attrs().iter().cloned())
    }

    pub fn with_logger(&self, logger: Logger) -> Context {
        Context {
            attrs: self.attrs.clone(),
            logger: Some(logger),
        }
    }

    pub fn logger(&self) -> Option<&Logger> {
        self.logger.as_ref()
    }

    /// This context with `src`'s logger bound, if it has one.
    pub fn transfer_logger(&self, src: &Context) -> Context {
        match src.logger() {
            Some(logger) => self.with_logger(logger.clone()),
            None => self.clone(),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("attrs", &self.attrs())
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

/// [`Context::with_attrs`] for an optional context; `None` stays `None`.
pub fn with_attrs(
    ctx: Option<&Context>,
    attrs: impl IntoIterator<Item = Attribute>,
) -> Option<Context> {
    ctx.map(|ctx| ctx.with_attrs(attrs))
}

/// [`Context::attrs`] for an optional context.
pub fn attrs_of(ctx: Option<&Context>) -> &[Attribute] {
    ctx.map(Context::attrs).unwrap_or(&[])
}
