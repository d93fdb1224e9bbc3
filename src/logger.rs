use crate::context::Context;
use crate::handler::{HandleError, Handler};
use crate::level::Level;
use crate::record::{Record, Source};
use crate::value::Attribute;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Caller-facing logging handle.
///
/// Cloning is cheap. [`Logger::with`] and [`Logger::with_group`] return new
/// loggers; the parent keeps emitting exactly what it did before.
#[derive(Clone)]
pub struct Logger {
    handler: Arc<dyn Handler>,
}

impl Logger {
    pub fn new(handler: impl Handler + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn from_handler(handler: Arc<dyn Handler>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn with(&self, attrs: impl IntoIterator<Item = Attribute>) -> Logger {
        let attrs: Vec<Attribute> = attrs.into_iter().collect();
        if attrs.is_empty() {
            return self.clone();
        }
        Logger {
            handler: self.handler.with_attrs(attrs),
        }
    }

    pub fn with_group(&self, name: &str) -> Logger {
        if name.is_empty() {
            return self.clone();
        }
        Logger {
            handler: self.handler.with_group(name),
        }
    }

    pub fn enabled(&self, ctx: &Context, level: Level) -> bool {
        self.handler.enabled(ctx, level)
    }

    /// Builds a [`Record`] stamped with the caller's location and hands it to
    /// the handler. Disabled levels return `Ok(())` without building anything.
    #[track_caller]
    pub fn log(
        &self,
        ctx: &Context,
        level: Level,
        message: impl Into<String>,
        attrs: impl IntoIterator<Item = Attribute>,
    ) -> Result<(), HandleError> {
        if !self.enabled(ctx, level) {
            return Ok(());
        }
        let record = Record::new(level, message)
            .with_source(Source::from(Location::caller()))
            .with_attrs(attrs);
        self.handler.handle(ctx, record)
    }

    #[track_caller]
    pub fn debug(
        &self,
        ctx: &Context,
        message: impl Into<String>,
        attrs: impl IntoIterator<Item = Attribute>,
    ) -> Result<(), HandleError> {
        self.log(ctx, Level::Debug, message, attrs)
    }

    #[track_caller]
    pub fn info(
        &self,
        ctx: &Context,
        message: impl Into<String>,
        attrs: impl IntoIterator<Item = Attribute>,
    ) -> Result<(), HandleError> {
        self.log(ctx, Level::Info, message, attrs)
    }

    #[track_caller]
    pub fn warn(
        &self,
        ctx: &Context,
        message: impl Into<String>,
        attrs: impl IntoIterator<Item = Attribute>,
    ) -> Result<(), HandleError> {
        self.log(ctx, Level::Warn, message, attrs)
    }

    #[track_caller]
    pub fn error(
        &self,
        ctx: &Context,
        message: impl Into<String>,
        attrs: impl IntoIterator<Item = Attribute>,
    ) -> Result<(), HandleError> {
        self.log(ctx, Level::Error, message, attrs)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

/// Logs through the logger bound in `ctx`. Without one this does nothing.
#[track_caller]
pub fn log(
    ctx: &Context,
    level: Level,
    message: impl Into<String>,
    attrs: impl IntoIterator<Item = Attribute>,
) -> Result<(), HandleError> {
    match ctx.logger() {
        Some(logger) => logger.log(ctx, level, message, attrs),
        None => Ok(()),
    }
}

#[track_caller]
pub fn debug(
    ctx: &Context,
    message: impl Into<String>,
    attrs: impl IntoIterator<Item = Attribute>,
) -> Result<(), HandleError> {
    log(ctx, Level::Debug, message, attrs)
}

#[track_caller]
pub fn info(
    ctx: &Context,
    message: impl Into<String>,
    attrs: impl IntoIterator<Item = Attribute>,
) -> Result<(), HandleError> {
    log(ctx, Level::Info, message, attrs)
}

#[track_caller]
pub fn warn(
    ctx: &Context,
    message: impl Into<String>,
    attrs: impl IntoIterator<Item = Attribute>,
) -> Result<(), HandleError> {
    log(ctx, Level::Warn, message, attrs)
}

#[track_caller]
pub fn error(
    ctx: &Context,
    message: impl Into<String>,
    attrs: impl IntoIterator<Item = Attribute>,
) -> Result<(), HandleError> {
    log(ctx, Level::Error, message, attrs)
}
