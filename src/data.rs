use crate::context::Context;
use crate::handler::{HandleError, Handler};
use crate::level::Level;
use crate::record::Record;
use crate::value::Attribute;
use std::sync::Arc;

/// Wraps a handler and prepends the attributes bound in the request
/// [`Context`] to every record before delegating.
///
/// Context attributes never join the inner handler's chain; they behave
/// exactly like attributes passed first to the log call.
#[derive(Clone)]
pub struct DataHandler {
    inner: Arc<dyn Handler>,
}

impl DataHandler {
    pub fn new(inner: impl Handler + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn wrap(inner: Arc<dyn Handler>) -> Self {
        Self { inner }
    }
}

impl Handler for DataHandler {
    fn enabled(&self, ctx: &Context, level: Level) -> bool {
        self.inner.enabled(ctx, level)
    }

    fn handle(&self, ctx: &Context, record: Record) -> Result<(), HandleError> {
        if ctx.attrs().is_empty() {
            return self.inner.handle(ctx, record);
        }
        self.inner.handle(ctx, record.with_prefix(ctx.attrs()))
    }

    fn with_attrs(&self, attrs: Vec<Attribute>) -> Arc<dyn Handler> {
        Arc::new(Self::wrap(self.inner.with_attrs(attrs)))
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        Arc::new(Self::wrap(self.inner.with_group(name)))
    }
}
