use crate::context::Context as LogContext;
use crate::level::Level;
use crate::logger::Logger;
use crate::record::{Record, Source};
use crate::value::Attribute;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record as SpanRecord};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Events emitted by this crate itself are never routed back into a logger.
const SELF_TARGET: &str = "log_scope";

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(SELF_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// `tracing_subscriber` layer that turns events into [`Record`]s for a
/// [`Logger`].
///
/// Every span in the event's scope opens a group named after the span,
/// outermost first, carrying the span's own fields. Event fields become the
/// record's attributes and the `message` field its message.
#[derive(Clone, Debug)]
pub struct HandlerLayer {
    logger: Logger,
}

impl HandlerLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

/// Span fields kept in the span's extensions until an event needs them.
struct SpanFields(Vec<Attribute>);

impl<S> Layer<S> for HandlerLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.attrs));
    }

    fn on_record(&self, id: &Id, values: &SpanRecord<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => fields.0.extend(visitor.attrs),
            None => extensions.insert(SpanFields(visitor.attrs)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_own_target(meta.target()) {
            return;
        }

        let level = Level::from(*meta.level());
        let log_ctx = LogContext::background();
        if !self.logger.enabled(&log_ctx, level) {
            return;
        }

        let mut logger = self.logger.clone();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                logger = logger.with_group(span.name());
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    logger = logger.with(fields.0.iter().cloned());
                }
            }
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut record = Record::new(level, visitor.message.unwrap_or_default())
            .with_attrs(visitor.attrs);
        if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
            record = record.with_source(Source {
                file: file.to_string(),
                line,
                module_path: meta.module_path().map(str::to_string),
            });
        }

        if let Err(e) = logger.handler().handle(&log_ctx, record) {
            tracing::warn!(target: "log_scope::layer", error = %e, "log handler failed");
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    attrs: Vec<Attribute>,
    message: Option<String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.attrs.push(Attribute::string(field.name(), value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.attrs.push(Attribute::int(field.name(), value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.attrs.push(Attribute::uint(field.name(), value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.attrs.push(Attribute::float(field.name(), value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.attrs.push(Attribute::boolean(field.name(), value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.attrs.push(Attribute::string(field.name(), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.attrs.push(Attribute::string(field.name(), format!("{value:?}")));
        }
    }
}
