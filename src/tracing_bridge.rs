use crate::chain::Chain;
use crate::context::Context;
use crate::handler::{for_each_field, vacant_key, HandleError, Handler};
use crate::level::Level;
use crate::record::Record;
use crate::value::Attribute;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;

/// Re-emits records as `tracing` events.
///
/// `tracing` fields are declared statically, so the flattened attributes are
/// rendered into a single `fields` value holding a JSON object keyed by the
/// separator-joined group path.
#[derive(Clone)]
pub struct TracingHandler {
    chain: Chain,
    separator: String,
    min_level: Level,
}

impl Default for TracingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingHandler {
    pub fn new() -> Self {
        Self {
            chain: Chain::new(),
            separator: ".".to_string(),
            min_level: Level::Debug,
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// The flattened attributes of `record` as they appear in `fields`.
    pub fn fields(&self, record: &Record) -> serde_json::Map<String, serde_json::Value> {
        let mut fields = serde_json::Map::new();
        for_each_field(&self.chain, record, &self.separator, |key, attr| {
            let key = vacant_key(&fields, key);
            fields.insert(key, attr.value.to_json());
        });
        fields
    }
}

impl Handler for TracingHandler {
    fn enabled(&self, _ctx: &Context, level: Level) -> bool {
        level >= self.min_level && tracing::Level::from(level) <= LevelFilter::current()
    }

    fn handle(&self, _ctx: &Context, record: Record) -> Result<(), HandleError> {
        let fields = serde_json::Value::Object(self.fields(&record)).to_string();
        let message = record.message.as_str();
        let (file, line) = match &record.source {
            Some(source) => (source.file.as_str(), source.line),
            None => ("", 0),
        };

        match record.level {
            Level::Debug => tracing::debug!(fields = %fields, file, line, "{message}"),
            Level::Info => tracing::info!(fields = %fields, file, line, "{message}"),
            Level::Warn => tracing::warn!(fields = %fields, file, line, "{message}"),
            Level::Error => tracing::error!(fields = %fields, file, line, "{message}"),
        }
        Ok(())
    }

    fn with_attrs(&self, attrs: Vec<Attribute>) -> Arc<dyn Handler> {
        Arc::new(Self {
            chain: self.chain.with_attrs(attrs),
            ..self.clone()
        })
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        Arc::new(Self {
            chain: self.chain.with_group(name),
            ..self.clone()
        })
    }
}
