use crate::data::DataHandler;
use crate::dispatch::DispatchHandler;
use crate::env::{
    env_or, LOG_SCOPE_LEVELS_ENV, LOG_SCOPE_SEPARATOR_ENV, LOG_SCOPE_SERVICE_NAME_ENV,
    LOG_SCOPE_STDOUT_ENV,
};
use crate::handler::Handler;
use crate::layer::HandlerLayer;
use crate::level::{Level, ParseLevelError};
use crate::logger::Logger;
use crate::sink::LogSink;
use crate::tee::TeeHandler;
use crate::tracing_bridge::TracingHandler;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the dispatch pipeline.
///
/// **Fields**
/// - `channel_buffer`: records queued before new ones are dropped.
/// - `batch_size`: records handed to the sink per batch.
/// - `flush_interval`: longest wait before a partial batch is sent.
/// - `max_attempts`: deliveries tried per batch before it is discarded.
/// - `enabled_levels`: levels forwarded to the sink.
/// - `separator`: joins group names and keys into field names.
/// - `service_name`: copied onto every record when set.
/// - `enable_stdout`: also echo records through a `tracing` fmt layer.
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_attempts: u32,
    pub enabled_levels: Vec<Level>,
    pub separator: String,
    pub service_name: Option<String>,
    pub enable_stdout: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            max_attempts: 8,
            enabled_levels: vec![Level::Warn, Level::Error],
            separator: ".".to_string(),
            service_name: None,
            enable_stdout: true,
        }
    }
}

/// Error returned while building configuration or installing the subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid level in LOG_SCOPE_LEVELS: {0}")]
    Level(#[from] ParseLevelError),

    #[error("failed to install global tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

impl DispatchConfig {
    /// Defaults overridden by the `LOG_SCOPE_*` environment variables.
    ///
    /// `LOG_SCOPE_LEVELS` is a comma separated list such as `warn,error`.
    pub fn from_env() -> Result<Self, InitError> {
        let defaults = Self::default();

        let levels = env_or(LOG_SCOPE_LEVELS_ENV, "");
        let enabled_levels = if levels.trim().is_empty() {
            defaults.enabled_levels
        } else {
            levels
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect::<Result<Vec<Level>, _>>()?
        };

        let service_name = env_or(LOG_SCOPE_SERVICE_NAME_ENV, "");
        let enable_stdout = env_or(LOG_SCOPE_STDOUT_ENV, "true");

        Ok(Self {
            enabled_levels,
            separator: env_or(LOG_SCOPE_SEPARATOR_ENV, &defaults.separator),
            service_name: (!service_name.is_empty()).then_some(service_name),
            enable_stdout: !matches!(enable_stdout.trim(), "0" | "false" | "no" | "off"),
            ..defaults
        })
    }

    // Enforce minimal thresholds to avoid degenerate configs.
    pub(crate) fn clamped(mut self) -> Self {
        self.channel_buffer = self.channel_buffer.max(16);
        self.batch_size = self.batch_size.max(1);
        self.max_attempts = self.max_attempts.max(1);
        if self.flush_interval < Duration::from_millis(10) {
            self.flush_interval = Duration::from_millis(10);
        }
        self
    }
}

/// Build a [`Logger`] that forwards records to `sink`.
///
/// The logger honours context attributes ([`DataHandler`]) and, with
/// `enable_stdout`, also re-emits every record through `tracing`
/// ([`TracingHandler`]). Must be called inside a Tokio runtime.
pub fn init_logger(sink: Arc<dyn LogSink>, config: &DispatchConfig) -> (Logger, JoinHandle<()>) {
    let (dispatch, handle) = DispatchHandler::new(sink, config);

    let handler: Arc<dyn Handler> = if config.enable_stdout {
        Arc::new(TeeHandler::new([
            Arc::new(dispatch) as Arc<dyn Handler>,
            Arc::new(TracingHandler::new().with_separator(config.separator.clone()))
                as Arc<dyn Handler>,
        ]))
    } else {
        Arc::new(dispatch)
    };

    (Logger::new(DataHandler::wrap(handler)), handle)
}

/// Install a global `tracing` subscriber whose events are routed into a
/// dispatching [`Logger`] built from `sink` and `config`.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`HandlerLayer`] and, when
/// `enable_stdout` is set, a `fmt` layer, so every `tracing` event in the
/// process reaches the sink. Returns the logger for direct use together
/// with the background task handle.
pub fn init_tracing_with_config(
    sink: Arc<dyn LogSink>,
    config: DispatchConfig,
) -> Result<(Logger, JoinHandle<()>), InitError> {
    // The fmt layer already echoes tracing events, so the logger itself must
    // not re-emit them through tracing.
    let logger_config = DispatchConfig {
        enable_stdout: false,
        ..config.clone()
    };
    let (logger, handle) = init_logger(sink, &logger_config);
    let layer = HandlerLayer::new(logger.clone());

    if config.enable_stdout {
        let subscriber = Registry::default()
            .with(layer)
            .with(tracing_subscriber::fmt::layer());
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok((logger, handle))
}

/// [`init_tracing_with_config`] with [`DispatchConfig::from_env`].
pub fn init_tracing(sink: Arc<dyn LogSink>) -> Result<(Logger, JoinHandle<()>), InitError> {
    init_tracing_with_config(sink, DispatchConfig::from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_degenerate_values() {
        let config = DispatchConfig {
            channel_buffer: 0,
            batch_size: 0,
            flush_interval: Duration::ZERO,
            max_attempts: 0,
            ..DispatchConfig::default()
        }
        .clamped();
        assert_eq!(config.channel_buffer, 16);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.flush_interval, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn init_logger_prefixes_context_attrs() {
        use crate::context::Context;
        use crate::record::LogRecord;
        use crate::value::Attribute;
        use async_trait::async_trait;
        use std::error::Error;
        use tokio::sync::Mutex;

        #[derive(Default)]
        struct Collecting(Mutex<Vec<LogRecord>>);

        #[async_trait]
        impl LogSink for Collecting {
            async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
                self.0.lock().await.push(record.clone());
                Ok(())
            }
        }

        let sink = Arc::new(Collecting::default());
        let config = DispatchConfig {
            enable_stdout: false,
            flush_interval: Duration::from_millis(10),
            ..DispatchConfig::default()
        };
        let (logger, task) = init_logger(sink.clone(), &config);
        let ctx = Context::background().with_attrs([Attribute::string("author", "ops")]);
        logger
            .with_group("auth")
            .error(&ctx, "denied", [Attribute::int("user_id", 42)])
            .unwrap();
        logger.info(&ctx, "not forwarded", []).unwrap();
        drop(logger);
        task.await.unwrap();

        let records = sink.0.lock().await;
        assert_eq!(records.len(), 1);
        let keys: Vec<&str> = records[0].fields.keys().map(String::as_str).collect();
        assert_eq!(keys, ["auth.author", "auth.user_id"]);
        assert!(records[0].file.as_deref().is_some_and(|f| f.ends_with("init.rs")));
    }
}
