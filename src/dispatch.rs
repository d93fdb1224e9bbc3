use crate::chain::Chain;
use crate::context::Context;
use crate::handler::{for_each_field, vacant_key, HandleError, Handler};
use crate::init::DispatchConfig;
use crate::level::Level;
use crate::record::{LogRecord, Record};
use crate::report::{ErrorReport, ERROR_KEY};
use crate::sink::LogSink;
use crate::value::Attribute;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{debug, error, warn};

/// Counters shared by a dispatcher and every handler scoped from it.
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Records handed to [`Handler::handle`].
    pub total: AtomicU64,
    /// Records accepted into the channel.
    pub enqueued: AtomicU64,
    /// Records dropped because the channel was full.
    pub dropped: AtomicU64,
    /// Records delivered to the sink.
    pub sent: AtomicU64,
}

struct Settings {
    enabled_levels: Vec<Level>,
    separator: String,
    service_name: Option<String>,
}

/// Handler that flattens records into [`LogRecord`]s and forwards them to a
/// [`LogSink`] through a bounded channel and a background task.
///
/// The logging thread never waits on the sink: when the channel is full the
/// record is dropped and counted in [`DispatchStats::dropped`]. The
/// background task batches records, retries failed batches with exponential
/// backoff and drains what is left once every handler has been dropped.
#[derive(Clone)]
pub struct DispatchHandler {
    sender: mpsc::Sender<LogRecord>,
    chain: Chain,
    settings: Arc<Settings>,
    stats: Arc<DispatchStats>,
}

impl DispatchHandler {
    /// Create a handler and spawn the task that feeds `sink`.
    ///
    /// Must be called inside a Tokio runtime. The returned [`JoinHandle`]
    /// completes after the last handler clone is dropped and the remaining
    /// records were flushed.
    pub fn new(sink: Arc<dyn LogSink>, config: &DispatchConfig) -> (Self, JoinHandle<()>) {
        let config = config.clone().clamped();
        let (tx, mut rx) = mpsc::channel::<LogRecord>(config.channel_buffer);
        let stats = Arc::new(DispatchStats::default());

        let stats_bg = Arc::clone(&stats);
        let batch_size = config.batch_size;
        let flush_interval = config.flush_interval;
        let retry = Retry {
            backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            max_attempts: config.max_attempts,
        };

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            // One ticker for the whole task; a partial batch waits at most one
            // interval no matter how often records arrive.
            let mut ticker = interval(flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(record) => {
                            batch.push(record);
                            if batch.len() >= batch_size {
                                send_batch(&*sink, &mut batch, &retry, &stats_bg).await;
                            }
                        }
                        None => break,
                    },
                    _ = ticker.tick() => {
                        if !batch.is_empty() {
                            send_batch(&*sink, &mut batch, &retry, &stats_bg).await;
                        }
                    }
                }
            }

            if !batch.is_empty() {
                send_batch(&*sink, &mut batch, &retry, &stats_bg).await;
            }
            if let Err(e) = sink.flush().await {
                error!(error = %e, "error flushing log sink");
            }
            debug!("log dispatch task finished");
        });

        let settings = Settings {
            enabled_levels: config.enabled_levels,
            separator: config.separator,
            service_name: config.service_name,
        };

        (
            Self {
                sender: tx,
                chain: Chain::new(),
                settings: Arc::new(settings),
                stats,
            },
            handle,
        )
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    fn to_log_record(&self, record: Record) -> LogRecord {
        let mut fields = serde_json::Map::new();
        let mut exception = None;
        for_each_field(&self.chain, &record, &self.settings.separator, |key, attr| {
            if exception.is_none() && key == ERROR_KEY {
                if let Some(report) = attr.value.downcast_ref::<ErrorReport>() {
                    exception = Some(report.to_exception());
                    return;
                }
            }
            let key = vacant_key(&fields, key);
            fields.insert(key, attr.value.to_json());
        });

        let (file, line, module_path) = match record.source {
            Some(source) => (Some(source.file), Some(source.line), source.module_path),
            None => (None, None, None),
        };

        LogRecord {
            timestamp: record.time,
            level: record.level,
            message: record.message,
            target: None,
            module_path,
            file,
            line,
            fields,
            service_name: self.settings.service_name.clone(),
            exception,
        }
    }
}

struct Retry {
    backoff: Duration,
    max_backoff: Duration,
    max_attempts: u32,
}

/// Delivers `batch` in order. Records the sink accepted are removed before a
/// retry, so a failure partway through never resends them. The batch is
/// empty on return.
async fn send_batch(
    sink: &dyn LogSink,
    batch: &mut Vec<LogRecord>,
    retry: &Retry,
    stats: &DispatchStats,
) {
    let mut backoff = retry.backoff;
    let mut attempt = 1;
    loop {
        let (delivered, result) = try_send_batch(sink, batch).await;
        stats.sent.fetch_add(delivered as u64, Ordering::Relaxed);
        batch.drain(..delivered);

        match result {
            Ok(()) => return,
            Err(e) if attempt >= retry.max_attempts => {
                error!(
                    error = %e,
                    attempts = attempt,
                    records = batch.len(),
                    "giving up on log batch"
                );
                batch.clear();
                return;
            }
            Err(e) => {
                warn!(error = %e, ?backoff, remaining = batch.len(), "log sink send failed, retrying");
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, retry.max_backoff);
                attempt += 1;
            }
        }
    }
}

/// Number of leading records the sink accepted, and the error that stopped
/// delivery if any.
async fn try_send_batch(
    sink: &dyn LogSink,
    batch: &[LogRecord],
) -> (usize, Result<(), Box<dyn Error + Send + Sync>>) {
    for (delivered, record) in batch.iter().enumerate() {
        if let Err(e) = sink.send(record).await {
            return (delivered, Err(e));
        }
    }
    (batch.len(), Ok(()))
}

impl Handler for DispatchHandler {
    fn enabled(&self, _ctx: &Context, level: Level) -> bool {
        self.settings.enabled_levels.contains(&level)
    }

    /// **Returns**
    /// - `Ok(())` when the record was enqueued, or dropped because the
    ///   channel was full.
    /// - `Err(HandleError::ChannelClosed)` once the background task is gone.
    fn handle(&self, _ctx: &Context, record: Record) -> Result<(), HandleError> {
        self.stats.total.fetch_add(1, Ordering::Relaxed);
        let record = self.to_log_record(record);

        match self.sender.try_send(record) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("log channel full, dropping log record");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(HandleError::ChannelClosed),
        }
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
