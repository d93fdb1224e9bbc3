use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Asynchronous destination for flattened [`LogRecord`]s.
///
/// Implementations transport records to a concrete backend (a file, a
/// collector, an error tracker). [`DispatchHandler`](crate::dispatch::DispatchHandler)
/// calls `send` from its background task, never from the logging thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single record to the backend.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the record.
    /// - `Err(..)` on backend failure. The dispatcher treats this as
    ///   transient and retries the whole batch with backoff.
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush anything the backend buffers locally. Default is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// Drops every record. Useful for measuring dispatch overhead.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn send(&self, _record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// Writes each record as a JSON line to stdout, stderr or a file.
pub struct WriterSink {
    out: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl WriterSink {
    pub fn new(out: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// Opens `path` for appending, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self::new(file))
    }
}

#[async_trait]
impl LogSink for WriterSink {
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.out.lock().await.write_all(&line).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.out.lock().await.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use chrono::Utc;

    fn record() -> LogRecord {
        let mut fields = serde_json::Map::new();
        fields.insert("req.id".to_string(), serde_json::json!("r-1"));
        LogRecord {
            timestamp: Utc::now(),
            level: Level::Error,
            message: "boom".to_string(),
            target: None,
            module_path: None,
            file: Some("src/main.rs".to_string()),
            line: Some(3),
            fields,
            service_name: None,
            exception: None,
        }
    }

    #[tokio::test]
    async fn file_sink_appends_json_lines() {
        let path = std::env::temp_dir().join(format!("log-scope-sink-{}.jsonl", std::process::id()));
        let _ = tokio::fs::remove_file(&path).await;

        let sink = WriterSink::open(&path).await.unwrap();
        sink.send(&record()).await.unwrap();
        sink.send(&record()).await.unwrap();
        sink.flush().await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["fields"]["req.id"], "r-1");
        assert_eq!(parsed["level"], "ERROR");
    }

    #[tokio::test]
    async fn writer_sink_accepts_any_async_writer() {
        let (writer, mut reader) = io::duplex(4096);
        let sink = WriterSink::new(writer);
        sink.send(&record()).await.unwrap();
        sink.flush().await.unwrap();
        drop(sink);

        let mut text = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut reader, &mut text)
            .await
            .unwrap();
        assert!(text.ends_with("\n"));
        assert!(text.contains(r#""message":"boom""#));
    }

    #[tokio::test]
    async fn noop_sink_accepts_everything() {
        assert!(NoopSink.send(&record()).await.is_ok());
        assert!(NoopSink.flush().await.is_ok());
    }
}
