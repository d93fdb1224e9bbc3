use std::sync::Arc;

use async_trait::async_trait;
use log_scope::{
    init::{init_tracing, InitError},
    record::LogRecord,
    sink::LogSink,
};
use tracing::{error, info, info_span};

/// A sink for a store this crate has no built-in support for. It only
/// prints each record; a real one would call the store's client library.
struct MyCustomDbSink;

#[async_trait]
impl LogSink for MyCustomDbSink {
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        println!("[my-custom-db] {}", serde_json::to_string(record)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    let sink: Arc<dyn LogSink> = Arc::new(MyCustomDbSink);
    let (_logger, _task) = init_tracing(sink)?;

    info!("custom sink example started");
    let span = info_span!("request", id = 17);
    let _guard = span.enter();
    error!(db = "my-custom-db", "simulated error sent via custom sink");
    drop(_guard);

    // The global subscriber keeps the dispatcher alive for the whole process,
    // so wait for one flush interval instead of joining the task.
    tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;
    Ok(())
}
