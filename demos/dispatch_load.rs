use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use log_scope::dispatch::DispatchHandler;
use log_scope::init::DispatchConfig;
use log_scope::sink::NoopSink;
use log_scope::{Attribute, Context, Logger};
use tokio::time::Duration;

#[tokio::main]
async fn main() {
    let config = DispatchConfig {
        channel_buffer: 50_000,
        batch_size: 1_000,
        flush_interval: Duration::from_millis(200),
        enable_stdout: false,
        ..DispatchConfig::default()
    };
    let (dispatch, task) = DispatchHandler::new(Arc::new(NoopSink), &config);
    let stats = Arc::clone(dispatch.stats());

    let logger = Logger::new(dispatch)
        .with_group("load")
        .with([Attribute::string("run", "dispatch_load")]);
    let ctx = Context::background();

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        if let Err(e) = logger.error(&ctx, "load test error", [Attribute::uint("iteration", i)]) {
            eprintln!("log call failed: {e}");
            break;
        }
    }

    let elapsed = start.elapsed();
    println!(
        "sent {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    drop(logger);
    if let Err(e) = task.await {
        eprintln!("dispatch task failed: {e}");
    }
    println!(
        "enqueued={} dropped={} sent={}",
        stats.enqueued.load(Ordering::Relaxed),
        stats.dropped.load(Ordering::Relaxed),
        stats.sent.load(Ordering::Relaxed),
    );
}
