use std::sync::Arc;
use std::time::Duration;

use log_scope::backend::{make_sink_from_config, BackendConfig};
use log_scope::data::DataHandler;
use log_scope::dispatch::DispatchHandler;
use log_scope::init::DispatchConfig;
use log_scope::json::JsonHandler;
use log_scope::tee::TeeHandler;
use log_scope::tracing_bridge::TracingHandler;
use log_scope::{Attribute, Context, ErrorReport, Handler, Level, Logger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let backend = BackendConfig::from_env()?;
    let sink = make_sink_from_config(&backend).await?;
    let (dispatch, task) = DispatchHandler::new(sink, &DispatchConfig::from_env()?);

    let handler = TeeHandler::new([
        Arc::new(JsonHandler::new(std::io::stdout()).with_min_level(Level::Debug)) as Arc<dyn Handler>,
        Arc::new(TracingHandler::new().with_min_level(Level::Info)) as Arc<dyn Handler>,
        Arc::new(dispatch) as Arc<dyn Handler>,
    ]);
    let logger = Logger::new(DataHandler::new(handler)).with([Attribute::string("service", "billing")]);

    let ctx = Context::background()
        .with_attrs([Attribute::string("request_id", "req-7f3a")])
        .with_logger(logger.clone());

    let checkout = logger.with_group("checkout");
    checkout.info(&ctx, "cart priced", [
        Attribute::uint("items", 3),
        Attribute::float("total", 42.5),
    ])?;
    checkout.with_group("payment").error(&ctx, "card declined", [
        Attribute::string("provider", "acme"),
        Attribute::duration("latency", Duration::from_millis(830)),
        Attribute::group("card", [Attribute::string("brand", "visa")]),
        ErrorReport::msg("issuer returned 05").with_backtrace().attr(),
    ])?;

    // Anything holding the context can log without a logger in hand.
    log_scope::warn(&ctx, "retry scheduled", [Attribute::int("attempt", 2)])?;

    drop((logger, checkout, ctx));
    task.await?;
    Ok(())
}
