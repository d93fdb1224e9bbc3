//! Structured logging with scoped attribute groups.
//!
//! A [`Logger`] wraps a [`Handler`]. Scoping a logger with
//! [`Logger::with`] or [`Logger::with_group`] extends an immutable,
//! structurally shared [`Chain`] held by the handler, so derived loggers are
//! cheap and never disturb their parents. Request-scoped attributes travel in
//! a [`Context`] and are merged in by [`data::DataHandler`].
//!
//! Handlers provided here:
//! - [`testing::TestingHandler`] renders `LEVEL: msg [k=v ...]` lines.
//! - [`json::JsonHandler`] writes one JSON object per record with groups nested.
//! - [`tee::TeeHandler`] fans out to several handlers.
//! - [`dispatch::DispatchHandler`] batches records into an async [`sink::LogSink`],
//!   lifting an [`ErrorReport`] logged under `error` into a structured exception.
//! - [`tracing_bridge::TracingHandler`] re-emits records as `tracing` events.
//!
//! [`layer::HandlerLayer`] goes the other way and feeds `tracing` events into a
//! logger; [`init::init_tracing`] wires both ends to a [`sink::LogSink`], which
//! [`backend::make_sink_from_config`] can build from a DSN.

pub mod backend;
pub mod chain;
pub mod context;
pub mod data;
pub mod dispatch;
pub mod env;
pub mod handler;
pub mod init;
pub mod json;
pub mod layer;
pub mod level;
pub mod logger;
pub mod record;
pub mod report;
pub mod sink;
pub mod tee;
pub mod testing;
pub mod tracing_bridge;
pub mod value;

pub use chain::{Chain, Op};
pub use context::Context;
pub use handler::{HandleError, Handler};
pub use level::Level;
pub use logger::{debug, error, info, log, warn, Logger};
pub use record::{LogRecord, Record};
pub use report::ErrorReport;
pub use value::{Attribute, Kind, LogValuer, Value};
