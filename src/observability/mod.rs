//! OpenTelemetry-based observability with file-based trace export.
//!
//! ```text
//! tracing → tracing-opentelemetry → OpenTelemetry SDK → FileSpanExporter → JSON lines
//! ```
//!
//! Spans land in `<data_dir>/storeproxy-otlp.json`, one OTLP JSON document
//! per line, with size-based rotation. Requests carrying a trace context have
//! their worker span parented on the caller's span.
//!
//! # Usage
//!
//! ```rust
//! use storeproxy::observability::{init_tracing, LogOutput};
//! use storeproxy::Config;
//!
//! let config = Config {
//!     data_dir: std::env::temp_dir().join("storeproxy-doc"),
//!     ..Config::default()
//! };
//! init_tracing(&config, LogOutput::TraceFileOnly);
//! tracing::debug!("worker started");
//! ```

mod file_writer;
mod init;
mod span_formatter;
mod tracer;

pub use file_writer::RotationPolicy;
pub use init::{init_tracing, LogOutput};
