//! Tracing subscriber setup.

use super::file_writer::RotationPolicy;
use super::tracer;
use crate::infrastructure::paths;
use crate::Config;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::resource::Resource;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Where human-readable log lines go, in addition to the trace file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Only the OTLP trace file.
    TraceFileOnly,
    /// Also compact log lines on stderr.
    Stderr,
}

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from
/// `config.trace_level`, otherwise `info`. Spans are exported as OTLP JSON to
/// `<data_dir>/storeproxy-otlp.json`, rotated according to the config.
///
/// Observability is optional: if the data directory cannot be created the
/// trace file is skipped, and calling this twice leaves the first subscriber
/// in place.
pub fn init_tracing(config: &Config, output: LogOutput) {
    let level = config.trace_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let otel_layer = std::fs::create_dir_all(&config.data_dir).ok().map(|()| {
        let resource = Resource::new(vec![opentelemetry::KeyValue::new(
            "service.name",
            tracer::SCOPE,
        )]);
        let policy = RotationPolicy {
            max_bytes: config.trace_max_bytes,
            max_backups: config.trace_backups,
        };
        let provider = tracer::create_tracer_provider(
            paths::trace_file(&config.data_dir),
            policy,
            resource,
        );
        OpenTelemetryLayer::new(provider.tracer(tracer::SCOPE))
    });

    let stderr_layer = (output == LogOutput::Stderr).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(EnvFilter::new("warn"))
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(stderr_layer)
        .try_init();
}
