//! OpenTelemetry initialization and configuration.
//!
//! Every eventq process (API server, worker fleet, one-shot CLI) reports
//! under its own [`Role`]. With an OTLP endpoint configured, traces,
//! metrics, and logs are exported there; otherwise events go to stderr only,
//! which keeps stdout free for CLI output.

pub mod metrics;
pub mod worker;

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::info;

use crate::error::{Error, Result};

/// Which eventq process is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// `eventq serve`: HTTP API, optionally with in-process workers.
    Api,
    /// `eventq worker`: worker loops only.
    Worker,
    /// `eventq event ...`: a single producer or reader call.
    Cli,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Api => "api",
            Role::Worker => "worker",
            Role::Cli => "cli",
        }
    }

    /// The `service.name` reported to the backend.
    pub fn service_name(self) -> &'static str {
        match self {
            Role::Api => "eventq-api",
            Role::Worker => "eventq-worker",
            Role::Cli => "eventq-cli",
        }
    }
}

/// Configuration for telemetry initialization.
pub struct TelemetryConfig {
    /// Optional OTLP endpoint (e.g. "http://localhost:4317").
    pub endpoint: Option<String>,
    /// Fallback filter directive when `RUST_LOG` is unset (e.g. "info").
    pub log_level: String,
    pub role: Role,
    /// Worker loops running in this process.
    pub workers: usize,
}

impl TelemetryConfig {
    /// Resource attributes shared by all three signal pipelines.
    pub fn resource(&self) -> Resource {
        Resource::builder()
            .with_service_name(self.role.service_name())
            .with_attributes([
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    env!("CARGO_PKG_VERSION"),
                ),
                KeyValue::new("eventq.role", self.role.as_str()),
                KeyValue::new("eventq.workers", self.workers as i64),
            ])
            .build()
    }
}

/// Guard that flushes and shuts down OTel providers on drop.
///
/// Must be held for the lifetime of the application.
#[derive(Default)]
pub struct TelemetryGuard {
    pipelines: Option<Pipelines>,
}

struct Pipelines {
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
    logger: SdkLoggerProvider,
}

impl TelemetryGuard {
    /// Whether signals are exported over OTLP.
    pub fn is_exporting(&self) -> bool {
        self.pipelines.is_some()
    }

    /// Force-flush all telemetry pipelines.
    pub fn force_flush(&self) {
        if let Some(ref p) = self.pipelines {
            let _ = p.tracer.force_flush();
            let _ = p.meter.force_flush();
            let _ = p.logger.force_flush();
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        // Logs first so shutdown messages from the other providers are not lost.
        if let Some(p) = self.pipelines.take() {
            let _ = p.logger.shutdown();
            let _ = p.meter.shutdown();
            let _ = p.tracer.shutdown();
        }
    }
}

/// Initialize tracing, metrics, and logs for one eventq process.
///
/// # Errors
///
/// Returns [`Error::Telemetry`] if an OTLP exporter fails to build or a
/// global subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let stderr = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr);

    let guard = match config.endpoint.as_deref() {
        Some(endpoint) => {
            let pipelines = build_pipelines(endpoint, config.resource())?;

            use opentelemetry::trace::TracerProvider as _;
            let trace_layer = tracing_opentelemetry::layer()
                .with_tracer(pipelines.tracer.tracer(config.role.service_name()));
            let log_layer = opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(
                &pipelines.logger,
            );
            opentelemetry::global::set_meter_provider(pipelines.meter.clone());

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr)
                .with(trace_layer)
                .with(log_layer)
                .try_init()
                .map_err(subscriber_error)?;

            TelemetryGuard {
                pipelines: Some(pipelines),
            }
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr)
                .try_init()
                .map_err(subscriber_error)?;
            TelemetryGuard::default()
        }
    };

    info!(
        role = config.role.as_str(),
        workers = config.workers,
        exporting = guard.is_exporting(),
        "telemetry initialized"
    );
    Ok(guard)
}

fn build_pipelines(endpoint: &str, resource: Resource) -> Result<Pipelines> {
    use opentelemetry_otlp::WithExportConfig as _;

    let spans = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| exporter_error("span", e))?;
    let metrics = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| exporter_error("metric", e))?;
    let logs = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| exporter_error("log", e))?;

    Ok(Pipelines {
        tracer: SdkTracerProvider::builder()
            .with_batch_exporter(spans)
            .with_resource(resource.clone())
            .build(),
        meter: SdkMeterProvider::builder()
            .with_periodic_exporter(metrics)
            .with_resource(resource.clone())
            .build(),
        logger: SdkLoggerProvider::builder()
            .with_batch_exporter(logs)
            .with_resource(resource)
            .build(),
    })
}

fn exporter_error(signal: &str, e: impl std::fmt::Display) -> Error {
    Error::Telemetry(format!("failed to create OTLP {signal} exporter: {e}"))
}

fn subscriber_error(e: impl std::fmt::Display) -> Error {
    Error::Telemetry(format!("failed to init tracing subscriber: {e}"))
}
