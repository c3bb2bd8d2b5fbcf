//! Tracing setup with optional OpenTelemetry export
//!
//! Logs always go to stdout (text or JSON lines). When telemetry is enabled
//! spans are also exported over OTLP/gRPC.

use crate::config::{LoggingSettings, TelemetrySettings};
use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource, runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use tracing_subscriber::{Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// OpenTelemetry tracer guard
///
/// When dropped, flushes all pending spans and shuts down the tracer
pub struct TelemetryGuard;

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        opentelemetry::global::shutdown_tracer_provider();
    }
}

/// Build an OTLP tracer provider and install it globally
///
/// Returns `None` when telemetry is disabled.
pub fn init_telemetry(
    settings: &TelemetrySettings,
) -> Result<Option<TracerProvider>, Box<dyn std::error::Error>> {
    if !settings.enabled {
        return Ok(None);
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(settings.otlp_endpoint.as_str())
        .build()?;

    let resource = Resource::new(vec![
        KeyValue::new("service.name", settings.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION").to_string()),
    ]);

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());
    Ok(Some(provider))
}

/// Install the global tracing subscriber
///
/// Keep the returned guard alive for the life of the process.
pub fn setup_tracing(
    logging: &LoggingSettings,
    telemetry: &TelemetrySettings,
) -> Result<Option<TelemetryGuard>, Box<dyn std::error::Error>> {
    let level = logging.level.as_deref().unwrap_or("info");
    let fmt_layer = if common::logging::is_json_format(logging.format.as_deref()) {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let provider = init_telemetry(telemetry)?;
    let otel_layer = provider.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer(telemetry.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(common::logging::env_filter(level))
        .with(otel_layer)
        .init();

    if provider.is_some() {
        tracing::info!(
            service_name = %telemetry.service_name,
            otlp_endpoint = %telemetry.otlp_endpoint,
            "Tracing initialized with OpenTelemetry export"
        );
        Ok(Some(TelemetryGuard))
    } else {
        tracing::info!("Tracing initialized without OpenTelemetry");
        Ok(None)
    }
}
