//! OpenTelemetry span export over OTLP/gRPC.
//!
//! Enabled with `JAEGER_ENABLED=true`; spans go to `OTEL_EXPORTER_OTLP_ENDPOINT`
//! tagged with `service.name` from `OTEL_SERVICE_NAME`.

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace, Resource};

use crate::config::TelemetryConfig;
use crate::error::{AppError, AppResult};

/// Install a batching OTLP exporter and return its tracer.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracer(config: &TelemetryConfig) -> AppResult<trace::Tracer> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(config.otlp_endpoint.clone());

    let resource = Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(trace::config().with_resource(resource))
        .install_batch(runtime::Tokio)
        .map_err(|e| {
            AppError::Config(format!(
                "Failed to install OTLP exporter for {}: {}",
                config.otlp_endpoint, e
            ))
        })
}

/// Flushes and shuts down the global tracer provider on drop.
#[must_use = "dropping the guard shuts down span export"]
pub struct TelemetryGuard {
    exporting: bool,
}

impl TelemetryGuard {
    pub(crate) fn new(exporting: bool) -> Self {
        Self { exporting }
    }

    /// Whether spans are being exported.
    pub fn is_exporting(&self) -> bool {
        self.exporting
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if self.exporting {
            opentelemetry::global::shutdown_tracer_provider();
        }
    }
}
