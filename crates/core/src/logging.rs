//! Logging infrastructure for finagent.
//!
//! This module initializes the tracing subscriber for structured logging.
//! All logs are emitted to stderr to keep stdout clean for answers and JSON
//! output. When OTLP export is enabled, spans are also shipped to the
//! configured collector.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::TelemetryConfig;
use crate::error::{AppError, AppResult};
use crate::telemetry::{self, TelemetryGuard};

/// Initialize the tracing subscriber with stderr output.
///
/// This sets up structured logging with:
/// - Output to stderr (stdout is reserved for data)
/// - Environment-based filtering (RUST_LOG or provided level)
/// - Optional ANSI color control
///
/// # Arguments
/// * `log_level` - Optional log level override (e.g., "debug", "info")
/// * `no_color` - Disable colored output
///
/// # Example
/// ```no_run
/// use finagent_core::logging::init_logging;
///
/// init_logging(None, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> AppResult<()> {
    init_subscriber(log_level, no_color, None).map(|_| ())
}

/// Initialize logging and, when enabled in `telemetry`, the OTLP span exporter.
///
/// The returned guard flushes pending spans when dropped; keep it alive for
/// the lifetime of the process.
pub fn init_logging_with_telemetry(
    log_level: Option<&str>,
    no_color: bool,
    telemetry: &TelemetryConfig,
) -> AppResult<TelemetryGuard> {
    init_subscriber(log_level, no_color, Some(telemetry))
}

fn init_subscriber(
    log_level: Option<&str>,
    no_color: bool,
    telemetry: Option<&TelemetryConfig>,
) -> AppResult<TelemetryGuard> {
    let default_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_str = log_level.unwrap_or(&default_level);

    let env_filter = EnvFilter::try_new(filter_str)
        .map_err(|e| AppError::Config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!no_color && supports_color());

    // Exporter failures must not stop the CLI; report them once logging is up
    let mut export_error = None;
    let tracer = match telemetry {
        Some(cfg) if cfg.otlp_enabled => match telemetry::init_tracer(cfg) {
            Ok(tracer) => Some(tracer),
            Err(e) => {
                export_error = Some(e);
                None
            }
        },
        _ => None,
    };
    let exporting = tracer.is_some();
    let otel_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))?;

    if let Some(e) = export_error {
        tracing::warn!("OpenTelemetry export disabled: {}", e);
    }
    if let Some(cfg) = telemetry.filter(|_| exporting) {
        tracing::info!(
            service = %cfg.service_name,
            endpoint = %cfg.otlp_endpoint,
            "OpenTelemetry export enabled"
        );
    }

    Ok(TelemetryGuard::new(exporting))
}

/// Check if the terminal supports color output.
fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}
