//! Process-wide tracing subscriber setup.
//!
//! Logs go to stderr through `tracing-subscriber`'s fmt layer filtered by an
//! `EnvFilter` built from the configured level. With the `otel` feature and an
//! OTLP endpoint configured, spans are also exported over OTLP/HTTP.

use std::sync::OnceLock;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

static TELEMETRY_INITIALIZED: OnceLock<()> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid log level {level:?}: {details}")]
    InvalidLevel { level: String, details: String },
    #[error("Failed to initialize tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
    #[error("Failed to build OTLP exporter: {0}")]
    Exporter(String),
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive, e.g. `info` or `ensembler_engine=debug,warn`.
    pub log_level: String,
    pub json: bool,
    pub service_name: String,
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    pub fn new(service_name: &str, log_level: &str) -> Self {
        Self {
            log_level: log_level.to_string(),
            json: false,
            service_name: service_name.to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
        }
    }
}

/// Normalize common level spellings (`WARNING`, `Info`) into filter directives.
pub fn normalize_level(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}

/// `RUST_LOG` when it is set and valid, else the normalized `log_level`.
pub fn build_filter(log_level: &str) -> Result<EnvFilter, TelemetryError> {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_from(from_env.as_deref(), log_level)
}

fn filter_from(rust_log: Option<&str>, log_level: &str) -> Result<EnvFilter, TelemetryError> {
    if let Some(filter) = rust_log.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        return Ok(filter);
    }
    EnvFilter::try_new(normalize_level(log_level)).map_err(|err| TelemetryError::InvalidLevel {
        level: log_level.to_string(),
        details: err.to_string(),
    })
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    if TELEMETRY_INITIALIZED.get().is_some() {
        return Ok(());
    }
    let filter = build_filter(&config.log_level)?;
    let fmt_layer = if config.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let registry = tracing_subscriber::registry().with(fmt_layer);
    #[cfg(feature = "otel")]
    let registry = registry.with(otel::layer(config)?);
    registry.with(filter).try_init()?;

    if cfg!(not(feature = "otel")) && config.otlp_endpoint.is_some() {
        tracing::warn!("OTLP endpoint configured but the otel feature is disabled; spans are not exported");
    }
    let _ = TELEMETRY_INITIALIZED.set(());
    Ok(())
}

/// Flush pending spans before exit.
pub fn shutdown_telemetry() {
    #[cfg(feature = "otel")]
    otel::shutdown();
}

#[cfg(feature = "otel")]
mod otel {
    use std::sync::OnceLock;

    use opentelemetry::trace::TracerProvider;
    use opentelemetry::{global, KeyValue};
    use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use opentelemetry_sdk::Resource;
    use tracing::Subscriber;
    use tracing_subscriber::registry::LookupSpan;
    use tracing_subscriber::Layer;

    use super::{TelemetryConfig, TelemetryError};

    static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

    pub(super) fn layer<S>(
        config: &TelemetryConfig,
    ) -> Result<Option<Box<dyn Layer<S> + Send + Sync>>, TelemetryError>
    where
        S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync + 'static,
    {
        let Some(endpoint) = config.otlp_endpoint.clone() else {
            return Ok(None);
        };
        let exporter = SpanExporter::builder()
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(endpoint)
            .build()
            .map_err(|err| TelemetryError::Exporter(err.to_string()))?;
        let resource = Resource::builder_empty()
            .with_attributes([KeyValue::new("service.name", config.service_name.clone())])
            .build();
        let provider = SdkTracerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build();
        global::set_tracer_provider(provider.clone());
        let tracer = provider.tracer(config.service_name.clone());
        let _ = TRACER_PROVIDER.set(provider);
        Ok(Some(
            tracing_opentelemetry::layer().with_tracer(tracer).boxed(),
        ))
    }

    pub(super) fn shutdown() {
        if let Some(provider) = TRACER_PROVIDER.get() {
            if let Err(err) = provider.force_flush() {
                tracing::warn!(error = %err, "Failed to flush OpenTelemetry spans");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level_aliases() {
        assert_eq!(normalize_level("WARNING"), "warn");
        assert_eq!(normalize_level(" Info "), "info");
        assert_eq!(normalize_level("fatal"), "error");
    }

    #[test]
    fn test_bad_level_is_rejected() {
        assert!(matches!(
            filter_from(None, "ensembler=bogus"),
            Err(TelemetryError::InvalidLevel { .. })
        ));
    }

    #[test]
    fn test_rust_log_wins_over_level() {
        let filter = filter_from(Some("ensembler_runner=debug"), "INFO").unwrap();
        assert_eq!(filter.to_string(), "ensembler_runner=debug");
        let fallback = filter_from(Some("ensembler=bogus"), "WARNING").unwrap();
        assert_eq!(fallback.to_string(), "warn");
        let level_only = filter_from(None, "ERROR").unwrap();
        assert_eq!(level_only.to_string(), "error");
    }
}
