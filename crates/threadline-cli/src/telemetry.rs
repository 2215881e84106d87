//! Tracing setup.
//!
//! Logs go to stderr so command output on stdout stays parseable. The
//! filter comes from `THREADLINE_LOG`, then `RUST_LOG`, defaulting to `warn`.
//! With the `otel` feature and `OTEL_EXPORTER_OTLP_ENDPOINT` set, spans are
//! also exported over OTLP/HTTP.

use std::env;
use std::io;

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_VAR: &str = "THREADLINE_LOG";
const DEFAULT_FILTER: &str = "warn";

fn env_filter() -> EnvFilter {
    env::var(LOG_VAR)
        .or_else(|_| env::var(EnvFilter::DEFAULT_ENV))
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
pub fn init(json: bool) -> Result<()> {
    let fmt_layer = if json {
        fmt::layer().json().with_writer(io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .boxed()
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer);

    #[cfg(feature = "otel")]
    let registry = registry.with(otel::layer()?);

    registry.try_init()?;
    Ok(())
}

/// Flush exported spans before exit.
pub fn shutdown() {
    #[cfg(feature = "otel")]
    otel::shutdown();
}

#[cfg(feature = "otel")]
mod otel {
    use std::env;
    use std::sync::OnceLock;

    use anyhow::Result;
    use opentelemetry::trace::TracerProvider;
    use opentelemetry::{global, KeyValue};
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{trace as sdktrace, Resource};
    use tracing::Subscriber;
    use tracing_opentelemetry::OpenTelemetryLayer;
    use tracing_subscriber::registry::LookupSpan;

    const SERVICE_NAME: &str = "threadline";

    static TRACER_PROVIDER: OnceLock<sdktrace::SdkTracerProvider> = OnceLock::new();

    /// An OTLP layer, or `None` when no endpoint is configured.
    pub fn layer<S>() -> Result<Option<OpenTelemetryLayer<S, sdktrace::Tracer>>>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        let Ok(endpoint) = env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
            return Ok(None);
        };
        let service_name =
            env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| SERVICE_NAME.to_string());

        let resource = Resource::builder()
            .with_service_name(service_name)
            .with_attribute(KeyValue::new(
                "service.version",
                env!("CARGO_PKG_VERSION").to_string(),
            ))
            .build();

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()?;

        let provider = sdktrace::SdkTracerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build();

        let tracer = provider.tracer(SERVICE_NAME);
        let _ = TRACER_PROVIDER.set(provider.clone());
        global::set_tracer_provider(provider);

        Ok(Some(tracing_opentelemetry::layer().with_tracer(tracer)))
    }

    pub fn shutdown() {
        if let Some(provider) = TRACER_PROVIDER.get() {
            if let Err(err) = provider.shutdown() {
                tracing::warn!("OpenTelemetry tracer shutdown failed: {err}");
            }
        }
    }
}
