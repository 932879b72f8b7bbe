//! Log output for the nawafed server, with optional span export.
//!
//! Logs always go to stdout. Session rejections, KV write refusals and
//! request spans (keyed by `x-request-id`) are exported over OTLP gRPC only
//! when `OTEL_EXPORTER_OTLP_ENDPOINT` points at a collector.

use anyhow::Result;
use once_cell::sync::OnceCell;
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    trace::{SdkTracerProvider, Tracer},
    Resource,
};
use std::{env::var, time::Duration};
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
use ulid::Ulid;

const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

// Dependencies that are chatty at the server's own verbosity.
const QUIET_TARGETS: [&str; 3] = ["hyper=error", "tokio=error", "opentelemetry_sdk=warn"];

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

// Collectors are usually addressed as `host:4317` inside the deployment network.
fn collector_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

fn resource_attributes(instance_id: Option<String>) -> Vec<KeyValue> {
    vec![
        KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        KeyValue::new("vcs.revision", crate::GIT_COMMIT_HASH),
        KeyValue::new(
            "service.instance.id",
            instance_id.unwrap_or_else(|| Ulid::new().to_string()),
        ),
    ]
}

fn span_exporter(endpoint: &str) -> Result<Tracer> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(collector_url(endpoint))
        .with_timeout(EXPORT_TIMEOUT)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder_empty()
                .with_attributes(resource_attributes(var("OTEL_SERVICE_INSTANCE_ID").ok()))
                .build(),
        )
        .build();

    let _ = TRACER_PROVIDER.set(provider.clone());
    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TraceContextPropagator::new());

    Ok(provider.tracer(env!("CARGO_PKG_NAME")))
}

fn log_filter(level: Level) -> Result<EnvFilter> {
    let mut filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    for directive in QUIET_TARGETS {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

/// Install the global subscriber. Defaults to `ERROR` when no level is given.
///
/// # Errors
///
/// Returns an error if the span exporter cannot be built or a subscriber is
/// already installed.
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);
    let filter = log_filter(verbosity_level.unwrap_or(Level::ERROR))?;

    match var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) if !endpoint.trim().is_empty() => {
            let otel_layer = tracing_opentelemetry::layer().with_tracer(span_exporter(&endpoint)?);
            tracing::subscriber::set_global_default(
                Registry::default().with(fmt_layer).with(otel_layer).with(filter),
            )?;
        }
        _ => {
            tracing::subscriber::set_global_default(
                Registry::default().with(fmt_layer).with(filter),
            )?;
        }
    }

    Ok(())
}

/// Flush pending spans before exit.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("flushing spans");
        let _ = provider.shutdown();
    }
}
