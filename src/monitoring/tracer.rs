/*!
 * Tracing
 * Structured logging setup and supervision spans using the tracing crate
 */

use tracing::{info, info_span, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - LOCI_KERNEL_TRACE_JSON: Enable JSON output (default: false)
///
/// `force_json` lets a loaded config request JSON output as well.
pub fn init_tracing(force_json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = force_json
        || std::env::var("LOCI_KERNEL_TRACE_JSON")
            .map(|v| v == "1" || v == "true")
            .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    // try_init: embedding hosts may have installed their own subscriber
    let result = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    if result.is_ok() {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// Generate a unique trace ID for correlating one supervisor's log lines
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping the whole life of one supervisor
pub fn supervisor_span(name: &str, trace_id: &str) -> Span {
    info_span!("supervisor", subprogram = name, trace_id = trace_id)
}
