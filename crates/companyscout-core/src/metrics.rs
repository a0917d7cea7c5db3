use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use tracing::info;

struct ResearchMetrics {
    provider_runs: Counter<u64>,
    provider_duration_ms: Histogram<f64>,
    gateway_retries: Counter<u64>,
    jobs: Counter<u64>,
}

static METRICS: OnceCell<ResearchMetrics> = OnceCell::new();

fn handles() -> &'static ResearchMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("companyscout.research");
        ResearchMetrics {
            provider_runs: meter
                .u64_counter("provider_runs_total")
                .with_description("Provider invocations by outcome")
                .init(),
            provider_duration_ms: meter
                .f64_histogram("provider_run_duration_ms")
                .with_description("Provider discovery runtime in milliseconds")
                .init(),
            gateway_retries: meter
                .u64_counter("gateway_retries_total")
                .with_description("Remote API attempts that were retried, by error type")
                .init(),
            jobs: meter
                .u64_counter("research_jobs_total")
                .with_description("Research jobs by mode and terminal status")
                .init(),
        }
    })
}

/// Hint to operators that OTEL metrics export can be configured externally.
pub fn init_metrics_from_env(service_name: &str) {
    if std::env::var("COMPANYSCOUT_OTEL_METRICS_ENDPOINT").is_ok() {
        info!(
            target = "telemetry",
            "COMPANYSCOUT_OTEL_METRICS_ENDPOINT detected for {service_name}. Install an OTLP meter provider to export research metrics."
        );
    }
}

/// Record one provider invocation (no-op if no meter provider is installed).
pub fn record_provider_run(provider: &str, success: bool, duration_ms: u64) {
    let metrics = handles();
    let attrs = [
        KeyValue::new("provider", provider.to_string()),
        KeyValue::new("outcome", if success { "success" } else { "failure" }),
    ];
    metrics.provider_runs.add(1, &attrs);
    metrics.provider_duration_ms.record(duration_ms as f64, &attrs);
}

pub fn record_gateway_retry(error_type: &'static str) {
    handles()
        .gateway_retries
        .add(1, &[KeyValue::new("error_type", error_type)]);
}

pub fn record_job(mode: &'static str, status: &'static str) {
    handles().jobs.add(
        1,
        &[KeyValue::new("mode", mode), KeyValue::new("status", status)],
    );
}
