use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    classification_duration: Histogram<u64>,
    classification_failures: Counter<u64>,
    upload_rejections: Counter<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("vision_web");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        // Model round trips take from a few hundred ms to tens of seconds.
        let boundaries = generate_boundaries((100, 500, 2000, 10000, 30000), (100, 250, 1000, 5000));

        let classification_duration = meter
            .u64_histogram("classification_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of classification requests in milliseconds")
            .build();

        let classification_failures = meter
            .u64_counter("classification_failures_total")
            .with_description("Classifications that ended in the error state")
            .build();

        let upload_rejections = meter
            .u64_counter("upload_rejections_total")
            .with_description("Uploads rejected by validation")
            .build();

        Ok(Metrics {
            request_counter,
            classification_duration,
            classification_failures,
            upload_rejections,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_classification_duration(&self, duration_ms: u64, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.classification_duration.record(duration_ms, &attributes);
    }

    pub fn record_classification_failure(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.classification_failures.add(1, &attributes);
    }

    pub fn record_upload_rejection(&self, reason: &'static str) {
        let attributes = vec![KeyValue::new("reason", reason)];
        self.upload_rejections.add(1, &attributes);
    }
}

/// Histogram buckets: each `(start, end)` span of `parts` is walked with its
/// own step, duplicates at the joins dropped.
fn generate_boundaries(parts: (u64, u64, u64, u64, u64), steps: (usize, usize, usize, usize)) -> Vec<f64> {
    let first_part = (parts.0..=parts.1).step_by(steps.0);
    let middle_part = (parts.1..=parts.2).step_by(steps.1);
    let end_part = (parts.2..=parts.3).step_by(steps.2);
    let tail_part = (parts.3..=parts.4).step_by(steps.3);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}
