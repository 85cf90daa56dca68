use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;

use crate::error::{GuardError, Result};

pub mod labels {
    pub const SCOPE: &str = "scope";
    pub const ENDPOINT: &str = "endpoint";
    pub const REASON: &str = "reason";
    pub const DATA_TYPE: &str = "data_type";
    pub const METHOD: &str = "method";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

#[derive(Clone)]
pub struct Metrics {
    // Rate limiting metrics
    pub rate_limit_requests_total: Counter<u64>,
    pub rate_limit_allowed_total: Counter<u64>,
    pub rate_limit_rejected_total: Counter<u64>,

    // IP filtering metrics
    pub ip_filter_requests_total: Counter<u64>,
    pub ip_filter_allowed_total: Counter<u64>,
    pub ip_filter_denied_total: Counter<u64>,
    pub ip_auto_blocks_total: Counter<u64>,

    // Anonymization metrics
    pub anonymizations_total: Counter<u64>,

    // Build info
    pub build_info: Gauge<u64>,
}

impl Metrics {
    pub fn new(meter: Meter) -> Self {
        Self {
            rate_limit_requests_total: meter
                .u64_counter("photoguard_rate_limit_requests_total")
                .with_description("Total number of rate limit checks")
                .build(),
            rate_limit_allowed_total: meter
                .u64_counter("photoguard_rate_limit_allowed_total")
                .with_description("Total number of requests admitted by the rate limiter")
                .build(),
            rate_limit_rejected_total: meter
                .u64_counter("photoguard_rate_limit_rejected_total")
                .with_description("Total number of requests rejected by the rate limiter")
                .build(),

            ip_filter_requests_total: meter
                .u64_counter("photoguard_ip_filter_requests_total")
                .with_description("Total number of IP filter lookups")
                .build(),
            ip_filter_allowed_total: meter
                .u64_counter("photoguard_ip_filter_allowed_total")
                .with_description("Total number of IPs allowed by the filter")
                .build(),
            ip_filter_denied_total: meter
                .u64_counter("photoguard_ip_filter_denied_total")
                .with_description("Total number of IPs denied by the filter")
                .build(),
            ip_auto_blocks_total: meter
                .u64_counter("photoguard_ip_auto_blocks_total")
                .with_description("Temporary blocks installed after repeated failed attempts")
                .build(),

            anonymizations_total: meter
                .u64_counter("photoguard_anonymizations_total")
                .with_description("Total number of anonymized values")
                .build(),

            build_info: meter
                .u64_gauge("photoguard_build_info")
                .with_description("Build information")
                .build(),
        }
    }

    /// Set build info metric with version labels
    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");

        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    pub fn record_rate_limit_allowed(&self, scope: &str, endpoint: &str) {
        let attrs = [
            KeyValue::new(labels::SCOPE, scope.to_string()),
            KeyValue::new(labels::ENDPOINT, endpoint.to_string()),
        ];
        self.rate_limit_requests_total.add(1, &attrs);
        self.rate_limit_allowed_total.add(1, &attrs);
    }

    pub fn record_rate_limit_rejection(&self, scope: &str, endpoint: &str) {
        let attrs = [
            KeyValue::new(labels::SCOPE, scope.to_string()),
            KeyValue::new(labels::ENDPOINT, endpoint.to_string()),
        ];
        self.rate_limit_requests_total.add(1, &attrs);
        self.rate_limit_rejected_total.add(1, &attrs);
    }

    pub fn record_ip_filter_allowed(&self, reason: &str) {
        self.ip_filter_requests_total.add(1, &[]);
        self.ip_filter_allowed_total
            .add(1, &[KeyValue::new(labels::REASON, reason.to_string())]);
    }

    pub fn record_ip_filter_denied(&self, reason: &str) {
        self.ip_filter_requests_total.add(1, &[]);
        self.ip_filter_denied_total
            .add(1, &[KeyValue::new(labels::REASON, reason.to_string())]);
    }

    pub fn record_auto_block(&self) {
        self.ip_auto_blocks_total.add(1, &[]);
    }

    pub fn record_anonymization(&self, data_type: &str, method: &str) {
        self.anonymizations_total.add(
            1,
            &[
                KeyValue::new(labels::DATA_TYPE, data_type.to_string()),
                KeyValue::new(labels::METHOD, method.to_string()),
            ],
        );
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry)> {
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()
        .map_err(|e| GuardError::Metrics(format!("Failed to build prometheus exporter: {e}")))?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("photo-guard");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}

/// Render the registry in the Prometheus text exposition format
pub fn encode_metrics(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| GuardError::Metrics(format!("Failed to encode metrics: {e}")))?;

    String::from_utf8(buffer)
        .map_err(|e| GuardError::Metrics(format!("Metrics output is not UTF-8: {e}")))
}
