//! Metrics collection for observability

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_histogram_with_registry, CounterVec, Histogram, HistogramOpts, HistogramVec, Opts,
    Registry,
};
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Query synthesis
    pub query_attempts: CounterVec,
    pub translations: CounterVec,

    // Fact checking
    pub fact_checks: CounterVec,
    pub ground_truth_lookups: CounterVec,
    pub confidence: Histogram,

    // Completion capability
    pub llm_requests: CounterVec,

    pub stage_duration: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let query_attempts = register_counter_vec_with_registry!(
            Opts::new("query_attempts_total", "Query synthesis attempts by outcome"),
            &["outcome"],
            registry
        )?;

        let translations = register_counter_vec_with_registry!(
            Opts::new("query_translations_total", "Question-to-query translations"),
            &["status"],
            registry
        )?;

        let fact_checks = register_counter_vec_with_registry!(
            Opts::new("fact_checks_total", "Fact-check requests"),
            &["status"],
            registry
        )?;

        let ground_truth_lookups = register_counter_vec_with_registry!(
            Opts::new("ground_truth_lookups_total", "Ground-truth lookups per entity"),
            &["status"],
            registry
        )?;

        let confidence = register_histogram_with_registry!(
            HistogramOpts::new("verification_confidence", "Synthesized confidence scores")
                .buckets(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0]),
            registry
        )?;

        let llm_requests = register_counter_vec_with_registry!(
            Opts::new("llm_requests_total", "Completion requests"),
            &["status"],
            registry
        )?;

        let stage_duration = register_histogram_vec_with_registry!(
            "pipeline_stage_duration_seconds",
            "Pipeline stage duration in seconds",
            &["stage"],
            registry
        )?;

        Ok(Self {
            registry,
            query_attempts,
            translations,
            fact_checks,
            ground_truth_lookups,
            confidence,
            llm_requests,
            stage_duration,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one query attempt: `success`, `empty`, `error` or `generation_error`
    pub fn record_query_attempt(&self, outcome: &str) {
        self.query_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn record_translation(&self, success: bool) {
        let status = if success { "success" } else { "exhausted" };
        self.translations.with_label_values(&[status]).inc();
    }

    /// Record a fact check: `verified`, `no_data` or `error`
    pub fn record_fact_check(&self, status: &str) {
        self.fact_checks.with_label_values(&[status]).inc();
    }

    pub fn record_ground_truth(&self, found: bool) {
        let status = if found { "found" } else { "error" };
        self.ground_truth_lookups.with_label_values(&[status]).inc();
    }

    pub fn record_confidence(&self, score: f64) {
        self.confidence.observe(score);
    }

    pub fn record_llm_request(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.llm_requests.with_label_values(&[status]).inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Helper macro to time operations
#[macro_export]
macro_rules! time_stage {
    ($stage:expr, $operation:expr) => {{
        let timer = $crate::metrics::METRICS
            .stage_duration
            .with_label_values(&[$stage])
            .start_timer();
        let result = $operation;
        timer.observe_duration();
        result
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_export_contains_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_query_attempt("empty");
        metrics.record_fact_check("verified");
        metrics.record_confidence(0.9);

        let text = metrics.export_prometheus();
        assert!(text.contains("query_attempts_total"));
        assert!(text.contains("outcome=\"empty\""));
        assert!(text.contains("fact_checks_total"));
        assert!(text.contains("verification_confidence"));
    }

    #[tokio::test]
    async fn test_time_stage_returns_value() {
        let value = time_stage!("test", async { 42 }.await);
        assert_eq!(value, 42);
    }
}
