use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref SILENCES_SEEN_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "intelligence_silences_seen_total",
            "Silence records seen across all silence table rebuilds, by state."
        ),
        &["state"]
    )
    .expect("valid silences_seen_total metric");
    pub static ref ALERTS_SUPPRESSED_TOTAL: IntCounter = IntCounter::new(
        "intelligence_alerts_suppressed_total",
        "Alerts dropped by the preprocessor because an active silence covers them."
    )
    .expect("valid alerts_suppressed_total metric");
    pub static ref ANNOTATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "intelligence_annotations_total",
            "Annotation pushes to Grafana, by outcome."
        ),
        &["outcome"]
    )
    .expect("valid annotations_total metric");
    pub static ref EVENTS_PROCESSED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "intelligence_events_processed_total",
            "Alert events received by each pipeline stage."
        ),
        &["stage"]
    )
    .expect("valid events_processed_total metric");
}

/// Registers every pipeline metric with [`REGISTRY`]. Call once at startup.
pub fn register_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(SILENCES_SEEN_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ALERTS_SUPPRESSED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ANNOTATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EVENTS_PROCESSED_TOTAL.clone()))?;
    Ok(())
}

// Function to gather metrics for exposition
pub fn gather_metrics() -> crate::Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::Error::Internal(format!("failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::Error::Internal(format!("metrics are not UTF-8: {}", e)))
}
