use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tracing::warn;

lazy_static! {
    pub static ref NOTIFICATIONS_SENT: IntCounterVec = IntCounterVec::new(
        Opts::new("policy_watcher_notifications_sent", "Notifications published, by send tier"),
        &["tier"]
    )
    .expect("metric can not be created");

    pub static ref PUBLISH_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("policy_watcher_publish_failures", "Notifications the transport refused"),
        &["method"]
    )
    .expect("metric can not be created");

    pub static ref NOTIFICATIONS_RECEIVED: IntCounterVec = IntCounterVec::new(
        Opts::new("policy_watcher_notifications_received", "Notifications received, by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref NOTIFICATIONS_DROPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("policy_watcher_notifications_dropped", "Notifications dropped on receive, by reason"),
        &["reason"]
    )
    .expect("metric can not be created");

    pub static ref APPLY_RESULTS: IntCounterVec = IntCounterVec::new(
        Opts::new("policy_watcher_apply_results", "Remote diffs replayed locally, by result"),
        &["method", "result"]
    )
    .expect("metric can not be created");

    pub static ref PAYLOAD_SIZE_IN_BYTES: HistogramVec = HistogramVec::new(
        HistogramOpts::new("policy_watcher_payload_size", "Serialized notification size in bytes")
            .buckets(exponential_buckets(64.0, 2.0, 14).expect("valid buckets")),
        &["tier"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        registry.register(Box::new(NOTIFICATIONS_SENT.clone())).expect("collector can be registered");
        registry.register(Box::new(PUBLISH_FAILURES.clone())).expect("collector can be registered");
        registry.register(Box::new(NOTIFICATIONS_RECEIVED.clone())).expect("collector can be registered");
        registry.register(Box::new(NOTIFICATIONS_DROPPED.clone())).expect("collector can be registered");
        registry.register(Box::new(APPLY_RESULTS.clone())).expect("collector can be registered");
        registry.register(Box::new(PAYLOAD_SIZE_IN_BYTES.clone())).expect("collector can be registered");
        registry
    };
}

/// Text exposition of the watcher metrics, for the host's metrics endpoint.
pub fn render() -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode watcher metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
