use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub workflow_total: IntCounterVec,
    pub workflow_latency_seconds: HistogramVec,
    pub auth_rejections_total: IntCounterVec,
    pub log_subscribers: IntGauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let workflow_total = IntCounterVec::new(
            Opts::new("workflow_total", "Fleet workflows run, by workflow and outcome"),
            &["workflow", "outcome"],
        )
        .expect("valid workflow_total metric");

        let workflow_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "workflow_latency_seconds",
                "Latency of fleet workflows in seconds",
            ),
            &["workflow", "outcome"],
        )
        .expect("valid workflow_latency_seconds metric");

        let auth_rejections_total = IntCounterVec::new(
            Opts::new("auth_rejections_total", "Rejected API requests by reason"),
            &["reason"],
        )
        .expect("valid auth_rejections_total metric");

        let log_subscribers = IntGauge::new(
            "log_subscribers",
            "WebSocket clients following the log feed",
        )
        .expect("valid log_subscribers metric");

        registry
            .register(Box::new(workflow_total.clone()))
            .expect("register workflow_total");
        registry
            .register(Box::new(workflow_latency_seconds.clone()))
            .expect("register workflow_latency_seconds");
        registry
            .register(Box::new(auth_rejections_total.clone()))
            .expect("register auth_rejections_total");
        registry
            .register(Box::new(log_subscribers.clone()))
            .expect("register log_subscribers");

        Self {
            registry,
            workflow_total,
            workflow_latency_seconds,
            auth_rejections_total,
            log_subscribers,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
