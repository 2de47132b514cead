use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounter,
    pub order_transitions_total: IntCounterVec,
    pub transition_latency_seconds: HistogramVec,
    pub broadcast_deliveries_total: IntCounterVec,
    pub ws_sessions_active: IntGaugeVec,
    pub otp_requests_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("orders_created_total", "Total orders placed")
                .expect("valid orders_created_total metric");

        let order_transitions_total = IntCounterVec::new(
            Opts::new(
                "order_transitions_total",
                "Order status transitions by requested status and outcome",
            ),
            &["status", "outcome"],
        )
        .expect("valid order_transitions_total metric");

        let transition_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "transition_latency_seconds",
                "Latency of order status transitions in seconds",
            ),
            &["outcome"],
        )
        .expect("valid transition_latency_seconds metric");

        let broadcast_deliveries_total = IntCounterVec::new(
            Opts::new(
                "broadcast_deliveries_total",
                "Events handed to live sessions, by group kind",
            ),
            &["group"],
        )
        .expect("valid broadcast_deliveries_total metric");

        let ws_sessions_active = IntGaugeVec::new(
            Opts::new("ws_sessions_active", "Currently open websocket sessions"),
            &["channel"],
        )
        .expect("valid ws_sessions_active metric");

        let otp_requests_total = IntCounterVec::new(
            Opts::new("otp_requests_total", "OTP issue and verify attempts by outcome"),
            &["outcome"],
        )
        .expect("valid otp_requests_total metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(transition_latency_seconds.clone()))
            .expect("register transition_latency_seconds");
        registry
            .register(Box::new(broadcast_deliveries_total.clone()))
            .expect("register broadcast_deliveries_total");
        registry
            .register(Box::new(ws_sessions_active.clone()))
            .expect("register ws_sessions_active");
        registry
            .register(Box::new(otp_requests_total.clone()))
            .expect("register otp_requests_total");

        Self {
            registry,
            orders_created_total,
            order_transitions_total,
            transition_latency_seconds,
            broadcast_deliveries_total,
            ws_sessions_active,
            otp_requests_total,
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

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
