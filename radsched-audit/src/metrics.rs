use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Prometheus metrics for the scheduling core.
///
/// Counters and histograms are deliberately unlabeled by anything
/// PHI-bearing (no phone number, no patient identifier) — only
/// organization_id, state names, modality, and provider names, which are
/// operational metadata rather than patient data.
pub struct SchedulerMetrics {
    registry: Registry,

    /// Orders ingested, by modality.
    pub orders_received_total: IntCounterVec,

    /// Conversation state transitions, by from/to state.
    pub state_transitions_total: IntCounterVec,

    /// SMS send attempts, by provider and message_type, split by outcome.
    pub sms_sent_total: IntCounterVec,

    /// IE REST call latency, by operation (locations/slot_request/book).
    pub ie_request_duration: HistogramVec,

    /// Inbound webhook handling latency, by route.
    pub webhook_duration: HistogramVec,

    /// Sweep/monitor loop runs, by sweep name.
    pub sweep_runs_total: IntCounterVec,

    /// Conversations currently in a non-terminal state.
    pub conversations_active: IntGauge,
}

impl SchedulerMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_received_total = IntCounterVec::new(
            Opts::new("radsched_orders_received_total", "Orders ingested").namespace("radsched"),
            &["modality"],
        )?;

        let state_transitions_total = IntCounterVec::new(
            Opts::new("radsched_state_transitions_total", "Conversation state transitions").namespace("radsched"),
            &["from_state", "to_state"],
        )?;

        let sms_sent_total = IntCounterVec::new(
            Opts::new("radsched_sms_sent_total", "SMS send attempts").namespace("radsched"),
            &["provider", "message_type", "outcome"],
        )?;

        let ie_request_duration = HistogramVec::new(
            HistogramOpts::new("radsched_ie_request_duration_seconds", "IE REST call latency")
                .namespace("radsched")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["operation"],
        )?;

        let webhook_duration = HistogramVec::new(
            HistogramOpts::new("radsched_webhook_duration_seconds", "Inbound webhook handling latency")
                .namespace("radsched")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["route"],
        )?;

        let sweep_runs_total = IntCounterVec::new(
            Opts::new("radsched_sweep_runs_total", "Background sweep/monitor loop runs").namespace("radsched"),
            &["sweep"],
        )?;

        let conversations_active =
            IntGauge::new("radsched_conversations_active", "Conversations in a non-terminal state")?;

        registry.register(Box::new(orders_received_total.clone()))?;
        registry.register(Box::new(state_transitions_total.clone()))?;
        registry.register(Box::new(sms_sent_total.clone()))?;
        registry.register(Box::new(ie_request_duration.clone()))?;
        registry.register(Box::new(webhook_duration.clone()))?;
        registry.register(Box::new(sweep_runs_total.clone()))?;
        registry.register(Box::new(conversations_active.clone()))?;

        Ok(Self {
            registry,
            orders_received_total,
            state_transitions_total,
            sms_sent_total,
            ie_request_duration,
            webhook_duration,
            sweep_runs_total,
            conversations_active,
        })
    }

    pub fn record_order_received(&self, modality: &str) {
        self.orders_received_total.with_label_values(&[modality]).inc();
    }

    pub fn record_state_transition(&self, from_state: &str, to_state: &str) {
        self.state_transitions_total.with_label_values(&[from_state, to_state]).inc();
    }

    pub fn record_sms_sent(&self, provider: &str, message_type: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.sms_sent_total.with_label_values(&[provider, message_type, outcome]).inc();
    }

    pub fn record_ie_request(&self, operation: &str, duration_secs: f64) {
        self.ie_request_duration.with_label_values(&[operation]).observe(duration_secs);
    }

    pub fn record_webhook(&self, route: &str, duration_secs: f64) {
        self.webhook_duration.with_label_values(&[route]).observe(duration_secs);
    }

    pub fn record_sweep_run(&self, sweep: &str) {
        self.sweep_runs_total.with_label_values(&[sweep]).inc();
    }

    /// Get Prometheus text exposition.
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let metrics = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metrics, &mut buffer).unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new().expect("failed to construct scheduler metrics registry")
    }
}
