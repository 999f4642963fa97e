use shared::metrics_defs::{MetricDef, MetricType};

pub const MESSAGES_SENT: MetricDef = MetricDef {
    name: "alias_relay.messages.sent",
    metric_type: MetricType::Counter,
    description: "Outbound platform sends accepted by the platform",
};

pub const SEND_FAILURES: MetricDef = MetricDef {
    name: "alias_relay.sends.failed",
    metric_type: MetricType::Counter,
    description: "Platform sends that were rejected or errored",
};

pub const BROADCAST_RECIPIENTS: MetricDef = MetricDef {
    name: "alias_relay.broadcast.recipients",
    metric_type: MetricType::Histogram,
    description: "Recipients per relayed request",
};

pub const ALL_METRICS: &[MetricDef] = &[MESSAGES_SENT, SEND_FAILURES, BROADCAST_RECIPIENTS];
