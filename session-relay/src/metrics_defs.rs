use shared::metrics_defs::{MetricDef, MetricType};

pub const SESSIONS_STARTED: MetricDef = MetricDef {
    name: "session_relay.sessions.started",
    metric_type: MetricType::Counter,
    description: "Proxy sessions created with both participants registered",
};

pub const SESSION_ROLLBACKS: MetricDef = MetricDef {
    name: "session_relay.sessions.rolled_back",
    metric_type: MetricType::Counter,
    description: "Sessions deleted after a participant registration failed",
};

pub const SESSIONS_ENDED: MetricDef = MetricDef {
    name: "session_relay.sessions.ended",
    metric_type: MetricType::Counter,
    description: "Sessions deleted on request",
};

pub const MESSAGES_FORWARDED: MetricDef = MetricDef {
    name: "session_relay.messages.forwarded",
    metric_type: MetricType::Counter,
    description: "Inbound messages forwarded to the counterpart party",
};

pub const ALL_METRICS: &[MetricDef] = &[
    SESSIONS_STARTED,
    SESSION_ROLLBACKS,
    SESSIONS_ENDED,
    MESSAGES_FORWARDED,
];
