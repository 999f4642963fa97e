use shared::metrics_defs::{MetricDef, MetricType};

pub const CONVERSATIONS_STARTED: MetricDef = MetricDef {
    name: "conversation_relay.conversations.started",
    metric_type: MetricType::Counter,
    description: "Conversations created with both participants bound",
};

pub const CONVERSATION_ROLLBACKS: MetricDef = MetricDef {
    name: "conversation_relay.conversations.rolled_back",
    metric_type: MetricType::Counter,
    description: "Conversations deleted after a participant binding failed",
};

pub const MESSAGES_POSTED: MetricDef = MetricDef {
    name: "conversation_relay.messages.posted",
    metric_type: MetricType::Counter,
    description: "Inbound messages posted into a conversation",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CONVERSATIONS_STARTED,
    CONVERSATION_ROLLBACKS,
    MESSAGES_POSTED,
];
