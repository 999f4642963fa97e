use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! sid_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(sid: impl Into<String>) -> Self {
                $name(sid.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

sid_type!(
    /// Identifier of a dispatched message.
    MessageSid
);
sid_type!(
    /// Identifier of a proxy session.
    SessionSid
);
sid_type!(
    /// Identifier of a hosted conversation.
    ConversationSid
);
sid_type!(
    /// Identifier of a session or conversation participant.
    ParticipantSid
);

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResource {
    pub sid: MessageSid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionResource {
    pub sid: SessionSid,
}

/// Participant registered against a proxy session. `proxy_identifier` is the
/// masking number the platform allocated for this party.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyParticipant {
    pub sid: ParticipantSid,
    pub identifier: String,
    pub proxy_identifier: String,
    pub friendly_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationResource {
    pub sid: ConversationSid,
}

/// Real/masked address pair binding a conversation participant to SMS.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingBinding {
    pub address: String,
    pub proxy_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationParticipant {
    pub sid: ParticipantSid,
    pub identity: Option<String>,
    pub messaging_binding: Option<MessagingBinding>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ParticipantPage {
    pub participants: Vec<ConversationParticipant>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ConversationPage {
    pub conversations: Vec<ConversationResource>,
}
