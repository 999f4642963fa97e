use crate::api::{ApiError, ConversationRelayState};
use crate::metrics_defs::{CONVERSATION_ROLLBACKS, CONVERSATIONS_STARTED, MESSAGES_POSTED};
use messaging::types::{ConversationSid, MessageSid};
use shared::counter;
use shared::party::PhoneNumber;

pub(crate) const CLIENT_IDENTITY: &str = "client";
pub(crate) const PRODUCER_IDENTITY: &str = "content-producer";

/// Creates a conversation and binds both parties behind the shared masking
/// number, with a per-party identity string. A failed binding deletes the
/// half-built conversation again (best effort) before the error surfaces.
pub(crate) async fn start_conversation(
    state: &ConversationRelayState,
    client_phone: &PhoneNumber,
    producer_phone: &PhoneNumber,
) -> Result<ConversationSid, ApiError> {
    let conversation = state
        .client
        .create_conversation("Client / Content Producer")
        .await?;
    tracing::info!(conversation = %conversation.sid, "conversation created");

    let (client_binding, producer_binding) = tokio::join!(
        state.client.add_conversation_participant(
            &conversation.sid,
            client_phone,
            &state.proxy_number,
            Some(CLIENT_IDENTITY),
        ),
        state.client.add_conversation_participant(
            &conversation.sid,
            producer_phone,
            &state.proxy_number,
            Some(PRODUCER_IDENTITY),
        ),
    );

    let registration = match (client_binding, producer_binding) {
        (Ok(_), Ok(_)) => Ok(()),
        (Err(err), _) | (_, Err(err)) => Err(err),
    };

    match registration {
        Ok(()) => {
            counter!(CONVERSATIONS_STARTED).increment(1);
            Ok(conversation.sid)
        }
        Err(err) => {
            counter!(CONVERSATION_ROLLBACKS).increment(1);
            if let Err(cleanup_err) = state.client.delete_conversation(&conversation.sid).await {
                tracing::warn!(
                    conversation = %conversation.sid,
                    error = %cleanup_err,
                    "could not delete conversation after binding failure"
                );
            }
            Err(err.into())
        }
    }
}

/// Resolves the sender's identity within a conversation from its participant
/// bindings. Conversations that do not hold exactly two participants are
/// refused rather than guessing a recipient.
pub(crate) async fn sender_identity(
    state: &ConversationRelayState,
    conversation: &ConversationSid,
    from: &PhoneNumber,
) -> Result<String, ApiError> {
    let participants = state.client.list_participants(conversation).await?;
    if participants.len() != 2 {
        return Err(ApiError::UnsupportedGroupSize);
    }

    let participant = participants
        .iter()
        .find(|participant| {
            participant
                .messaging_binding
                .as_ref()
                .is_some_and(|binding| binding.address == from.as_str())
        })
        .ok_or(ApiError::UnknownParticipant)?;

    Ok(participant
        .identity
        .clone()
        .unwrap_or_else(|| from.as_str().to_string()))
}

/// Scans the service's conversations for the one that binds `from`.
pub(crate) async fn find_conversation_for(
    state: &ConversationRelayState,
    from: &PhoneNumber,
) -> Result<ConversationSid, ApiError> {
    for conversation in state.client.list_conversations().await? {
        let participants = state.client.list_participants(&conversation.sid).await?;
        let binds_sender = participants.iter().any(|participant| {
            participant
                .messaging_binding
                .as_ref()
                .is_some_and(|binding| binding.address == from.as_str())
        });
        if binds_sender {
            return Ok(conversation.sid);
        }
    }
    Err(ApiError::UnknownConversation)
}

pub(crate) async fn post_message(
    state: &ConversationRelayState,
    conversation: &ConversationSid,
    author: &str,
    body: &str,
) -> Result<MessageSid, ApiError> {
    let message = state
        .client
        .post_conversation_message(conversation, author, body)
        .await?;
    counter!(MESSAGES_POSTED).increment(1);
    tracing::debug!(conversation = %conversation, message = %message.sid, "message posted");
    Ok(message.sid)
}
