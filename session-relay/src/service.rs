use crate::api::SessionRelayState;
use crate::metrics_defs::{
    MESSAGES_FORWARDED, SESSION_ROLLBACKS, SESSIONS_ENDED, SESSIONS_STARTED,
};
use crate::store::SessionPair;
use messaging::MessagingError;
use messaging::types::{MessageSid, SessionSid};
use shared::counter;
use shared::party::{PhoneNumber, Role};

pub(crate) struct StartedSession {
    pub session_sid: SessionSid,
    pub client_proxy_number: String,
    pub content_producer_proxy_number: String,
}

/// Creates a platform session and registers the two configured parties.
///
/// Registration failures leave an under-populated session on the platform, so
/// the session is deleted again (best effort) before the error is surfaced.
pub(crate) async fn start_session(
    state: &SessionRelayState,
) -> Result<StartedSession, MessagingError> {
    let session = state.client.create_session().await?;
    tracing::info!(session = %session.sid, "proxy session created");

    let (client_part, producer_part) = tokio::join!(
        state
            .client
            .add_participant(&session.sid, &state.client_number, Role::Client.as_str()),
        state.client.add_participant(
            &session.sid,
            &state.content_producer_number,
            Role::ContentProducer.as_str(),
        ),
    );

    let registration = match (client_part, producer_part) {
        (Ok(client_part), Ok(producer_part)) => Ok((client_part, producer_part)),
        (Err(err), _) | (_, Err(err)) => Err(err),
    };

    match registration {
        Ok((client_part, producer_part)) => {
            state
                .index
                .insert(
                    session.sid.clone(),
                    SessionPair {
                        client: state.client_number.clone(),
                        content_producer: state.content_producer_number.clone(),
                    },
                )
                .await;
            counter!(SESSIONS_STARTED).increment(1);
            Ok(StartedSession {
                session_sid: session.sid,
                client_proxy_number: client_part.proxy_identifier,
                content_producer_proxy_number: producer_part.proxy_identifier,
            })
        }
        Err(err) => {
            counter!(SESSION_ROLLBACKS).increment(1);
            if let Err(cleanup_err) = state.client.delete_session(&session.sid).await {
                tracing::warn!(
                    session = %session.sid,
                    error = %cleanup_err,
                    "could not delete session after registration failure"
                );
            }
            Err(err)
        }
    }
}

pub(crate) async fn end_session(
    state: &SessionRelayState,
    sid: &SessionSid,
) -> Result<(), MessagingError> {
    state.client.delete_session(sid).await?;
    state.index.remove(sid).await;
    counter!(SESSIONS_ENDED).increment(1);
    tracing::info!(session = %sid, "proxy session ended");
    Ok(())
}

/// Forwards an inbound message to the sender's counterpart, or reports that
/// no stored session contains the sender.
pub(crate) async fn forward_incoming(
    state: &SessionRelayState,
    from: &PhoneNumber,
    body: &str,
) -> Result<Option<MessageSid>, MessagingError> {
    let Some((sid, pair)) = state.index.find_by_member(from).await else {
        return Ok(None);
    };
    // find_by_member only returns pairs containing `from`
    let Some(counterpart) = pair.counterpart(from) else {
        return Ok(None);
    };

    let message = state
        .client
        .send_message(&state.outbound_number, counterpart, body)
        .await?;
    counter!(MESSAGES_FORWARDED).increment(1);
    tracing::debug!(session = %sid, message = %message.sid, "inbound message forwarded");
    Ok(Some(message.sid))
}
