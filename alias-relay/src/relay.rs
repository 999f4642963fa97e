use crate::api::AliasRelayState;
use crate::metrics_defs::{BROADCAST_RECIPIENTS, MESSAGES_SENT, SEND_FAILURES};
use messaging::MessagingError;
use shared::party::{PhoneNumber, Role};
use shared::{counter, histogram};
use tokio::task::JoinSet;

/// Sends `message` to every target through the shared masking number, with
/// the sender's role name prefixed so recipients know who is speaking.
///
/// All sends run concurrently. The first failure decides the result, but only
/// after every task settles; sends already accepted by the platform stand.
pub(crate) async fn broadcast(
    state: &AliasRelayState,
    sender: Role,
    targets: Vec<(Role, PhoneNumber)>,
    message: &str,
) -> Result<usize, MessagingError> {
    let body = format!("{sender}: {message}");
    histogram!(BROADCAST_RECIPIENTS).record(targets.len() as f64);

    let mut join_set = JoinSet::new();
    for (role, to) in targets {
        let client = state.client.clone();
        let from = state.outbound_number.clone();
        let body = body.clone();
        join_set.spawn(async move {
            let result = client.send_message(&from, &to, &body).await;
            (role, result)
        });
    }

    let mut sent = 0usize;
    let mut first_failure: Option<MessagingError> = None;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((_, Ok(_))) => {
                sent += 1;
                counter!(MESSAGES_SENT).increment(1);
            }
            Ok((role, Err(err))) => {
                counter!(SEND_FAILURES).increment(1);
                tracing::warn!(role = %role, error = %err, "platform send failed");
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
            Err(join_err) => {
                counter!(SEND_FAILURES).increment(1);
                tracing::error!(error = %join_err, "send task aborted");
                if first_failure.is_none() {
                    first_failure = Some(MessagingError::Api {
                        status: 500,
                        message: format!("send task aborted: {join_err}"),
                    });
                }
            }
        }
    }

    match first_failure {
        None => Ok(sent),
        Some(err) => Err(err),
    }
}
