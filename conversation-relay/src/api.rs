use crate::service;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use messaging::types::{ConversationSid, MessageSid};
use messaging::{MessagingClient, MessagingError};
use serde::{Deserialize, Serialize};
use shared::party::{PartyError, PhoneNumber};

#[derive(Clone)]
pub struct ConversationRelayState {
    pub(crate) client: MessagingClient,
    /// Shared masking number used as every participant's proxy address.
    pub(crate) proxy_number: PhoneNumber,
}

impl ConversationRelayState {
    pub fn new(client: MessagingClient, proxy_number: PhoneNumber) -> Self {
        ConversationRelayState {
            client,
            proxy_number,
        }
    }
}

pub fn router(state: ConversationRelayState) -> Router {
    Router::new()
        .route("/start-conversation", post(start_conversation))
        .route("/incoming", post(incoming))
        .route("/incoming-message", post(incoming_message))
        .with_state(state)
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Missing required fields: clientPhone, contentProducerPhone.")]
    MissingConversationFields,

    #[error("Missing required fields: From, Body, ConversationSid.")]
    MissingWebhookFields,

    #[error("Missing required fields: From, To, Body.")]
    MissingForwardFields,

    #[error("Sender is not a participant in this conversation.")]
    UnknownParticipant,

    #[error("No conversation found for this sender.")]
    UnknownConversation,

    #[error("Conversation does not have exactly two participants.")]
    UnsupportedGroupSize,

    #[error("{0}")]
    Party(#[from] PartyError),

    #[error("{0}")]
    Platform(#[from] MessagingError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingConversationFields
            | ApiError::MissingWebhookFields
            | ApiError::MissingForwardFields
            | ApiError::UnknownParticipant
            | ApiError::Party(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownConversation => StatusCode::NOT_FOUND,
            ApiError::UnsupportedGroupSize => StatusCode::CONFLICT,
            ApiError::Platform(MessagingError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Platform(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct StartConversationRequest {
    #[serde(rename = "clientPhone", alias = "clientNumber")]
    client_phone: Option<String>,
    #[serde(rename = "contentProducerPhone", alias = "contentProducerNumber")]
    content_producer_phone: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartConversationResponse {
    conversation_sid: ConversationSid,
}

async fn start_conversation(
    State(state): State<ConversationRelayState>,
    Json(request): Json<StartConversationRequest>,
) -> Result<Json<StartConversationResponse>, ApiError> {
    let (Some(client_phone), Some(producer_phone)) =
        (request.client_phone, request.content_producer_phone)
    else {
        return Err(ApiError::MissingConversationFields);
    };
    let client_phone = PhoneNumber::new(&client_phone)?;
    let producer_phone = PhoneNumber::new(&producer_phone)?;

    let conversation_sid =
        service::start_conversation(&state, &client_phone, &producer_phone).await?;
    Ok(Json(StartConversationResponse { conversation_sid }))
}

#[derive(Debug, Deserialize)]
struct IncomingRequest {
    #[serde(rename = "From")]
    from: Option<String>,
    #[serde(rename = "Body")]
    body: Option<String>,
    #[serde(rename = "ConversationSid")]
    conversation_sid: Option<String>,
}

#[derive(Serialize)]
struct MessagePostedResponse {
    sid: MessageSid,
}

async fn incoming(
    State(state): State<ConversationRelayState>,
    Json(request): Json<IncomingRequest>,
) -> Result<Json<MessagePostedResponse>, ApiError> {
    let (Some(from), Some(body), Some(conversation_sid)) =
        (request.from, request.body, request.conversation_sid)
    else {
        return Err(ApiError::MissingWebhookFields);
    };
    let from = PhoneNumber::new(&from)?;
    let conversation = ConversationSid::new(conversation_sid);

    let author = service::sender_identity(&state, &conversation, &from).await?;
    let sid = service::post_message(&state, &conversation, &author, &body).await?;
    Ok(Json(MessagePostedResponse { sid }))
}

#[derive(Debug, Deserialize)]
struct IncomingMessageRequest {
    #[serde(rename = "From")]
    from: Option<String>,
    #[serde(rename = "To")]
    to: Option<String>,
    #[serde(rename = "Body")]
    body: Option<String>,
}

async fn incoming_message(
    State(state): State<ConversationRelayState>,
    Json(request): Json<IncomingMessageRequest>,
) -> Result<Json<MessagePostedResponse>, ApiError> {
    let (Some(from), Some(_to), Some(body)) = (request.from, request.to, request.body) else {
        return Err(ApiError::MissingForwardFields);
    };
    let from = PhoneNumber::new(&from)?;

    let conversation = service::find_conversation_for(&state, &from).await?;
    let author = service::sender_identity(&state, &conversation, &from).await?;
    let sid = service::post_message(&state, &conversation, &author, &body).await?;
    Ok(Json(MessagePostedResponse { sid }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use messaging::PlatformConfig;
    use messaging::testutils::MockPlatform;
    use serde_json::{Value, json};
    use tower::util::ServiceExt;

    const CLIENT_PHONE: &str = "+15550000002";
    const PRODUCER_PHONE: &str = "+15550000001";
    const PROXY_NUMBER: &str = "+15559990000";

    async fn test_setup() -> (MockPlatform, MessagingClient, Router) {
        let mock = MockPlatform::spawn().await;
        let config = PlatformConfig {
            account_sid: "AC0123456789".into(),
            auth_token: "token".into(),
            proxy_service_sid: None,
            conversations_service_sid: Some("IS0123456789".into()),
            api_base_url: mock.base_url(),
            proxy_base_url: mock.base_url(),
            conversations_base_url: mock.base_url(),
        };
        let client = MessagingClient::new(&config).unwrap();
        let state = ConversationRelayState::new(client.clone(), PROXY_NUMBER.parse().unwrap());
        (mock, client, router(state))
    }

    async fn post(router: &Router, path: &str, body: Value) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn started_conversation(router: &Router) -> String {
        let (status, body) = post(
            router,
            "/start-conversation",
            json!({ "clientPhone": CLIENT_PHONE, "contentProducerPhone": PRODUCER_PHONE }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let parsed: Value = serde_json::from_str(&body).unwrap();
        parsed["conversationSid"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn start_conversation_binds_both_parties_behind_the_proxy_number() {
        let (mock, _, router) = test_setup().await;

        let sid = started_conversation(&router).await;
        assert!(sid.starts_with("CH"));

        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        let bindings: Vec<(&str, &str, &str)> = requests[1..]
            .iter()
            .map(|request| {
                (
                    request.param("MessagingBinding.Address").unwrap(),
                    request.param("MessagingBinding.ProxyAddress").unwrap(),
                    request.param("Identity").unwrap(),
                )
            })
            .collect();
        assert!(bindings.contains(&(CLIENT_PHONE, PROXY_NUMBER, "client")));
        assert!(bindings.contains(&(PRODUCER_PHONE, PROXY_NUMBER, "content-producer")));
    }

    #[tokio::test]
    async fn start_conversation_requires_both_numbers() {
        let (mock, _, router) = test_setup().await;

        let (status, body) = post(
            &router,
            "/start-conversation",
            json!({ "clientPhone": CLIENT_PHONE }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Missing required fields"));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn start_conversation_accepts_the_number_field_aliases() {
        let (mock, _, router) = test_setup().await;

        let (status, _) = post(
            &router,
            "/start-conversation",
            json!({ "clientNumber": CLIENT_PHONE, "contentProducerNumber": PRODUCER_PHONE }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn failed_binding_rolls_the_conversation_back() {
        let (mock, _, router) = test_setup().await;
        mock.fail_nth(2, 400, "Binding rejected");

        let (status, body) = post(
            &router,
            "/start-conversation",
            json!({ "clientPhone": CLIENT_PHONE, "contentProducerPhone": PRODUCER_PHONE }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Binding rejected"));

        let requests = mock.requests();
        let last = requests.last().unwrap();
        assert_eq!(last.method, "DELETE");
        assert!(last.path.contains("/Conversations/"));
    }

    #[tokio::test]
    async fn incoming_posts_into_the_conversation_as_the_sender_identity() {
        let (mock, _, router) = test_setup().await;
        let sid = started_conversation(&router).await;

        let (status, body) = post(
            &router,
            "/incoming",
            json!({ "From": CLIENT_PHONE, "Body": "new brief attached", "ConversationSid": sid }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert!(parsed["sid"].as_str().unwrap().starts_with("IM"));

        let requests = mock.requests();
        let last = requests.last().unwrap();
        assert!(last.path.ends_with(&format!("/Conversations/{sid}/Messages")));
        assert_eq!(last.param("Author"), Some("client"));
        assert_eq!(last.param("Body"), Some("new brief attached"));
    }

    #[tokio::test]
    async fn incoming_rejects_unknown_conversations() {
        let (mock, _, router) = test_setup().await;
        started_conversation(&router).await;
        let calls_before = mock.request_count();

        let (status, _) = post(
            &router,
            "/incoming",
            json!({ "From": CLIENT_PHONE, "Body": "hi", "ConversationSid": "CH_missing" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        // Only the participant listing was attempted
        assert_eq!(mock.request_count(), calls_before + 1);
    }

    #[tokio::test]
    async fn incoming_rejects_senders_outside_the_conversation() {
        let (_, _, router) = test_setup().await;
        let sid = started_conversation(&router).await;

        let (status, body) = post(
            &router,
            "/incoming",
            json!({ "From": "+15557776666", "Body": "hi", "ConversationSid": sid }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("not a participant"));
    }

    #[tokio::test]
    async fn incoming_message_finds_the_conversation_by_sender_address() {
        let (mock, _, router) = test_setup().await;
        let sid = started_conversation(&router).await;

        let (status, _) = post(
            &router,
            "/incoming-message",
            json!({ "From": PRODUCER_PHONE, "To": PROXY_NUMBER, "Body": "done, take a look" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let requests = mock.requests();
        let last = requests.last().unwrap();
        assert!(last.path.ends_with(&format!("/Conversations/{sid}/Messages")));
        assert_eq!(last.param("Author"), Some("content-producer"));
    }

    #[tokio::test]
    async fn incoming_message_for_unknown_sender_is_not_found() {
        let (_, _, router) = test_setup().await;
        started_conversation(&router).await;

        let (status, body) = post(
            &router,
            "/incoming-message",
            json!({ "From": "+15557776666", "To": PROXY_NUMBER, "Body": "hi" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("No conversation found"));
    }

    #[tokio::test]
    async fn oversized_conversations_are_refused() {
        let (_, client, router) = test_setup().await;
        let sid = started_conversation(&router).await;

        // Bind a third participant directly, bypassing the relay
        client
            .add_conversation_participant(
                &ConversationSid::new(sid.clone()),
                &"+15553332222".parse().unwrap(),
                &PROXY_NUMBER.parse().unwrap(),
                Some("observer"),
            )
            .await
            .unwrap();

        let (status, body) = post(
            &router,
            "/incoming",
            json!({ "From": CLIENT_PHONE, "Body": "hi", "ConversationSid": sid }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.contains("exactly two participants"));
    }
}
