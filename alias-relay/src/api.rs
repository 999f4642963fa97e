use crate::relay;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use indexmap::IndexMap;
use messaging::{MessagingClient, MessagingError};
use serde::Deserialize;
use shared::party::{Contacts, PartyError, PhoneNumber, Role};

#[derive(Clone)]
pub struct AliasRelayState {
    pub(crate) client: MessagingClient,
    pub(crate) outbound_number: PhoneNumber,
}

impl AliasRelayState {
    pub fn new(client: MessagingClient, outbound_number: PhoneNumber) -> Self {
        AliasRelayState {
            client,
            outbound_number,
        }
    }
}

pub fn router(state: AliasRelayState) -> Router {
    Router::new()
        .route("/messages", post(send_messages))
        .route("/incoming", post(incoming))
        .with_state(state)
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Contacts object must include 'Content Producer', 'Client', and 'Project Manager'.")]
    IncompleteContacts,

    #[error("Missing required fields: sender, recipients, message.")]
    MissingFields,

    #[error("Missing required fields: From, Body.")]
    MissingWebhookFields,

    #[error("Sender cannot be a recipient.")]
    SelfRecipient,

    #[error("Unknown sender.")]
    UnknownSender,

    #[error("{0}")]
    Party(#[from] PartyError),

    #[error("Error sending messages: {0}")]
    Send(#[from] MessagingError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Send(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SendMessagesRequest {
    sender: Option<String>,
    #[serde(default)]
    recipients: Vec<String>,
    message: Option<String>,
    contacts: Option<IndexMap<String, String>>,
}

async fn send_messages(
    State(state): State<AliasRelayState>,
    Json(request): Json<SendMessagesRequest>,
) -> Result<&'static str, ApiError> {
    let contacts = parse_contacts(request.contacts.as_ref())?;
    let (Some(sender), Some(message)) = (request.sender, request.message) else {
        return Err(ApiError::MissingFields);
    };
    if message.is_empty() || request.recipients.is_empty() {
        return Err(ApiError::MissingFields);
    }

    let sender: Role = sender.parse()?;
    let mut targets = Vec::with_capacity(request.recipients.len());
    for name in &request.recipients {
        let role: Role = name.parse()?;
        if role == sender {
            return Err(ApiError::SelfRecipient);
        }
        let number = contacts
            .get(role)
            .cloned()
            .ok_or(PartyError::MissingRole(role))?;
        targets.push((role, number));
    }

    relay::broadcast(&state, sender, targets, &message).await?;
    Ok("Messages sent!")
}

#[derive(Debug, Deserialize)]
pub struct IncomingRequest {
    #[serde(rename = "From")]
    from: Option<String>,
    #[serde(rename = "Body")]
    body: Option<String>,
    contacts: Option<IndexMap<String, String>>,
}

async fn incoming(
    State(state): State<AliasRelayState>,
    Json(request): Json<IncomingRequest>,
) -> Result<&'static str, ApiError> {
    let contacts = parse_contacts(request.contacts.as_ref())?;
    let (Some(from), Some(body)) = (request.from, request.body) else {
        return Err(ApiError::MissingWebhookFields);
    };
    if body.is_empty() {
        return Err(ApiError::MissingWebhookFields);
    }

    let from = PhoneNumber::new(&from).map_err(|_| ApiError::UnknownSender)?;
    let sender = contacts.role_of(&from).ok_or(ApiError::UnknownSender)?;
    let targets: Vec<(Role, PhoneNumber)> = contacts
        .others(sender)
        .map(|(role, number)| (role, number.clone()))
        .collect();

    relay::broadcast(&state, sender, targets, &body).await?;
    Ok("Message forwarded to group.")
}

fn parse_contacts(raw: Option<&IndexMap<String, String>>) -> Result<Contacts, ApiError> {
    let contacts = Contacts::try_from(raw.ok_or(ApiError::IncompleteContacts)?)?;
    contacts
        .require_all()
        .map_err(|_| ApiError::IncompleteContacts)?;
    Ok(contacts)
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

    async fn test_router() -> (MockPlatform, Router) {
        let mock = MockPlatform::spawn().await;
        let config = PlatformConfig {
            account_sid: "AC0123456789".into(),
            auth_token: "token".into(),
            proxy_service_sid: None,
            conversations_service_sid: None,
            api_base_url: mock.base_url(),
            proxy_base_url: mock.base_url(),
            conversations_base_url: mock.base_url(),
        };
        let client = MessagingClient::new(&config).unwrap();
        let state = AliasRelayState::new(client, "+15559990000".parse().unwrap());
        let router = router(state);
        (mock, router)
    }

    fn contacts_json() -> Value {
        json!({
            "Content Producer": "+15550000001",
            "Client": "+15550000002",
            "Project Manager": "+15550000003",
        })
    }

    async fn post_json(router: &Router, path: &str, body: Value) -> (StatusCode, String) {
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

    #[tokio::test]
    async fn broadcast_reaches_each_recipient_with_sender_prefix() {
        let (mock, router) = test_router().await;

        let (status, body) = post_json(
            &router,
            "/messages",
            json!({
                "sender": "Client",
                "recipients": ["Content Producer", "Project Manager"],
                "message": "hi",
                "contacts": contacts_json(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Messages sent!");

        let mut sends = mock.sent_messages();
        sends.sort_by(|a, b| a.to.cmp(&b.to));
        assert_eq!(sends.len(), 2);
        for send in &sends {
            assert_eq!(send.from, "+15559990000");
            assert_eq!(send.body, "Client: hi");
        }
        assert_eq!(sends[0].to, "+15550000001");
        assert_eq!(sends[1].to, "+15550000003");
    }

    #[tokio::test]
    async fn missing_contacts_is_rejected_without_platform_calls() {
        let (mock, router) = test_router().await;

        let (status, body) = post_json(
            &router,
            "/messages",
            json!({ "sender": "Client", "recipients": ["Project Manager"], "message": "hi" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Contacts object must include"));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn incomplete_contacts_is_rejected_without_platform_calls() {
        let (mock, router) = test_router().await;

        let (status, _) = post_json(
            &router,
            "/messages",
            json!({
                "sender": "Client",
                "recipients": ["Content Producer"],
                "message": "hi",
                "contacts": { "Client": "+15550000002" },
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn missing_message_is_rejected_without_platform_calls() {
        let (mock, router) = test_router().await;

        let (status, body) = post_json(
            &router,
            "/messages",
            json!({
                "sender": "Client",
                "recipients": ["Content Producer"],
                "contacts": contacts_json(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Missing required fields"));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn unknown_recipient_role_is_rejected_at_the_boundary() {
        let (mock, router) = test_router().await;

        let (status, body) = post_json(
            &router,
            "/messages",
            json!({
                "sender": "Client",
                "recipients": ["Producer"],
                "message": "hi",
                "contacts": contacts_json(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("unknown role"));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn sender_is_never_a_broadcast_target() {
        let (mock, router) = test_router().await;

        let (status, body) = post_json(
            &router,
            "/messages",
            json!({
                "sender": "Client",
                "recipients": ["Client", "Project Manager"],
                "message": "hi",
                "contacts": contacts_json(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Sender cannot be a recipient"));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn platform_failure_surfaces_as_server_error() {
        let (mock, router) = test_router().await;
        mock.fail_next(400, "The 'To' number is not a valid phone number.");

        let (status, body) = post_json(
            &router,
            "/messages",
            json!({
                "sender": "Client",
                "recipients": ["Content Producer"],
                "message": "hi",
                "contacts": contacts_json(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("The 'To' number is not a valid phone number."));
    }

    #[tokio::test]
    async fn inbound_message_fans_out_to_the_rest_of_the_group() {
        let (mock, router) = test_router().await;

        let (status, body) = post_json(
            &router,
            "/incoming",
            json!({
                "From": "+15550000002",
                "Body": "checking in",
                "contacts": contacts_json(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Message forwarded to group.");

        let sends = mock.sent_messages();
        assert_eq!(sends.len(), 2);
        for send in &sends {
            assert_eq!(send.body, "Client: checking in");
            assert_ne!(send.to, "+15550000002");
        }
    }

    #[tokio::test]
    async fn inbound_from_unknown_number_is_rejected() {
        let (mock, router) = test_router().await;

        let (status, body) = post_json(
            &router,
            "/incoming",
            json!({
                "From": "+15558887777",
                "Body": "hello?",
                "contacts": contacts_json(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Unknown sender.");
        assert_eq!(mock.request_count(), 0);
    }
}
