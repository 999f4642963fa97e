use crate::service;
use crate::store::SessionIndex;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use messaging::types::SessionSid;
use messaging::{MessagingClient, MessagingError};
use serde::{Deserialize, Serialize};
use shared::party::PhoneNumber;
use std::sync::Arc;

#[derive(Clone)]
pub struct SessionRelayState {
    pub(crate) client: MessagingClient,
    pub(crate) client_number: PhoneNumber,
    pub(crate) content_producer_number: PhoneNumber,
    pub(crate) outbound_number: PhoneNumber,
    pub(crate) index: Arc<dyn SessionIndex>,
}

impl SessionRelayState {
    pub fn new(
        client: MessagingClient,
        client_number: PhoneNumber,
        content_producer_number: PhoneNumber,
        outbound_number: PhoneNumber,
        index: Arc<dyn SessionIndex>,
    ) -> Self {
        SessionRelayState {
            client,
            client_number,
            content_producer_number,
            outbound_number,
            index,
        }
    }
}

pub fn router(state: SessionRelayState) -> Router {
    Router::new()
        .route("/start-session", post(start_session))
        .route("/end-session", post(end_session))
        .route("/incoming", post(incoming))
        .with_state(state)
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Session SID required.")]
    MissingSessionSid,

    #[error("Missing required fields: From, Body.")]
    MissingWebhookFields,

    #[error("No active session for this sender.")]
    UnknownSession,

    #[error("{0}")]
    Platform(#[from] MessagingError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingSessionSid | ApiError::MissingWebhookFields => {
                StatusCode::BAD_REQUEST
            }
            ApiError::UnknownSession => StatusCode::NOT_FOUND,
            ApiError::Platform(MessagingError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Platform(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionResponse {
    message: &'static str,
    session_sid: SessionSid,
    client_proxy_number: String,
    content_producer_proxy_number: String,
}

async fn start_session(
    State(state): State<SessionRelayState>,
) -> Result<Json<StartSessionResponse>, ApiError> {
    let started = service::start_session(&state).await?;
    Ok(Json(StartSessionResponse {
        message: "Session started successfully.",
        session_sid: started.session_sid,
        client_proxy_number: started.client_proxy_number,
        content_producer_proxy_number: started.content_producer_proxy_number,
    }))
}

#[derive(Debug, Deserialize)]
struct EndSessionRequest {
    #[serde(rename = "sessionSid")]
    session_sid: Option<String>,
}

async fn end_session(
    State(state): State<SessionRelayState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    // An absent or malformed body is the same client error as a missing sid
    let sid = serde_json::from_slice::<EndSessionRequest>(&body)
        .ok()
        .and_then(|request| request.session_sid)
        .filter(|sid| !sid.is_empty())
        .ok_or(ApiError::MissingSessionSid)?;

    service::end_session(&state, &SessionSid::new(sid)).await?;
    Ok("Session ended.")
}

#[derive(Debug, Deserialize)]
struct IncomingRequest {
    #[serde(rename = "From")]
    from: Option<String>,
    #[serde(rename = "Body")]
    body: Option<String>,
}

async fn incoming(
    State(state): State<SessionRelayState>,
    Json(request): Json<IncomingRequest>,
) -> Result<&'static str, ApiError> {
    let (Some(from), Some(body)) = (request.from, request.body) else {
        return Err(ApiError::MissingWebhookFields);
    };
    let from = PhoneNumber::new(&from).map_err(|_| ApiError::UnknownSession)?;

    match service::forward_incoming(&state, &from, &body).await? {
        Some(_) => Ok("Message forwarded."),
        None => Err(ApiError::UnknownSession),
    }
}
