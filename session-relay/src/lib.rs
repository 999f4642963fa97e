//! Proxy-session relay.
//!
//! Asks the platform for a stateful session, registers the two configured
//! parties against it and hands their platform-allocated masking numbers back
//! to the caller. Inbound webhook messages are matched to a session through a
//! volatile in-memory index and forwarded to the counterpart party.

pub mod api;
pub mod metrics_defs;
mod service;
pub mod store;

use messaging::{MessagingClient, MessagingError, PlatformConfig};
use serde::Deserialize;
use shared::admin_service::AdminService;
use shared::http::{Listener, run_http_service};
use shared::party::PhoneNumber;
use std::sync::Arc;
use store::InMemorySessionIndex;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum SessionRelayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    #[serde(default = "default_admin_listener")]
    pub admin_listener: Listener,
    /// Real numbers of the two parties registered on session start.
    pub client_number: PhoneNumber,
    pub content_producer_number: PhoneNumber,
    /// Shared masking number inbound forwards are sent from.
    pub outbound_number: PhoneNumber,
}

fn default_admin_listener() -> Listener {
    Listener::localhost(3001)
}

pub async fn run(config: Config, platform: &PlatformConfig) -> Result<(), SessionRelayError> {
    let client = MessagingClient::new(platform)?;
    let state = api::SessionRelayState::new(
        client,
        config.client_number.clone(),
        config.content_producer_number.clone(),
        config.outbound_number.clone(),
        Arc::new(InMemorySessionIndex::new()),
    );
    let app = api::router(state);

    let listener = TcpListener::bind(format!(
        "{}:{}",
        config.listener.host, config.listener.port
    ))
    .await?;
    tracing::info!(host = %config.listener.host, port = config.listener.port, "session relay listening");

    let api_task = async { axum::serve(listener, app).await };
    let admin_task = run_http_service::<_, SessionRelayError>(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new("session-relay", || true),
    );

    tokio::select! {
        result = api_task => result?,
        result = admin_task => result?,
    }
    Ok(())
}
