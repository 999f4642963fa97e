//! Alias-table relay.
//!
//! The caller supplies a role-to-address table with every request; the relay
//! resolves parties by role name and sends each message through the shared
//! masking number with the sender's role prefixed to the body, so recipients
//! see who is speaking without seeing their address.

pub mod api;
pub mod metrics_defs;
mod relay;

use messaging::{MessagingClient, MessagingError, PlatformConfig};
use serde::Deserialize;
use shared::admin_service::AdminService;
use shared::http::{Listener, run_http_service};
use shared::party::PhoneNumber;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum AliasRelayError {
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
    /// Shared masking number every relayed message is sent from.
    pub outbound_number: PhoneNumber,
}

fn default_admin_listener() -> Listener {
    Listener::localhost(3001)
}

pub async fn run(config: Config, platform: &PlatformConfig) -> Result<(), AliasRelayError> {
    let client = MessagingClient::new(platform)?;
    let state = api::AliasRelayState::new(client, config.outbound_number.clone());
    let app = api::router(state);

    let listener = TcpListener::bind(format!(
        "{}:{}",
        config.listener.host, config.listener.port
    ))
    .await?;
    tracing::info!(host = %config.listener.host, port = config.listener.port, "alias relay listening");

    let api_task = async { axum::serve(listener, app).await };
    let admin_task = run_http_service::<_, AliasRelayError>(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new("alias-relay", || true),
    );

    tokio::select! {
        result = api_task => result?,
        result = admin_task => result?,
    }
    Ok(())
}
