//! Hosted-conversation relay.
//!
//! Creates a platform conversation per Client / Content Producer pairing and
//! binds both real numbers behind the shared masking number, each with its
//! own identity string. Inbound webhook messages are posted back into the
//! conversation as the sender's identity; the platform handles delivery to
//! the other participant's masked binding.

pub mod api;
pub mod metrics_defs;
mod service;

use messaging::{MessagingClient, MessagingError, PlatformConfig};
use serde::Deserialize;
use shared::admin_service::AdminService;
use shared::http::{Listener, run_http_service};
use shared::party::PhoneNumber;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum ConversationRelayError {
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
    /// Shared masking number used as every participant's proxy address.
    pub proxy_number: PhoneNumber,
}

fn default_admin_listener() -> Listener {
    Listener::localhost(3001)
}

pub async fn run(config: Config, platform: &PlatformConfig) -> Result<(), ConversationRelayError> {
    let client = MessagingClient::new(platform)?;
    let state = api::ConversationRelayState::new(client, config.proxy_number.clone());
    let app = api::router(state);

    let listener = TcpListener::bind(format!(
        "{}:{}",
        config.listener.host, config.listener.port
    ))
    .await?;
    tracing::info!(host = %config.listener.host, port = config.listener.port, "conversation relay listening");

    let api_task = async { axum::serve(listener, app).await };
    let admin_task = run_http_service::<_, ConversationRelayError>(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new("conversation-relay", || true),
    );

    tokio::select! {
        result = api_task => result?,
        result = admin_task => result?,
    }
    Ok(())
}
