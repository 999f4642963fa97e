use crate::config::PlatformConfig;
use crate::types::{
    ConversationParticipant, ConversationPage, ConversationResource, ConversationSid,
    MessageResource, ParticipantPage, ProxyParticipant, SessionResource, SessionSid,
};
use http::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use shared::party::PhoneNumber;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum MessagingError {
    #[error("platform request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success platform response; `message` is the platform's own error
    /// message, passed through verbatim.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid platform URL: {0}")]
    InvalidUrl(String),

    #[error("platform.{0} is not configured")]
    NotConfigured(&'static str),
}

/// Error body the platform attaches to non-2xx responses.
#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// REST client for the messaging platform. One instance is shared by all
/// request handlers of a relay process.
#[derive(Clone)]
pub struct MessagingClient {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    api_base: Url,
    proxy_base: Url,
    conversations_base: Url,
    proxy_service_sid: Option<String>,
    conversations_service_sid: Option<String>,
}

impl MessagingClient {
    pub fn new(config: &PlatformConfig) -> Result<Self, MessagingError> {
        Ok(MessagingClient {
            client: reqwest::Client::new(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            api_base: parse_base(&config.api_base_url)?,
            proxy_base: parse_base(&config.proxy_base_url)?,
            conversations_base: parse_base(&config.conversations_base_url)?,
            proxy_service_sid: config.proxy_service_sid.clone(),
            conversations_service_sid: config.conversations_service_sid.clone(),
        })
    }

    /// Sends one outbound message through the platform's message API.
    pub async fn send_message(
        &self,
        from: &PhoneNumber,
        to: &PhoneNumber,
        body: &str,
    ) -> Result<MessageResource, MessagingError> {
        let url = self.join(
            &self.api_base,
            &format!("2010-04-01/Accounts/{}/Messages.json", self.account_sid),
        )?;
        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", body)])
            .send()
            .await?;
        decode(response, "message").await
    }

    pub async fn create_session(&self) -> Result<SessionResource, MessagingError> {
        let service = self.proxy_service()?;
        let url = self.join(&self.proxy_base, &format!("v1/Services/{service}/Sessions"))?;
        let response = self.post_form(url, &[]).await?;
        decode(response, "session").await
    }

    /// Registers a real number against a proxy session. The platform answers
    /// with the allocated masking number in `proxy_identifier`.
    pub async fn add_participant(
        &self,
        session: &SessionSid,
        identifier: &PhoneNumber,
        friendly_name: &str,
    ) -> Result<ProxyParticipant, MessagingError> {
        let service = self.proxy_service()?;
        let url = self.join(
            &self.proxy_base,
            &format!("v1/Services/{service}/Sessions/{session}/Participants"),
        )?;
        let response = self
            .post_form(
                url,
                &[
                    ("Identifier", identifier.as_str()),
                    ("FriendlyName", friendly_name),
                ],
            )
            .await?;
        decode(response, "participant").await
    }

    pub async fn delete_session(&self, session: &SessionSid) -> Result<(), MessagingError> {
        let service = self.proxy_service()?;
        let url = self.join(
            &self.proxy_base,
            &format!("v1/Services/{service}/Sessions/{session}"),
        )?;
        let response = self
            .client
            .delete(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await?;
        expect_success(response, "session").await
    }

    pub async fn create_conversation(
        &self,
        friendly_name: &str,
    ) -> Result<ConversationResource, MessagingError> {
        let service = self.conversations_service()?;
        let url = self.join(
            &self.conversations_base,
            &format!("v1/Services/{service}/Conversations"),
        )?;
        let response = self.post_form(url, &[("FriendlyName", friendly_name)]).await?;
        decode(response, "conversation").await
    }

    pub async fn delete_conversation(
        &self,
        conversation: &ConversationSid,
    ) -> Result<(), MessagingError> {
        let service = self.conversations_service()?;
        let url = self.join(
            &self.conversations_base,
            &format!("v1/Services/{service}/Conversations/{conversation}"),
        )?;
        let response = self
            .client
            .delete(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await?;
        expect_success(response, "conversation").await
    }

    /// Binds a real number to a conversation behind the shared masking number.
    pub async fn add_conversation_participant(
        &self,
        conversation: &ConversationSid,
        address: &PhoneNumber,
        proxy_address: &PhoneNumber,
        identity: Option<&str>,
    ) -> Result<ConversationParticipant, MessagingError> {
        let service = self.conversations_service()?;
        let url = self.join(
            &self.conversations_base,
            &format!("v1/Services/{service}/Conversations/{conversation}/Participants"),
        )?;
        let mut form: Vec<(&str, &str)> = vec![
            ("MessagingBinding.Address", address.as_str()),
            ("MessagingBinding.ProxyAddress", proxy_address.as_str()),
        ];
        if let Some(identity) = identity {
            form.push(("Identity", identity));
        }
        let response = self.post_form(url, &form).await?;
        decode(response, "conversation").await
    }

    pub async fn list_participants(
        &self,
        conversation: &ConversationSid,
    ) -> Result<Vec<ConversationParticipant>, MessagingError> {
        let service = self.conversations_service()?;
        let url = self.join(
            &self.conversations_base,
            &format!("v1/Services/{service}/Conversations/{conversation}/Participants"),
        )?;
        let response = self
            .client
            .get(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await?;
        let page: ParticipantPage = decode(response, "conversation").await?;
        Ok(page.participants)
    }

    pub async fn list_conversations(&self) -> Result<Vec<ConversationResource>, MessagingError> {
        let service = self.conversations_service()?;
        let url = self.join(
            &self.conversations_base,
            &format!("v1/Services/{service}/Conversations"),
        )?;
        let response = self
            .client
            .get(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await?;
        let page: ConversationPage = decode(response, "conversations").await?;
        Ok(page.conversations)
    }

    /// Posts a message into a conversation; the platform fans it out to the
    /// other participants through their masked bindings.
    pub async fn post_conversation_message(
        &self,
        conversation: &ConversationSid,
        author: &str,
        body: &str,
    ) -> Result<MessageResource, MessagingError> {
        let service = self.conversations_service()?;
        let url = self.join(
            &self.conversations_base,
            &format!("v1/Services/{service}/Conversations/{conversation}/Messages"),
        )?;
        let response = self
            .post_form(url, &[("Author", author), ("Body", body)])
            .await?;
        decode(response, "conversation").await
    }

    fn proxy_service(&self) -> Result<&str, MessagingError> {
        self.proxy_service_sid
            .as_deref()
            .ok_or(MessagingError::NotConfigured("proxy_service_sid"))
    }

    fn conversations_service(&self) -> Result<&str, MessagingError> {
        self.conversations_service_sid
            .as_deref()
            .ok_or(MessagingError::NotConfigured("conversations_service_sid"))
    }

    fn join(&self, base: &Url, path: &str) -> Result<Url, MessagingError> {
        base.join(path)
            .map_err(|e| MessagingError::InvalidUrl(e.to_string()))
    }

    async fn post_form(
        &self,
        url: Url,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response, MessagingError> {
        Ok(self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await?)
    }
}

fn parse_base(raw: &str) -> Result<Url, MessagingError> {
    // A base without a trailing slash would drop its last path segment on join
    let mut normalized = raw.trim_end_matches('/').to_string();
    normalized.push('/');
    Url::parse(&normalized).map_err(|e| MessagingError::InvalidUrl(e.to_string()))
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    resource: &str,
) -> Result<T, MessagingError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(MessagingError::NotFound(resource.to_string()));
    }
    if !status.is_success() {
        return Err(api_error(status, response).await);
    }
    Ok(response.json::<T>().await?)
}

async fn expect_success(response: reqwest::Response, resource: &str) -> Result<(), MessagingError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(MessagingError::NotFound(resource.to_string()));
    }
    if !status.is_success() {
        return Err(api_error(status, response).await);
    }
    Ok(())
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> MessagingError {
    let raw = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&raw)
        .map(|body| body.message)
        .unwrap_or(raw);
    MessagingError::Api {
        status: status.as_u16(),
        message,
    }
}
