use serde::Deserialize;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum PlatformConfigError {
    #[error("platform.{0} must not be empty")]
    MissingField(&'static str),

    #[error("platform.{field} is not a valid URL: {source}")]
    InvalidUrl {
        field: &'static str,
        source: url::ParseError,
    },
}

fn default_api_base() -> String {
    "https://api.twilio.com".into()
}

fn default_proxy_base() -> String {
    "https://proxy.twilio.com".into()
}

fn default_conversations_base() -> String {
    "https://conversations.twilio.com".into()
}

/// Platform account credentials and endpoints.
///
/// The base URLs default to the hosted platform and are only overridden in
/// tests, which point them at an in-process mock. The service sids are
/// optional here because each relay mode needs a different subset; the
/// binary's config validation enforces the per-mode requirements up front.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PlatformConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub proxy_service_sid: Option<String>,
    pub conversations_service_sid: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
    #[serde(default = "default_proxy_base")]
    pub proxy_base_url: String,
    #[serde(default = "default_conversations_base")]
    pub conversations_base_url: String,
}

impl PlatformConfig {
    pub fn validate(&self) -> Result<(), PlatformConfigError> {
        if self.account_sid.is_empty() {
            return Err(PlatformConfigError::MissingField("account_sid"));
        }
        if self.auth_token.is_empty() {
            return Err(PlatformConfigError::MissingField("auth_token"));
        }
        for (field, value) in [
            ("api_base_url", &self.api_base_url),
            ("proxy_base_url", &self.proxy_base_url),
            ("conversations_base_url", &self.conversations_base_url),
        ] {
            Url::parse(value).map_err(|source| PlatformConfigError::InvalidUrl { field, source })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> PlatformConfig {
        PlatformConfig {
            account_sid: "AC0123456789".into(),
            auth_token: "secret".into(),
            proxy_service_sid: None,
            conversations_service_sid: None,
            api_base_url: default_api_base(),
            proxy_base_url: default_proxy_base(),
            conversations_base_url: default_conversations_base(),
        }
    }

    #[test]
    fn accepts_minimal_config() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn rejects_empty_credentials() {
        let mut config = minimal();
        config.auth_token.clear();
        assert!(matches!(
            config.validate(),
            Err(PlatformConfigError::MissingField("auth_token"))
        ));
    }

    #[test]
    fn rejects_bad_base_url() {
        let mut config = minimal();
        config.api_base_url = "not a url".into();
        assert!(matches!(
            config.validate(),
            Err(PlatformConfigError::InvalidUrl { field: "api_base_url", .. })
        ));
    }
}
