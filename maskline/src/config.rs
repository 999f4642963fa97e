use messaging::PlatformConfig;
use messaging::config::PlatformConfigError;
use serde::Deserialize;
use std::fs::File;

#[derive(Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Deserialize)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

/// Top-level YAML config. One section per relay mode; only the section for
/// the selected subcommand is required, and it is validated together with
/// the platform credentials before anything listens.
#[derive(Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub platform: PlatformConfig,
    pub alias_relay: Option<alias_relay::Config>,
    pub session_relay: Option<session_relay::Config>,
    pub conversation_relay: Option<conversation_relay::Config>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error(transparent)]
    Platform(#[from] PlatformConfigError),

    #[error("missing config section: {0}")]
    MissingSection(&'static str),

    #[error("{mode} mode requires platform.{field}")]
    MissingPlatformField {
        mode: &'static str,
        field: &'static str,
    },
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    pub fn require_alias_relay(&self) -> Result<&alias_relay::Config, ConfigError> {
        self.platform.validate()?;
        self.alias_relay
            .as_ref()
            .ok_or(ConfigError::MissingSection("alias_relay"))
    }

    pub fn require_session_relay(&self) -> Result<&session_relay::Config, ConfigError> {
        self.platform.validate()?;
        if self.platform.proxy_service_sid.is_none() {
            return Err(ConfigError::MissingPlatformField {
                mode: "session-relay",
                field: "proxy_service_sid",
            });
        }
        self.session_relay
            .as_ref()
            .ok_or(ConfigError::MissingSection("session_relay"))
    }

    pub fn require_conversation_relay(&self) -> Result<&conversation_relay::Config, ConfigError> {
        self.platform.validate()?;
        if self.platform.conversations_service_sid.is_none() {
            return Err(ConfigError::MissingPlatformField {
                mode: "conversation-relay",
                field: "conversations_service_sid",
            });
        }
        self.conversation_relay
            .as_ref()
            .ok_or(ConfigError::MissingSection("conversation_relay"))
    }
}
