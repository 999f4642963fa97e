mod config;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use shared::metrics_defs::describe_metrics;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maskline", about = "Anonymizing message relay")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, default_value = "maskline.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Relay with a per-request role-to-address table
    AliasRelay,
    /// Relay through platform proxy sessions
    SessionRelay,
    /// Relay through hosted conversations
    ConversationRelay,
}

#[derive(thiserror::Error, Debug)]
enum MasklineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not install statsd exporter: {0}")]
    Metrics(String),

    #[error(transparent)]
    AliasRelay(#[from] alias_relay::AliasRelayError),

    #[error(transparent)]
    SessionRelay(#[from] session_relay::SessionRelayError),

    #[error(transparent)]
    ConversationRelay(#[from] conversation_relay::ConversationRelayError),
}

fn main() -> Result<(), MasklineError> {
    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Keep the guard alive for the process lifetime so events still flush
    let _sentry_guard = config.common.logging.as_ref().map(|logging| {
        sentry::init((
            logging.sentry_dsn.clone(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    if let Some(metrics_config) = &config.common.metrics {
        install_statsd(metrics_config)?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Command::AliasRelay => {
                let section = config.require_alias_relay()?.clone();
                describe_metrics(alias_relay::metrics_defs::ALL_METRICS);
                tracing::info!("starting alias relay");
                alias_relay::run(section, &config.platform).await?;
            }
            Command::SessionRelay => {
                let section = config.require_session_relay()?.clone();
                describe_metrics(session_relay::metrics_defs::ALL_METRICS);
                tracing::info!("starting session relay");
                session_relay::run(section, &config.platform).await?;
            }
            Command::ConversationRelay => {
                let section = config.require_conversation_relay()?.clone();
                describe_metrics(conversation_relay::metrics_defs::ALL_METRICS);
                tracing::info!("starting conversation relay");
                conversation_relay::run(section, &config.platform).await?;
            }
        }
        Ok(())
    })
}

fn install_statsd(config: &MetricsConfig) -> Result<(), MasklineError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .with_queue_size(5000)
        .with_buffer_size(1024)
        .build(Some("maskline"))
        .map_err(|e| MasklineError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| MasklineError::Metrics(e.to_string()))?;
    Ok(())
}
