//! flyte-slack entry point.
//!
//! Wires the Slack connection, the event router, the Flyte pack client and
//! the interaction webhook together, then waits for a shutdown signal.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flyte_slack::backup::{Backup, FileBackup};
use flyte_slack::cache::ChannelCache;
use flyte_slack::command;
use flyte_slack::config::Config;
use flyte_slack::pack::client::PackClient;
use flyte_slack::pack::{forward_events, PackDef};
use flyte_slack::server::{self, ServerState};
use flyte_slack::slack::{
    router, EventRouter, Membership, SlackApi, SlackClient, SlackConfig, SocketModeClient, WebApiClient,
};

const HELP_URL: &str = "https://github.com/ExpediaGroup/flyte-slack/blob/master/README.md";

/// Capacity of the raw Slack event queue.
const RAW_EVENT_BUFFER: usize = 256;

/// Slack pack for the Flyte automation bus.
#[derive(Parser)]
#[command(name = "flyte-slack")]
#[command(about = "Relays Slack events to Flyte and runs Flyte actions against Slack.")]
#[command(version)]
struct Cli {
    /// Flyte API base URL
    #[arg(long, env = "FLYTE_API")]
    flyte_api: String,

    /// Slack bot token (xoxb-...)
    #[arg(long, env = "FLYTE_SLACK_TOKEN", hide_env_values = true)]
    slack_token: String,

    /// Slack app-level token for Socket Mode (xapp-...)
    #[arg(long, env = "FLYTE_SLACK_APP_TOKEN", hide_env_values = true)]
    app_token: String,

    /// Token interaction callbacks must carry
    #[arg(long, env = "SLACK_VERIFICATION_TOKEN", hide_env_values = true)]
    verification_token: String,

    /// Pack name registered with Flyte
    #[arg(long, env = "PACK_NAME", default_value = "Slack")]
    pack_name: String,

    /// Hours between conversation list renewals
    #[arg(long, env = "RENEW_CONVERSATION_LIST", default_value_t = 24)]
    renew_conversation_list: u64,

    /// Directory holding the joined channels backup
    #[arg(long, env = "BACKUP_DIR")]
    backup_dir: Option<PathBuf>,

    /// Drop messages and reactions from channels the pack has not joined
    #[arg(long, env = "MEMBERSHIP_GATING", default_value_t = true, action = clap::ArgAction::Set)]
    membership_gating: bool,

    /// Interaction webhook bind host
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Interaction webhook port
    #[arg(short, long, env = "PORT", default_value_t = 8090)]
    port: u16,

    /// Flyte action polling interval in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Seconds to wait after the shutdown notice before exiting
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 2)]
    shutdown_grace_secs: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> Config {
        let slack = SlackConfig::new(&self.slack_token, &self.app_token, &self.verification_token)
            .with_membership_gating(self.membership_gating);

        let mut config = Config::new(&self.flyte_api, slack);
        config.pack_name = self.pack_name;
        config.cache.renew_conversation_list_hours = self.renew_conversation_list;
        config.backup_dir = self.backup_dir;
        config.server.host = self.host;
        config.server.port = self.port;
        config.poll_interval_ms = self.poll_interval_ms;
        config.shutdown_grace_secs = self.shutdown_grace_secs;
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli.into_config();
    config.validate().context("invalid configuration")?;

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let backup: Arc<dyn Backup> = match config.backup_dir() {
        Some(dir) => Arc::new(FileBackup::new(dir)?),
        None => Arc::new(FileBackup::in_temp_dir()?),
    };

    let web = WebApiClient::new(&config.slack.bot_token, &config.slack.app_token)?;
    let api: Arc<dyn SlackApi> = Arc::new(web.clone());

    let membership = Arc::new(
        Membership::load(
            api.clone(),
            backup,
            &config.slack.welcome_message,
            &config.slack.farewell_message,
        )
        .context("cannot load joined channels")?,
    );
    let slack = Arc::new(SlackClient::new(api.clone(), membership.clone()));
    let cache = Arc::new(ChannelCache::new(slack.clone(), config.cache.ttl()));

    let pack_def = PackDef {
        name: config.pack_name.clone(),
        help_url: Some(HELP_URL.to_string()),
        commands: command::commands(slack.clone(), cache),
        event_defs: router::event_defs(),
    };
    let pack = Arc::new(PackClient::new(&config.flyte_api, pack_def, config.poll_interval())?);
    pack.register().await.context("cannot register pack with flyte")?;

    let (raw_tx, raw_rx) = mpsc::channel(RAW_EVENT_BUFFER);
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    tokio::spawn(SocketModeClient::new(web).run(raw_tx.clone()));
    tokio::spawn(EventRouter::new(api, membership, config.slack.membership_gating).run(raw_rx, event_tx));
    tokio::spawn(forward_events(event_rx, pack.clone()));
    tokio::spawn(pack.clone().run());

    let addr = config.server_addr();
    let state = Arc::new(ServerState::new(&config.slack.verification_token, raw_tx));
    let mut webhook = tokio::spawn(async move { server::serve(&addr, state).await });

    info!(pack = %config.pack_name, "flyte-slack started");

    tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown requested");
        }
        result = &mut webhook => {
            match result {
                Ok(Ok(())) => error!("interaction webhook stopped"),
                Ok(Err(e)) => return Err(e).context("interaction webhook failed"),
                Err(e) => return Err(e).context("interaction webhook panicked"),
            }
        }
    }

    slack.notify_shutdown(&config.slack.shutdown_message).await;
    tokio::time::sleep(config.shutdown_grace()).await;
    info!("flyte-slack stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
