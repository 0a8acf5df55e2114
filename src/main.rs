// ABOUTME: Main entry point for the Foos relay daemon
// ABOUTME: Initializes logging, config, forward state, webhook forwarder, and the Discord gateway client

use anyhow::Result;
use foos_relay::{
    config::Config,
    discord,
    relay::Relay,
    state::{JsonFileSnapshot, StateStore},
    webhook::WebhookForwarder,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Set up panic hook to log panics before they crash the process
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("foos-relay panicked: {}", panic_info);
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,serenity=warn,tracing::span=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Foos relay");

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!(
        guild_id = %config.discord.guild_id,
        category_id = %config.discord.game_day_category_id,
        team_abbr = %config.team.abbr,
        team_name = %config.team.name_text,
        state_path = %config.state.path,
        "Configuration loaded"
    );

    let store = StateStore::open(JsonFileSnapshot::new(&config.state.path));
    let forwarder = Arc::new(WebhookForwarder::new(config.webhook.url.clone())?);
    let relay = Arc::new(Relay::new(&config, store, forwarder)?);

    discord::run(&config.discord.token, relay).await
}
