use anyhow::{Context as _, Result};
use serenity::prelude::*;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod discord;
mod extract;
mod matcher;
mod models;
mod pipeline;
mod presenter;
mod session;

use config::BotConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BotConfig::from_env()?;
    info!("Starting Marketplace link preview bot");

    let intents = GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(discord::Handler::new(config.clone()))
        .await
        .context("failed to build Discord client")?;

    client
        .start()
        .await
        .context("Discord client exited with an error")?;
    Ok(())
}
