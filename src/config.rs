//! Environment-driven configuration.
//!
//! Both settings are required; the bot refuses to start without them.

use anyhow::{Context, Result, ensure};
use serenity::model::id::ChannelId;

#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Authentication token for the Discord gateway.
    pub discord_token: String,
    /// The single channel the bot watches and replies in.
    pub channel_id: ChannelId,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        let discord_token =
            std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?;
        let channel_id = std::env::var("CHANNEL_ID").context("CHANNEL_ID is not set")?;

        Ok(Self {
            discord_token,
            channel_id: parse_channel_id(&channel_id)?,
        })
    }
}

fn parse_channel_id(raw: &str) -> Result<ChannelId> {
    let id: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("CHANNEL_ID must be a numeric Discord channel id, got {raw:?}"))?;
    ensure!(id != 0, "CHANNEL_ID must not be zero");
    Ok(ChannelId::new(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_channel_id() {
        let id = parse_channel_id("123456789012345678").unwrap();
        assert_eq!(id.get(), 123_456_789_012_345_678);
    }

    #[test]
    fn trims_whitespace() {
        assert!(parse_channel_id(" 42\n").is_ok());
    }

    #[test]
    fn rejects_garbage_and_zero() {
        assert!(parse_channel_id("not-a-number").is_err());
        assert!(parse_channel_id("").is_err());
        assert!(parse_channel_id("0").is_err());
    }
}
