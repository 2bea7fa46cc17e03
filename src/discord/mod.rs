//! Discord gateway integration.
//!
//! Watches one configured channel for Facebook links, posts an interim
//! "fetching" notice, runs the scrape pipeline, and replies with either a
//! listing embed or an error embed. The notice is always removed before the
//! reply goes out. Every matching message gets its own isolated scrape; the
//! gateway dispatches events concurrently and nothing here serializes them.

use serenity::async_trait;
use serenity::builder::{CreateEmbed, CreateEmbedFooter, CreateMessage};
use serenity::gateway::ActivityData;
use serenity::model::Timestamp;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::{Context, EventHandler};
use tracing::{error, info, warn};

use crate::config::BotConfig;
use crate::matcher;
use crate::models::ListingQuery;
use crate::pipeline;
use crate::presenter::{self, ListingEmbed};

const PROCESSING_NOTICE: &str =
    "🔍 Fetching details from Facebook... (this may take a few moments)";

pub struct Handler {
    config: BotConfig,
}

impl Handler {
    pub fn new(config: BotConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} has connected to Discord", ready.user.name);
        info!(channel = %self.config.channel_id, "monitoring channel for Marketplace links");
        ctx.set_activity(Some(ActivityData::watching("for Marketplace links")));
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        if msg.channel_id != self.config.channel_id {
            return;
        }
        let Some(url) = matcher::find_facebook_url(&msg.content) else {
            return;
        };

        let query = ListingQuery::new(url);
        let notice = match msg.channel_id.say(&ctx.http, PROCESSING_NOTICE).await {
            Ok(sent) => Some(sent),
            Err(e) => {
                warn!(error = %e, "could not post the processing notice");
                None
            }
        };

        let embed = match pipeline::scrape_listing(&query).await {
            Ok(record) => presenter::present(&query, &record, msg.author.display_name()),
            Err(e) => {
                error!(url = %query.url, error = %e, "returning error embed");
                presenter::present_error(&query.url)
            }
        };

        if let Some(notice) = notice
            && let Err(e) = notice.delete(&ctx.http).await
        {
            warn!(error = %e, "could not delete the processing notice");
        }

        let reply = CreateMessage::new().embed(build_embed(&embed));
        if let Err(e) = msg.channel_id.send_message(&ctx.http, reply).await {
            error!(error = %e, "failed to send reply embed");
        }
    }
}

fn build_embed(content: &ListingEmbed) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(content.title.clone())
        .colour(content.color)
        .timestamp(Timestamp::now());

    if let Some(ref url) = content.url {
        embed = embed.url(url.clone());
    }
    if let Some(ref body) = content.body {
        embed = embed.description(body.clone());
    }
    if let Some(ref image) = content.image_url {
        embed = embed.image(image.clone());
    }
    for field in &content.fields {
        embed = embed.field(field.name.clone(), field.value.clone(), field.inline);
    }
    if let Some(ref footer) = content.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer.clone()));
    }
    embed
}
