use poise::serenity_prelude as serenity;
use tracing::error;

use crate::models::guild::GuildConfig;
use crate::utils::config::colors;
use crate::utils::formatters::{channel_mention, truncate};
use crate::{Context, Error};

/// View this server's bot configuration
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn config(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = match ctx.guild_id() {
        Some(id) => id.to_string(),
        None => {
            ctx.say("This command can only be used in a server.").await?;
            return Ok(());
        }
    };

    ctx.defer().await?;

    let config = match ctx.data().store.find_or_default(&guild_id).await {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to fetch guild config: {:?}", e);
            ctx.say("Failed to fetch configuration.").await?;
            return Ok(());
        }
    };

    ctx.send(poise::CreateReply::default().embed(config_embed(&config)))
        .await?;

    Ok(())
}

fn or_not_set(value: &str) -> String {
    if value.is_empty() {
        "Not set".to_string()
    } else {
        value.to_string()
    }
}

fn config_embed(config: &GuildConfig) -> serenity::CreateEmbed {
    let ai_channel = match config.ai_channel_id() {
        Some(id) => channel_mention(Some(id)),
        None => "Any channel".to_string(),
    };

    serenity::CreateEmbed::new()
        .title("Server Configuration")
        .field(
            "Welcome Channel",
            channel_mention(config.welcome_channel_id()),
            true,
        )
        .field("AI Channel", ai_channel, true)
        .field(
            "Welcome Image",
            or_not_set(&config.welcome_message.image),
            false,
        )
        .field(
            "Welcome Description",
            truncate(&or_not_set(&config.welcome_message.description), 1000),
            false,
        )
        .field("Rules", config.rules.len().to_string(), true)
        .field("About Entries", config.about.len().to_string(), true)
        .field("Word Images", config.word_images.len().to_string(), true)
        .color(colors::INFO)
}
