// Greeter - posts the configured welcome message when a member joins

use poise::serenity_prelude as serenity;
use tracing::{debug, error, warn};

use crate::models::guild::WelcomeMessage;
use crate::utils::config::FALLBACK_WELCOME_CHANNEL;
use crate::Data;

/// A guild text channel as seen by the greeter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: u64,
    pub name: String,
    /// Bot has Send Messages here
    pub can_send: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub channel_id: u64,
    pub content: String,
    pub image_url: Option<String>,
}

/// Why no greeting was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    NoChannel,
    NoPermission,
    NothingToSend,
}

/// Fill `{username}` and `{user}`. Only the first occurrence of each is replaced.
pub fn fill_template(template: &str, username: &str, user_id: u64) -> String {
    template
        .replacen("{username}", username, 1)
        .replacen("{user}", &format!("<@{}>", user_id), 1)
}

/// Decide what to send for a new member. Pure so it can be tested without Discord.
pub fn plan_greeting(
    welcome: &WelcomeMessage,
    channels: &[ChannelInfo],
    username: &str,
    user_id: u64,
) -> Result<Greeting, Skip> {
    if welcome.description.trim().is_empty() && welcome.image.is_empty() {
        return Err(Skip::NothingToSend);
    }

    let configured = welcome.channel.trim().parse::<u64>().ok();

    let channel = configured
        .and_then(|id| channels.iter().find(|c| c.id == id))
        .or_else(|| channels.iter().find(|c| c.name == FALLBACK_WELCOME_CHANNEL))
        .ok_or(Skip::NoChannel)?;

    if !channel.can_send {
        return Err(Skip::NoPermission);
    }

    let content = fill_template(&welcome.description, username, user_id);
    let image_url = Some(welcome.image.clone()).filter(|url| !url.is_empty());

    Ok(Greeting {
        channel_id: channel.id,
        content,
        image_url,
    })
}

/// Text channels of the guild from cache, with the bot's send permission
fn guild_channels(ctx: &serenity::Context, guild_id: serenity::GuildId) -> Option<Vec<ChannelInfo>> {
    let guild = ctx.cache.guild(guild_id)?;
    let me = guild.members.get(&ctx.cache.current_user().id)?;

    Some(
        guild
            .channels
            .values()
            .filter(|c| c.is_text_based())
            .map(|c| ChannelInfo {
                id: c.id.get(),
                name: c.name.clone(),
                can_send: guild.user_permissions_in(c, me).send_messages(),
            })
            .collect(),
    )
}

/// Handle a member joining
pub async fn handle_member_join(
    ctx: &serenity::Context,
    member: &serenity::Member,
    data: &Data,
) -> Result<(), anyhow::Error> {
    let guild_id = member.guild_id;

    let config = match data.store.find_or_default(&guild_id.to_string()).await {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load welcome config for guild {}: {:?}", guild_id, e);
            return Ok(());
        }
    };

    let Some(channels) = guild_channels(ctx, guild_id) else {
        warn!("Guild {} is not in cache, skipping greeting", guild_id);
        return Ok(());
    };

    let greeting = match plan_greeting(
        &config.welcome_message,
        &channels,
        &member.user.name,
        member.user.id.get(),
    ) {
        Ok(greeting) => greeting,
        Err(Skip::NothingToSend) => {
            debug!("Guild {} has no welcome message configured", guild_id);
            return Ok(());
        }
        Err(Skip::NoChannel) => {
            warn!("No valid welcome channel found in guild {}", guild_id);
            return Ok(());
        }
        Err(Skip::NoPermission) => {
            error!(
                "Bot does not have permission to send messages in the welcome channel of guild {}",
                guild_id
            );
            return Ok(());
        }
    };

    let channel_id = serenity::ChannelId::new(greeting.channel_id);
    let mut message = serenity::CreateMessage::new();
    if !greeting.content.trim().is_empty() {
        message = message.content(&greeting.content);
    }
    if let Some(url) = &greeting.image_url {
        let attachment = serenity::CreateAttachment::url(&ctx.http, url).await?;
        message = message.add_file(attachment);
    }

    channel_id.send_message(&ctx.http, message).await?;
    debug!("Greeted {} in guild {}", member.user.name, guild_id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: u64, name: &str, can_send: bool) -> ChannelInfo {
        ChannelInfo {
            id,
            name: name.to_string(),
            can_send,
        }
    }

    fn welcome(channel: &str, description: &str, image: &str) -> WelcomeMessage {
        WelcomeMessage {
            channel: channel.to_string(),
            description: description.to_string(),
            image: image.to_string(),
        }
    }

    #[test]
    fn test_no_config_sends_nothing() {
        let channels = [channel(1, "welcome", true)];
        assert_eq!(
            plan_greeting(&WelcomeMessage::default(), &channels, "Bob", 5),
            Err(Skip::NothingToSend)
        );
    }

    #[test]
    fn test_unconfigured_guild_without_welcome_channel_is_quiet() {
        let only_general = [channel(1, "general", true)];
        assert_eq!(
            plan_greeting(&WelcomeMessage::default(), &only_general, "Bob", 5),
            Err(Skip::NothingToSend)
        );
        assert_eq!(
            plan_greeting(&welcome("", "   ", ""), &[], "Bob", 5),
            Err(Skip::NothingToSend)
        );
    }

    #[test]
    fn test_configured_channel_and_template() {
        let channels = [channel(1, "general", true), channel(2, "welcome", true)];
        let greeting = plan_greeting(&welcome("1", "hi {username}", ""), &channels, "Bob", 5).unwrap();

        assert_eq!(
            greeting,
            Greeting {
                channel_id: 1,
                content: "hi Bob".into(),
                image_url: None
            }
        );
    }

    #[test]
    fn test_falls_back_to_welcome_channel() {
        let channels = [channel(1, "general", true), channel(2, "welcome", true)];
        let greeting =
            plan_greeting(&welcome("999", "Hello {user}", "https://img/w.png"), &channels, "Bob", 5)
                .unwrap();

        assert_eq!(greeting.channel_id, 2);
        assert_eq!(greeting.content, "Hello <@5>");
        assert_eq!(greeting.image_url.as_deref(), Some("https://img/w.png"));
    }

    #[test]
    fn test_no_channel_or_permission() {
        let only_general = [channel(1, "general", true)];
        assert_eq!(
            plan_greeting(&welcome("", "hi", ""), &only_general, "Bob", 5),
            Err(Skip::NoChannel)
        );

        let muted = [channel(1, "welcome", false)];
        assert_eq!(
            plan_greeting(&welcome("", "hi", ""), &muted, "Bob", 5),
            Err(Skip::NoPermission)
        );
    }

    #[test]
    fn test_image_only_greeting() {
        let channels = [channel(1, "welcome", true)];
        let greeting =
            plan_greeting(&welcome("", "", "https://img/w.png"), &channels, "Bob", 5).unwrap();
        assert!(greeting.content.is_empty());
        assert!(greeting.image_url.is_some());
    }

    #[test]
    fn test_template_replaces_first_occurrence_only() {
        assert_eq!(
            fill_template("{username} {username} {user} {user}", "Bob", 7),
            "Bob {username} <@7> {user}"
        );
    }
}
