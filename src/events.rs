// Gateway event handling: routes messages and joins to the features,
// renders command responses as Discord messages

use std::sync::atomic::Ordering;
use std::time::Duration;

use poise::serenity_prelude as serenity;
use tracing::{debug, error, info, warn};

use crate::commands::dispatch::{Invocation, Response, UNAVAILABLE_MESSAGE};
use crate::commands::parser;
use crate::features::{ai_reply, greeter};
use crate::utils::config::colors;
use crate::{Data, Error};

/// How often the bot status alternates
const PRESENCE_INTERVAL: Duration = Duration::from_secs(60);

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            info!("Logged in as {}!", data_about_bot.user.name);
            if !data.presence_started.swap(true, Ordering::SeqCst) {
                tokio::spawn(rotate_presence(ctx.clone()));
            }
        }
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = handle_message(ctx, new_message, data).await {
                error!("Message handler error: {:?}", e);
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = greeter::handle_member_join(ctx, new_member, data).await {
                error!("Greeter error: {:?}", e);
            }
        }
        _ => {}
    }
    Ok(())
}

async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<(), anyhow::Error> {
    if msg.author.bot {
        return Ok(());
    }
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    let parsed = parser::parse(&msg.content);
    let is_command = parsed.is_some();

    if let Some(parsed) = parsed {
        let (permissions, channels) = match author_context(ctx, msg, guild_id) {
            Some(found) => found,
            None => {
                warn!("Guild {} missing from cache, treating author as a member", guild_id);
                (serenity::Permissions::empty(), Vec::new())
            }
        };

        let invocation = Invocation {
            guild_id: guild_id.get(),
            permissions,
            guild_channels: &channels,
        };
        let response = data.dispatcher.handle(parsed, &invocation).await;
        render(ctx, msg, guild_id, response).await?;
    }

    ai_reply::handle_message(ctx, msg, data, is_command).await
}

/// The guild channel a message was sent in; threads resolve to their parent
fn message_channel<'a>(
    guild: &'a serenity::Guild,
    channel_id: serenity::ChannelId,
) -> Option<&'a serenity::GuildChannel> {
    guild.channels.get(&channel_id).or_else(|| {
        guild
            .threads
            .iter()
            .find(|t| t.id == channel_id)
            .and_then(|t| t.parent_id)
            .and_then(|parent| guild.channels.get(&parent))
    })
}

/// Author's permissions in the message channel, plus every channel ID of the guild
fn author_context(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    guild_id: serenity::GuildId,
) -> Option<(serenity::Permissions, Vec<u64>)> {
    let guild = ctx.cache.guild(guild_id)?;
    let channel = message_channel(&guild, msg.channel_id)?;
    let member = msg.member.as_deref()?;

    let permissions = guild.partial_member_permissions_in(channel, msg.author.id, member);
    let channels = guild.channels.keys().map(|id| id.get()).collect();
    Some((permissions, channels))
}

/// Bot's own permissions in a channel, if the guild is cached
fn bot_permissions(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    channel_id: serenity::ChannelId,
) -> Option<serenity::Permissions> {
    let guild = ctx.cache.guild(guild_id)?;
    let channel = message_channel(&guild, channel_id)?;
    let me = guild.members.get(&ctx.cache.current_user().id)?;
    Some(guild.user_permissions_in(channel, me))
}

async fn render(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    guild_id: serenity::GuildId,
    response: Response,
) -> Result<(), anyhow::Error> {
    match response {
        Response::Ack(text)
        | Response::Text(text)
        | Response::Denied(text)
        | Response::Invalid(text) => {
            msg.reply(ctx, text).await?;
        }
        Response::Unavailable => {
            msg.reply(ctx, UNAVAILABLE_MESSAGE).await?;
        }
        Response::Rule {
            rule_no,
            description,
        } => {
            let embed = serenity::CreateEmbed::new()
                .title(format!("Rule #{}", rule_no))
                .description(description)
                .color(colors::RULE);
            msg.channel_id
                .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
                .await?;
        }
        Response::About {
            user_id,
            description,
        } => {
            let mut embed = serenity::CreateEmbed::new()
                .description(description)
                .color(colors::ABOUT);

            match serenity::UserId::new(user_id).to_user(ctx).await {
                Ok(user) => {
                    embed = embed
                        .title(format!("{}'s About", user.name))
                        .thumbnail(user.face());
                }
                Err(e) => {
                    debug!("Could not fetch user {} for about embed: {:?}", user_id, e);
                    embed = embed.title("About");
                }
            }

            msg.channel_id
                .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
                .await?;
        }
        Response::WordImage { word, url } => {
            let allowed = bot_permissions(ctx, guild_id, msg.channel_id)
                .map_or(false, |p| p.send_messages() && p.attach_files());
            if !allowed {
                msg.reply(ctx, "I don't have permission to send messages or attachments here.")
                    .await?;
                return Ok(());
            }

            match serenity::CreateAttachment::url(&ctx.http, &url).await {
                Ok(attachment) => {
                    msg.channel_id
                        .send_message(&ctx.http, serenity::CreateMessage::new().add_file(attachment))
                        .await?;
                }
                Err(e) => {
                    error!("Failed to download image for word `{}` ({}): {:?}", word, url, e);
                    msg.reply(ctx, format!("I couldn't load the image for `{}`.", word))
                        .await?;
                }
            }
        }
    }
    Ok(())
}

/// Status text for one tick of the rotation
pub fn presence_text(show_servers: bool, guild_count: usize, member_count: u64) -> String {
    if show_servers {
        format!("{} special servers", guild_count)
    } else {
        format!("with {} members", member_count)
    }
}

/// Alternate between watching the server count and playing with the member count
async fn rotate_presence(ctx: serenity::Context) {
    let mut interval = tokio::time::interval(PRESENCE_INTERVAL);
    let mut show_servers = true;

    loop {
        interval.tick().await;

        let guilds = ctx.cache.guilds();
        let members: u64 = guilds
            .iter()
            .filter_map(|id| ctx.cache.guild(*id).map(|g| g.member_count))
            .sum();

        let text = presence_text(show_servers, guilds.len(), members);
        let activity = if show_servers {
            serenity::ActivityData::watching(text)
        } else {
            serenity::ActivityData::playing(text)
        };
        ctx.set_activity(Some(activity));

        show_servers = !show_servers;
    }
}
