// Help command - show usage guide

use poise::serenity_prelude as serenity;

use crate::utils::config::colors;
use crate::{Context, Error};

/// Reply to `.z help`
pub const WELCOME_HELP: &str = "**Bot Commands**
- `.z description <new description>`: Update the description of the welcome message.
- `.z image <url>`: Update the image of the welcome message.
- `.z channel <#channel>`: Set the channel for welcome messages.
- `.z aichannel <#channel|off>`: Limit AI replies to one channel, or lift the limit.

**Placeholders**
`{username}`: The new user's name.
`{user}`: Mention the new user.

**Note**: Only moderators can use these commands.";

/// Reply to `nami help`
pub const NAMI_HELP: &str = "**nami Commands**

**Rule Commands**
- `nami set rule <ruleNo> <description>` (Admins only): Set/update a rule
- `nami rule <ruleNo>`: Show rule as an embed
- `nami rule <ruleNo> delete` (Admins only): Delete a rule

**About Commands**
- `nami about @user <description>` (Admins only): Set or update a user's about info (max 200 chars)
- `nami about @user`: Show user's about info
- `nami about @user delete` (Admins only): Remove user's about info

**Word-Image Commands**
- `nami <word>`: Send the associated image
- `nami set <word> <url>` (Admins only): Set an image URL for a word
- `nami delete <word>` (Admins only): Delete the image URL for a word";

/// Show help and usage guide
#[poise::command(slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title("📚 Nami Bot - Help")
        .description("Welcome greetings, server rules, member bios and word images")
        .color(colors::PRIMARY)
        .field(
            "👋 Welcome Messages (Moderators)",
            "`.z description <text>` - Set the greeting text\n\
            `.z image <url>` - Set the greeting image\n\
            `.z channel <#channel>` - Set the greeting channel\n\
            `.z aichannel <#channel|off>` - Limit where I chat",
            false,
        )
        .field(
            "📜 Rules",
            "`nami rule <n>` - Show a rule\n\
            `nami set rule <n> <text>` - Set a rule (Admins)\n\
            `nami rule <n> delete` - Delete a rule (Admins)",
            false,
        )
        .field(
            "🙋 About",
            "`nami about @user` - Show a member's bio\n\
            `nami about @user <text>` - Set it, max 200 chars (Admins)\n\
            `nami about @user delete` - Remove it (Admins)",
            false,
        )
        .field(
            "🖼️ Word Images",
            "`nami <word>` - Post the word's image\n\
            `nami set <word> <url>` - Set it (Admins)\n\
            `nami delete <word>` - Remove it (Admins)",
            false,
        )
        .field(
            "💬 Chat",
            "Mention me or reply to one of my messages to talk with me.",
            false,
        )
        .footer(serenity::CreateEmbedFooter::new(
            "Rust Edition • Built with Serenity & Poise",
        ));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}
