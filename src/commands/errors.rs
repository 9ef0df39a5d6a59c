// Owner-only view of recently logged errors

use poise::serenity_prelude as serenity;

use crate::utils::config::colors;
use crate::utils::formatters::truncate;
use crate::{Context, Error};

/// Show the most recent errors the bot logged
#[poise::command(slash_command, owners_only, ephemeral)]
pub async fn errors(
    ctx: Context<'_>,
    #[description = "How many errors to show (default 10)"]
    #[min = 1]
    #[max = 50]
    count: Option<u32>,
) -> Result<(), Error> {
    let all = ctx.data().errors.recent();
    let count = (count.unwrap_or(10) as usize).min(all.len());
    // newest last
    let recent = &all[all.len() - count..];

    let description = if recent.is_empty() {
        "No errors recorded since startup. 🎉".to_string()
    } else {
        let lines = recent
            .iter()
            .map(|line| format!("• `{}`", truncate(line, 180)))
            .collect::<Vec<_>>()
            .join("\n");
        truncate(&lines, 4000)
    };

    let embed = serenity::CreateEmbed::new()
        .title("Recent Errors")
        .description(description)
        .color(colors::ERROR);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}
