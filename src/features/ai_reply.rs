// AI auto-reply - answers when the bot is mentioned or replied to

use poise::serenity_prelude as serenity;
use tracing::{debug, error};

use crate::api::llm::LlmError;
use crate::utils::config::MESSAGE_CHUNK_LEN;
use crate::utils::formatters::chunk_message;
use crate::utils::mentions::strip_user_mentions;
use crate::Data;

/// Sent when the AI endpoint fails or times out
pub const APOLOGY: &str = "Sorry, I'm having trouble thinking right now. Please try again later!";

/// Sent when the AI endpoint answers with nothing usable
pub const PLACEHOLDER: &str = "Hmm, I'm not sure what to say to that.";

const PERSONA: &str = "You are Nami, a cheerful and witty member of this Discord server. \
Reply casually and concisely, like a friend in the chat. Never mention that you are an AI model.";

/// What the trigger check needs to know about a message
#[derive(Debug, Clone, Copy)]
pub struct Trigger {
    pub author_is_bot: bool,
    pub is_command: bool,
    pub mentions_bot: bool,
    pub replies_to_bot: bool,
    pub channel_id: u64,
    /// Configured AI channel, if any
    pub ai_channel: Option<u64>,
}

pub fn should_reply(trigger: &Trigger) -> bool {
    if trigger.author_is_bot || trigger.is_command {
        return false;
    }
    if !trigger.mentions_bot && !trigger.replies_to_bot {
        return false;
    }
    trigger
        .ai_channel
        .map_or(true, |channel| channel == trigger.channel_id)
}

/// Prompt = optional context from the replied-to bot message, the persona,
/// then the user's text without mention syntax.
pub fn build_prompt(context: Option<&str>, text: &str) -> String {
    let mut prompt = String::new();
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str("Your previous message in this conversation:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }
    prompt.push_str(PERSONA);
    prompt.push_str("\n\nUser: ");
    prompt.push_str(&strip_user_mentions(text));
    prompt
}

/// Turn the endpoint result into the text to send. Never empty.
pub fn reply_text(result: Result<Option<String>, LlmError>) -> String {
    match result {
        Ok(Some(text)) => text,
        Ok(None) => PLACEHOLDER.to_string(),
        Err(e) => {
            error!("AI reply failed: {}", e);
            APOLOGY.to_string()
        }
    }
}

/// Handle a non-command message
pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
    is_command: bool,
) -> Result<(), anyhow::Error> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let bot_id = ctx.cache.current_user().id;

    let replied_to_bot = msg
        .referenced_message
        .as_deref()
        .filter(|referenced| referenced.author.id == bot_id);

    let mut trigger = Trigger {
        author_is_bot: msg.author.bot,
        is_command,
        mentions_bot: msg.mentions.iter().any(|u| u.id == bot_id),
        replies_to_bot: replied_to_bot.is_some(),
        channel_id: msg.channel_id.get(),
        ai_channel: None,
    };

    // Cheap checks first; the AI channel needs a store read
    if !should_reply(&trigger) {
        return Ok(());
    }

    trigger.ai_channel = match data.store.find_or_default(&guild_id.to_string()).await {
        Ok(config) => config.ai_channel_id(),
        Err(e) => {
            error!("Failed to load AI channel for guild {}: {:?}", guild_id, e);
            return Ok(());
        }
    };
    if !should_reply(&trigger) {
        debug!("Ignoring mention outside the AI channel in guild {}", guild_id);
        return Ok(());
    }

    let _typing = msg.channel_id.start_typing(&ctx.http);

    let prompt = build_prompt(replied_to_bot.map(|m| m.content.as_str()), &msg.content);
    let response = reply_text(data.gemini.generate(&prompt).await);

    for chunk in chunk_message(&response, MESSAGE_CHUNK_LEN) {
        msg.reply(ctx, chunk).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::llm::GeminiClient;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mentioned() -> Trigger {
        Trigger {
            author_is_bot: false,
            is_command: false,
            mentions_bot: true,
            replies_to_bot: false,
            channel_id: 10,
            ai_channel: None,
        }
    }

    #[test]
    fn test_trigger_conditions() {
        assert!(should_reply(&mentioned()));
        assert!(should_reply(&Trigger {
            mentions_bot: false,
            replies_to_bot: true,
            ..mentioned()
        }));
        assert!(!should_reply(&Trigger {
            mentions_bot: false,
            ..mentioned()
        }));
        assert!(!should_reply(&Trigger {
            author_is_bot: true,
            ..mentioned()
        }));
        assert!(!should_reply(&Trigger {
            is_command: true,
            ..mentioned()
        }));
    }

    #[test]
    fn test_ai_channel_restriction() {
        assert!(should_reply(&Trigger {
            ai_channel: Some(10),
            ..mentioned()
        }));
        assert!(!should_reply(&Trigger {
            ai_channel: Some(11),
            ..mentioned()
        }));
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt(Some("I like cats."), "<@123> do you like dogs?");
        assert!(prompt.starts_with("Your previous message"));
        assert!(prompt.contains("I like cats."));
        assert!(prompt.contains(PERSONA));
        assert!(prompt.ends_with("User: do you like dogs?"));
        assert!(!prompt.contains("<@123>"));

        let no_context = build_prompt(None, "hi");
        assert!(no_context.starts_with(PERSONA));
    }

    #[tokio::test]
    async fn test_http_500_gives_apology() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal: key=secret"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(
            reqwest::Client::new(),
            &server.uri(),
            "secret",
            Duration::from_secs(5),
        );
        let reply = reply_text(client.generate(&build_prompt(None, "hello")).await);

        assert_eq!(reply, APOLOGY);
        assert!(!reply.contains("secret"));
    }

    #[test]
    fn test_empty_answer_gives_placeholder() {
        assert_eq!(reply_text(Ok(None)), PLACEHOLDER);
        assert_eq!(reply_text(Ok(Some("hey!".into()))), "hey!");
    }
}
