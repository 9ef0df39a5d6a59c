// Guild (server) configuration record
// Matches the `server_configs` document structure

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::config::{is_reserved_word, is_valid_url, MAX_ABOUT_LEN};

/// Welcome message settings. Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WelcomeMessage {
    pub channel: String,
    pub description: String,
    pub image: String,
}

/// A numbered server rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "ruleNo")]
    pub rule_no: u32,
    pub description: String,
}

/// Per-user "about" text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct About {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub description: String,
}

/// Word -> image URL mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordImage {
    pub word: String,
    pub url: String,
}

/// Guild (Server) specific configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    #[serde(rename = "serverId")]
    pub server_id: String,
    #[serde(default)]
    pub welcome_message: WelcomeMessage,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub about: Vec<About>,
    #[serde(rename = "wordImages", default)]
    pub word_images: Vec<WordImage>,
    /// Channel ID where AI replies are allowed; empty means anywhere
    #[serde(default)]
    pub ai_channel: String,
}

/// Rejected write. The message is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Please provide a valid URL (it must start with `http`).")]
    InvalidUrl,
    #[error("The words `rules` and `about` can't be used for an image!")]
    ReservedWord,
    #[error("The description must be 200 characters or fewer.")]
    AboutTooLong,
    #[error("Descriptions can't be empty.")]
    EmptyDescription,
    #[error("Rule numbers must be positive whole numbers.")]
    InvalidRuleNumber,
}

impl GuildConfig {
    pub fn new(server_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            ..Default::default()
        }
    }

    // ============ Welcome message ============

    pub fn set_welcome_description(&mut self, description: &str) -> Result<(), ConfigError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ConfigError::EmptyDescription);
        }
        self.welcome_message.description = description.to_string();
        Ok(())
    }

    pub fn set_welcome_image(&mut self, url: &str) -> Result<(), ConfigError> {
        if !is_valid_url(url) {
            return Err(ConfigError::InvalidUrl);
        }
        self.welcome_message.image = url.to_string();
        Ok(())
    }

    pub fn set_welcome_channel(&mut self, channel_id: u64) {
        self.welcome_message.channel = channel_id.to_string();
    }

    /// `None` lifts the AI channel restriction
    pub fn set_ai_channel(&mut self, channel_id: Option<u64>) {
        self.ai_channel = channel_id.map(|id| id.to_string()).unwrap_or_default();
    }

    pub fn welcome_channel_id(&self) -> Option<u64> {
        parse_id(&self.welcome_message.channel)
    }

    pub fn ai_channel_id(&self) -> Option<u64> {
        parse_id(&self.ai_channel)
    }

    // ============ Rules ============

    pub fn rule(&self, rule_no: u32) -> Option<&Rule> {
        self.rules.iter().find(|r| r.rule_no == rule_no)
    }

    /// Insert or overwrite rule `rule_no`
    pub fn upsert_rule(&mut self, rule_no: u32, description: &str) -> Result<(), ConfigError> {
        if rule_no == 0 {
            return Err(ConfigError::InvalidRuleNumber);
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(ConfigError::EmptyDescription);
        }

        match self.rules.iter_mut().find(|r| r.rule_no == rule_no) {
            Some(rule) => rule.description = description.to_string(),
            None => self.rules.push(Rule {
                rule_no,
                description: description.to_string(),
            }),
        }
        Ok(())
    }

    /// Returns false when there was no such rule
    pub fn delete_rule(&mut self, rule_no: u32) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.rule_no != rule_no);
        self.rules.len() != before
    }

    // ============ About ============

    pub fn about(&self, user_id: u64) -> Option<&About> {
        let user_id = user_id.to_string();
        self.about.iter().find(|a| a.user_id == user_id)
    }

    pub fn upsert_about(&mut self, user_id: u64, description: &str) -> Result<(), ConfigError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ConfigError::EmptyDescription);
        }
        if description.chars().count() > MAX_ABOUT_LEN {
            return Err(ConfigError::AboutTooLong);
        }

        let user_id = user_id.to_string();
        match self.about.iter_mut().find(|a| a.user_id == user_id) {
            Some(about) => about.description = description.to_string(),
            None => self.about.push(About {
                user_id,
                description: description.to_string(),
            }),
        }
        Ok(())
    }

    pub fn delete_about(&mut self, user_id: u64) -> bool {
        let user_id = user_id.to_string();
        let before = self.about.len();
        self.about.retain(|a| a.user_id != user_id);
        self.about.len() != before
    }

    // ============ Word images ============

    /// Look up the image for `word`. Reserved words and non-http URLs
    /// never resolve, whatever is stored.
    pub fn word_image(&self, word: &str) -> Option<&str> {
        let word = word.to_lowercase();
        if is_reserved_word(&word) {
            return None;
        }
        self.word_images
            .iter()
            .find(|w| w.word == word)
            .map(|w| w.url.as_str())
            .filter(|url| is_valid_url(url))
    }

    /// Insert or overwrite the image for `word` (case-folded)
    pub fn upsert_word_image(&mut self, word: &str, url: &str) -> Result<(), ConfigError> {
        if !is_valid_url(url) {
            return Err(ConfigError::InvalidUrl);
        }
        let word = word.to_lowercase();
        if is_reserved_word(&word) {
            return Err(ConfigError::ReservedWord);
        }

        match self.word_images.iter_mut().find(|w| w.word == word) {
            Some(entry) => entry.url = url.to_string(),
            None => self.word_images.push(WordImage {
                word,
                url: url.to_string(),
            }),
        }
        Ok(())
    }

    pub fn delete_word_image(&mut self, word: &str) -> bool {
        let word = word.to_lowercase();
        let before = self.word_images.len();
        self.word_images.retain(|w| w.word != word);
        self.word_images.len() != before
    }
}

fn parse_id(raw: &str) -> Option<u64> {
    raw.trim().parse().ok().filter(|id| *id != 0)
}
