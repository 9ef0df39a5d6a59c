// Centralized configuration for Nami Bot

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

/// Prefix for welcome-message settings (case-sensitive)
pub const WELCOME_PREFIX: &str = ".z";
/// Prefix for rules, about and word images (case-insensitive)
pub const NAMI_PREFIX: &str = "nami";

/// Words that can never be used as a word-image key
pub const RESERVED_WORDS: [&str; 2] = ["rules", "about"];

/// Max characters in an "about" description
pub const MAX_ABOUT_LEN: usize = 200;

/// Discord rejects messages over 2000 characters
pub const MESSAGE_CHUNK_LEN: usize = 1950;

/// Channel used for greetings when none is configured
pub const FALLBACK_WELCOME_CHANNEL: &str = "welcome";

pub const DEFAULT_GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Discord embed colors
pub mod colors {
    pub const RULE: u32 = 0xf31717;
    pub const ABOUT: u32 = 0x5c7ff6;
    pub const PRIMARY: u32 = 0x00bfff;
    pub const INFO: u32 = 0x3498db;
    pub const ERROR: u32 = 0xff0000;
}

/// Every stored image URL must pass this
pub fn is_valid_url(url: &str) -> bool {
    url.starts_with("http")
}

/// Case-insensitive check against [`RESERVED_WORDS`]
pub fn is_reserved_word(word: &str) -> bool {
    let word = word.to_lowercase();
    RESERVED_WORDS.iter().any(|w| *w == word)
}

/// Where guild configs live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// `file:<path>` - one JSON file holding every guild
    JsonFile(PathBuf),
    /// `firestore:<path>` - service account key for Firestore
    Firestore(PathBuf),
}

impl StoreBackend {
    pub fn parse(url: &str) -> Result<Self> {
        match url.split_once(':') {
            Some(("file", path)) if !path.is_empty() => Ok(Self::JsonFile(PathBuf::from(path))),
            Some(("firestore", path)) if !path.is_empty() => {
                Ok(Self::Firestore(PathBuf::from(path)))
            }
            _ => bail!(
                "DATABASE_URL must look like `file:<path.json>` or `firestore:<key.json>`, got `{}`",
                url
            ),
        }
    }
}

/// Process settings, read once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: String,
    pub store: StoreBackend,
    pub gemini_api_key: String,
    pub gemini_endpoint: String,
    pub redis_url: String,
    pub health_port: u16,
    pub log_dir: PathBuf,
    pub store_timeout: Duration,
    pub ai_timeout: Duration,
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`. Every missing required key is
    /// reported in one error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN").or_else(|| get("BOT_TOKEN"));
        let database_url = get("DATABASE_URL");
        let gemini_api_key = get("GEMINI_API_KEY");
        let redis_url = get("REDIS_URL");

        let mut missing = Vec::new();
        if discord_token.is_none() {
            missing.push("DISCORD_TOKEN");
        }
        if database_url.is_none() {
            missing.push("DATABASE_URL");
        }
        if gemini_api_key.is_none() {
            missing.push("GEMINI_API_KEY");
        }
        if redis_url.is_none() {
            missing.push("REDIS_URL");
        }

        let (Some(discord_token), Some(database_url), Some(gemini_api_key), Some(redis_url)) =
            (discord_token, database_url, gemini_api_key, redis_url)
        else {
            bail!("missing required environment variables: {}", missing.join(", "));
        };

        let health_port = match get("HEALTH_PORT") {
            Some(port) => port.parse()?,
            None => 3000,
        };

        Ok(Self {
            discord_token,
            store: StoreBackend::parse(&database_url)?,
            gemini_api_key,
            gemini_endpoint: get("GEMINI_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_GEMINI_ENDPOINT.to_string()),
            redis_url,
            health_port,
            log_dir: get("LOG_DIR").map(PathBuf::from).unwrap_or_else(|| "logs".into()),
            store_timeout: secs(get("STORE_TIMEOUT_SECS"))?,
            ai_timeout: secs(get("AI_TIMEOUT_SECS"))?,
        })
    }
}

fn secs(raw: Option<String>) -> Result<Duration> {
    Ok(match raw {
        Some(s) => Duration::from_secs(s.parse()?),
        None => Duration::from_secs(8),
    })
}
