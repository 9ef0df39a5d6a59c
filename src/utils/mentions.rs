// Discord mention syntax helpers

use once_cell::sync::Lazy;
use regex::Regex;

static USER_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<@!?(\d+)>$").unwrap());
static CHANNEL_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<#(\d+)>$").unwrap());
static ANY_USER_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@!?\d+>").unwrap());

/// `<@123>` / `<@!123>` -> 123
pub fn parse_user_mention(token: &str) -> Option<u64> {
    USER_MENTION
        .captures(token)
        .and_then(|c| c[1].parse().ok())
        .filter(|id| *id != 0)
}

/// `<#123>` or a bare `123` -> 123
pub fn parse_channel(token: &str) -> Option<u64> {
    let digits = match CHANNEL_MENTION.captures(token) {
        Some(c) => c.get(1).map(|m| m.as_str())?,
        None => token,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|id| *id != 0)
}

/// Remove every user mention and collapse leftover whitespace
pub fn strip_user_mentions(text: &str) -> String {
    ANY_USER_MENTION
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_mention() {
        assert_eq!(parse_user_mention("<@123>"), Some(123));
        assert_eq!(parse_user_mention("<@!456>"), Some(456));
        assert_eq!(parse_user_mention("@bob"), None);
        assert_eq!(parse_user_mention("<@abc>"), None);
        assert_eq!(parse_user_mention("<@123> extra"), None);
        assert_eq!(parse_user_mention("<#123>"), None);
    }

    #[test]
    fn test_parse_channel() {
        assert_eq!(parse_channel("<#789>"), Some(789));
        assert_eq!(parse_channel("789"), Some(789));
        assert_eq!(parse_channel("#general"), None);
        assert_eq!(parse_channel("<#>"), None);
        assert_eq!(parse_channel("0"), None);
    }

    #[test]
    fn test_strip_user_mentions() {
        assert_eq!(strip_user_mentions("<@1> hey   there <@!2>"), "hey there");
        assert_eq!(strip_user_mentions("<@1>"), "");
    }
}
