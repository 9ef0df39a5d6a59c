// Text command parser for the `.z` and `nami` prefixes

use poise::serenity_prelude::Permissions;
use thiserror::Error;

use crate::utils::config::{NAMI_PREFIX, WELCOME_PREFIX};
use crate::utils::mentions::{parse_channel, parse_user_mention};

/// A parsed chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // `.z` family
    WelcomeHelp,
    SetWelcomeDescription(String),
    SetWelcomeImage(String),
    SetWelcomeChannel(u64),
    /// `None` clears the AI channel restriction
    SetAiChannel(Option<u64>),

    // `nami` family
    NamiHelp,
    SetRule { rule_no: u32, description: String },
    ShowRule(u32),
    DeleteRule(u32),
    SetAbout { user_id: u64, description: String },
    ShowAbout(u64),
    DeleteAbout(u64),
    SetWordImage { word: String, url: String },
    DeleteWordImage(String),
    ShowWordImage(String),
}

/// Who may run a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Anyone,
    /// Manage Server
    Moderator,
    Administrator,
}

impl Permission {
    pub fn allows(self, perms: Permissions) -> bool {
        if perms.administrator() {
            return true;
        }
        match self {
            Permission::Anyone => true,
            Permission::Moderator => perms.manage_guild(),
            Permission::Administrator => false,
        }
    }
}

/// Reply when a member lacks the permission a command needs
pub const DENIED_MESSAGE: &str = "You do not have permission to use this command.";

/// Malformed command. The message is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command. Use `.z help` for a list of commands.")]
    UnknownCommand,
    #[error("Please mention a valid user: `nami about @user ...`")]
    InvalidMention,
    #[error("Please provide a valid rule number (a positive whole number).")]
    InvalidRuleNumber,
    #[error("Please mention a valid channel or provide a valid channel ID.")]
    InvalidChannel,
    #[error("Usage: {0}")]
    Usage(&'static str),
}

impl CommandError {
    /// Permission of the family the malformed command came from. Only `.z`
    /// produces unknown-command and channel errors.
    pub fn required_permission(&self) -> Permission {
        match self {
            CommandError::UnknownCommand | CommandError::InvalidChannel => Permission::Moderator,
            CommandError::Usage(usage) if usage.starts_with("`.z") => Permission::Moderator,
            _ => Permission::Anyone,
        }
    }
}

impl Command {
    pub fn required_permission(&self) -> Permission {
        match self {
            Command::SetWelcomeDescription(_)
            | Command::SetWelcomeImage(_)
            | Command::SetWelcomeChannel(_)
            | Command::SetAiChannel(_) => Permission::Moderator,
            Command::SetRule { .. }
            | Command::DeleteRule(_)
            | Command::SetAbout { .. }
            | Command::DeleteAbout(_)
            | Command::SetWordImage { .. }
            | Command::DeleteWordImage(_) => Permission::Administrator,
            Command::WelcomeHelp
            | Command::NamiHelp
            | Command::ShowRule(_)
            | Command::ShowAbout(_)
            | Command::ShowWordImage(_) => Permission::Anyone,
        }
    }

    /// Reply for a member who lacks [`Command::required_permission`]
    pub fn denied_message(&self) -> &'static str {
        match self {
            Command::SetRule { .. } => "You do not have permission to set rules.",
            Command::DeleteRule(_) => "You do not have permission to delete rules.",
            Command::SetAbout { .. } => "You do not have permission to set user 'about' info.",
            Command::DeleteAbout(_) => "You do not have permission to delete user 'about' info.",
            Command::SetWordImage { .. } => "You do not have permission to set images.",
            Command::DeleteWordImage(_) => "You do not have permission to delete images.",
            _ => DENIED_MESSAGE,
        }
    }

    /// Whether running this command writes the guild config
    pub fn is_mutation(&self) -> bool {
        self.required_permission() != Permission::Anyone
    }
}

/// Parse a chat message. `None` means the message is not a command at all.
pub fn parse(content: &str) -> Option<Result<Command, CommandError>> {
    let content = content.trim();

    if let Some(rest) = strip_prefix(content, WELCOME_PREFIX, false) {
        return Some(parse_welcome(rest));
    }
    if let Some(rest) = strip_prefix(content, NAMI_PREFIX, true) {
        return Some(parse_nami(rest));
    }
    None
}

/// The prefix must be followed by whitespace or the end of the message,
/// so `.zoo` and `namibia` are not commands.
fn strip_prefix<'a>(content: &'a str, prefix: &str, ignore_case: bool) -> Option<&'a str> {
    let head = content.get(..prefix.len())?;
    let matches = if ignore_case {
        head.eq_ignore_ascii_case(prefix)
    } else {
        head == prefix
    };
    if !matches {
        return None;
    }

    let rest = &content[prefix.len()..];
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

/// Split off the first whitespace-delimited token; the remainder keeps
/// its inner formatting (newlines etc.)
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(i) => Some((&s[..i], s[i..].trim_start())),
        None => Some((s, "")),
    }
}

fn parse_rule_no(token: &str) -> Result<u32, CommandError> {
    token
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or(CommandError::InvalidRuleNumber)
}

fn parse_welcome(rest: &str) -> Result<Command, CommandError> {
    let Some((command, args)) = next_token(rest) else {
        return Err(CommandError::UnknownCommand);
    };

    match command.to_lowercase().as_str() {
        "description" => {
            let text = args.trim();
            if text.is_empty() {
                return Err(CommandError::Usage("`.z description <new description>`"));
            }
            Ok(Command::SetWelcomeDescription(text.to_string()))
        }
        "image" => match next_token(args) {
            Some((url, _)) => Ok(Command::SetWelcomeImage(url.to_string())),
            None => Err(CommandError::Usage("`.z image <url>`")),
        },
        "channel" => next_token(args)
            .and_then(|(token, _)| parse_channel(token))
            .map(Command::SetWelcomeChannel)
            .ok_or(CommandError::InvalidChannel),
        "aichannel" => match next_token(args) {
            Some((token, _)) if matches!(token.to_lowercase().as_str(), "off" | "none") => {
                Ok(Command::SetAiChannel(None))
            }
            Some((token, _)) => parse_channel(token)
                .map(|id| Command::SetAiChannel(Some(id)))
                .ok_or(CommandError::InvalidChannel),
            None => Err(CommandError::InvalidChannel),
        },
        "help" => Ok(Command::WelcomeHelp),
        _ => Err(CommandError::UnknownCommand),
    }
}

fn parse_nami(rest: &str) -> Result<Command, CommandError> {
    let Some((command, args)) = next_token(rest) else {
        return Err(CommandError::Usage("`nami <word>` or `nami help`"));
    };
    let command = command.to_lowercase();

    // Multi-word forms first: `set rule`, `rule`, `about`
    match command.as_str() {
        "set" => parse_set(args),
        "rule" => {
            let (rule_no, tail) =
                next_token(args).ok_or(CommandError::Usage("`nami rule <ruleNo>`"))?;
            let rule_no = parse_rule_no(rule_no)?;
            match next_token(tail) {
                Some((sub, _)) if sub.eq_ignore_ascii_case("delete") => {
                    Ok(Command::DeleteRule(rule_no))
                }
                _ => Ok(Command::ShowRule(rule_no)),
            }
        }
        "about" => {
            let (mention, tail) = next_token(args)
                .ok_or(CommandError::Usage("`nami about @user [description|delete]`"))?;
            let user_id = parse_user_mention(mention).ok_or(CommandError::InvalidMention)?;
            let tail = tail.trim();

            if tail.eq_ignore_ascii_case("delete") {
                Ok(Command::DeleteAbout(user_id))
            } else if tail.is_empty() {
                Ok(Command::ShowAbout(user_id))
            } else {
                Ok(Command::SetAbout {
                    user_id,
                    description: tail.to_string(),
                })
            }
        }
        "delete" => match next_token(args) {
            Some((word, _)) => Ok(Command::DeleteWordImage(word.to_lowercase())),
            None => Err(CommandError::Usage("`nami delete <word>`")),
        },
        "help" => Ok(Command::NamiHelp),
        _ => Ok(Command::ShowWordImage(command)),
    }
}

fn parse_set(args: &str) -> Result<Command, CommandError> {
    let (first, tail) = next_token(args).ok_or(CommandError::Usage("`nami set <word> <url>`"))?;

    if first.eq_ignore_ascii_case("rule") {
        const USAGE: &str = "`nami set rule <ruleNo> <description>`";
        let (rule_no, description) = next_token(tail).ok_or(CommandError::Usage(USAGE))?;
        let rule_no = parse_rule_no(rule_no)?;
        let description = description.trim();
        if description.is_empty() {
            return Err(CommandError::Usage(USAGE));
        }
        return Ok(Command::SetRule {
            rule_no,
            description: description.to_string(),
        });
    }

    match next_token(tail) {
        Some((url, _)) => Ok(Command::SetWordImage {
            word: first.to_lowercase(),
            url: url.to_string(),
        }),
        None => Err(CommandError::Usage("`nami set <word> <url>`")),
    }
}
