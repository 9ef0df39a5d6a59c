// Runs parsed text commands against the guild config store

use std::sync::Arc;

use dashmap::DashMap;
use poise::serenity_prelude::Permissions;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::help::{NAMI_HELP, WELCOME_HELP};
use super::parser::{Command, CommandError, DENIED_MESSAGE};
use crate::models::guild::{ConfigError, GuildConfig};
use crate::store::{ConfigStore, StoreError};
use crate::utils::formatters::channel_mention;

/// Outcome of a command, rendered into Discord messages by the event layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Short confirmation, sent as a reply
    Ack(String),
    /// Longer text (help), sent as a reply
    Text(String),
    Rule { rule_no: u32, description: String },
    About { user_id: u64, description: String },
    WordImage { word: String, url: String },
    Denied(String),
    /// Bad input or missing entry
    Invalid(String),
    /// The store failed; details are in the log
    Unavailable,
}

/// Apology for [`Response::Unavailable`]
pub const UNAVAILABLE_MESSAGE: &str =
    "Sorry, I couldn't reach my settings right now. Please try again in a moment.";

/// Who is running the command, and where
pub struct Invocation<'a> {
    pub guild_id: u64,
    pub permissions: Permissions,
    /// Channel IDs that exist in the guild
    pub guild_channels: &'a [u64],
}

pub struct Dispatcher {
    store: Arc<dyn ConfigStore>,
    guild_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            guild_locks: DashMap::new(),
        }
    }

    /// Handle a message that [`super::parser::parse`] recognised
    pub async fn handle(
        &self,
        parsed: Result<Command, CommandError>,
        invocation: &Invocation<'_>,
    ) -> Response {
        let command = match parsed {
            Ok(command) => command,
            Err(e) if !e.required_permission().allows(invocation.permissions) => {
                return Response::Denied(DENIED_MESSAGE.to_string());
            }
            Err(e) => {
                debug!("Rejected command in guild {}: {:?}", invocation.guild_id, e);
                return Response::Invalid(e.to_string());
            }
        };

        if !command.required_permission().allows(invocation.permissions) {
            return Response::Denied(command.denied_message().to_string());
        }

        let result = if command.is_mutation() {
            self.mutate(command, invocation).await
        } else {
            self.read(command, invocation).await
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                error!(
                    "Config store failed for guild {}: {:?}",
                    invocation.guild_id, e
                );
                Response::Unavailable
            }
        }
    }

    async fn read(
        &self,
        command: Command,
        invocation: &Invocation<'_>,
    ) -> Result<Response, StoreError> {
        match command {
            Command::WelcomeHelp => return Ok(Response::Text(WELCOME_HELP.to_string())),
            Command::NamiHelp => return Ok(Response::Text(NAMI_HELP.to_string())),
            _ => {}
        }

        let config = self
            .store
            .find_or_default(&invocation.guild_id.to_string())
            .await?;

        let response = match command {
            Command::ShowRule(rule_no) => match config.rule(rule_no) {
                Some(rule) => Response::Rule {
                    rule_no,
                    description: rule.description.clone(),
                },
                None => Response::Invalid(format!(
                    "Rule #{} not found. Use `nami set rule {} <description>` to add it.",
                    rule_no, rule_no
                )),
            },
            Command::ShowAbout(user_id) => match config.about(user_id) {
                Some(about) => Response::About {
                    user_id,
                    description: about.description.clone(),
                },
                None => Response::Invalid("No 'about' info found for that user.".to_string()),
            },
            Command::ShowWordImage(word) => match config.word_image(&word) {
                Some(url) => Response::WordImage {
                    url: url.to_string(),
                    word,
                },
                None => Response::Invalid(format!(
                    "No image found for the word `{}`. Use `nami set <word> <url>` to add one.",
                    word
                )),
            },
            _ => unreachable!("mutations are routed to Dispatcher::mutate"),
        };
        Ok(response)
    }

    async fn mutate(
        &self,
        command: Command,
        invocation: &Invocation<'_>,
    ) -> Result<Response, StoreError> {
        // Reject unknown channels before touching the store
        if let Command::SetWelcomeChannel(id) | Command::SetAiChannel(Some(id)) = command {
            if !invocation.guild_channels.contains(&id) {
                return Ok(Response::Invalid(CommandError::InvalidChannel.to_string()));
            }
        }

        let server_id = invocation.guild_id.to_string();
        let lock = self
            .guild_locks
            .entry(server_id.clone())
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        let mut config = self.store.get_or_create(&server_id).await?;
        match apply(&mut config, &command) {
            Ok(Applied::Changed(ack)) => {
                self.store.save(&config).await?;
                info!("Guild {} config updated: {:?}", server_id, command);
                Ok(Response::Ack(ack))
            }
            Ok(Applied::NotFound(message)) => Ok(Response::Invalid(message)),
            Err(e) => Ok(Response::Invalid(e.to_string())),
        }
    }
}

enum Applied {
    Changed(String),
    NotFound(String),
}

/// Apply a mutation in memory; the caller saves on `Changed`
fn apply(config: &mut GuildConfig, command: &Command) -> Result<Applied, ConfigError> {
    let applied = match command {
        Command::SetWelcomeDescription(text) => {
            config.set_welcome_description(text)?;
            Applied::Changed("Updated the welcome description.".to_string())
        }
        Command::SetWelcomeImage(url) => {
            config.set_welcome_image(url)?;
            Applied::Changed("Updated the welcome image.".to_string())
        }
        Command::SetWelcomeChannel(id) => {
            config.set_welcome_channel(*id);
            Applied::Changed(format!(
                "Welcome messages will now be sent to {}.",
                channel_mention(Some(*id))
            ))
        }
        Command::SetAiChannel(channel) => {
            config.set_ai_channel(*channel);
            Applied::Changed(match channel {
                Some(_) => format!("AI replies are now limited to {}.", channel_mention(*channel)),
                None => "AI replies are now allowed in every channel.".to_string(),
            })
        }
        Command::SetRule {
            rule_no,
            description,
        } => {
            config.upsert_rule(*rule_no, description)?;
            Applied::Changed(format!("Rule #{} set successfully.", rule_no))
        }
        Command::DeleteRule(rule_no) => {
            if config.delete_rule(*rule_no) {
                Applied::Changed(format!("Rule #{} deleted successfully.", rule_no))
            } else {
                Applied::NotFound(format!("Rule #{} does not exist.", rule_no))
            }
        }
        Command::SetAbout {
            user_id,
            description,
        } => {
            config.upsert_about(*user_id, description)?;
            Applied::Changed(format!("'About' info updated for <@{}>.", user_id))
        }
        Command::DeleteAbout(user_id) => {
            if config.delete_about(*user_id) {
                Applied::Changed("User 'about' info deleted successfully.".to_string())
            } else {
                Applied::NotFound("That user doesn't have an 'about' info set.".to_string())
            }
        }
        Command::SetWordImage { word, url } => {
            config.upsert_word_image(word, url)?;
            Applied::Changed(format!("Image for word `{}` set successfully.", word))
        }
        Command::DeleteWordImage(word) => {
            if config.delete_word_image(word) {
                Applied::Changed(format!("Image for word `{}` deleted successfully.", word))
            } else {
                Applied::NotFound(
                    "Word not found. Use `nami set <word> <url>` to add it first.".to_string(),
                )
            }
        }
        Command::WelcomeHelp
        | Command::NamiHelp
        | Command::ShowRule(_)
        | Command::ShowAbout(_)
        | Command::ShowWordImage(_) => unreachable!("reads are routed to Dispatcher::read"),
    };
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parser::parse;
    use crate::store::JsonFileStore;
    use tempfile::{tempdir, TempDir};

    const CHANNELS: &[u64] = &[10, 20];

    async fn setup() -> (TempDir, Arc<JsonFileStore>, Dispatcher) {
        let dir = tempdir().unwrap();
        let store = Arc::new(
            JsonFileStore::open(dir.path().join("servers.json"))
                .await
                .unwrap(),
        );
        let dispatcher = Dispatcher::new(store.clone());
        (dir, store, dispatcher)
    }

    fn as_admin() -> Invocation<'static> {
        Invocation {
            guild_id: 1,
            permissions: Permissions::ADMINISTRATOR,
            guild_channels: CHANNELS,
        }
    }

    fn as_member() -> Invocation<'static> {
        Invocation {
            guild_id: 1,
            permissions: Permissions::SEND_MESSAGES,
            guild_channels: CHANNELS,
        }
    }

    fn as_moderator() -> Invocation<'static> {
        Invocation {
            guild_id: 1,
            permissions: Permissions::MANAGE_GUILD,
            guild_channels: CHANNELS,
        }
    }

    async fn run(dispatcher: &Dispatcher, content: &str, who: &Invocation<'_>) -> Response {
        dispatcher.handle(parse(content).unwrap(), who).await
    }

    #[tokio::test]
    async fn test_rule_roundtrip_and_overwrite() {
        let (_dir, _store, dispatcher) = setup().await;

        run(&dispatcher, "nami set rule 1 Be kind", &as_admin()).await;
        run(&dispatcher, "nami set rule 1 Be very kind", &as_admin()).await;

        assert_eq!(
            run(&dispatcher, "nami rule 1", &as_member()).await,
            Response::Rule {
                rule_no: 1,
                description: "Be very kind".into()
            }
        );
    }

    #[tokio::test]
    async fn test_member_cannot_set_rule() {
        let (_dir, store, dispatcher) = setup().await;

        let response = run(&dispatcher, "nami set rule 1 text", &as_member()).await;
        assert_eq!(
            response,
            Response::Denied("You do not have permission to set rules.".into())
        );
        // denied before any store access
        assert!(store.find("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_moderator_limits() {
        let (_dir, _store, dispatcher) = setup().await;

        assert!(matches!(
            run(&dispatcher, ".z description Hi {user}", &as_moderator()).await,
            Response::Ack(_)
        ));
        assert!(matches!(
            run(&dispatcher, "nami set cat https://img/cat.png", &as_moderator()).await,
            Response::Denied(_)
        ));
        assert_eq!(
            run(&dispatcher, ".z description Hi", &as_member()).await,
            Response::Denied("You do not have permission to use this command.".into())
        );
    }

    #[tokio::test]
    async fn test_reads_never_create() {
        let (_dir, store, dispatcher) = setup().await;

        assert!(matches!(
            run(&dispatcher, "nami rule 4", &as_member()).await,
            Response::Invalid(_)
        ));
        assert!(matches!(
            run(&dispatcher, "nami dog", &as_member()).await,
            Response::Invalid(msg) if msg.contains("`dog`")
        ));
        assert!(store.find("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_reports_not_found() {
        let (_dir, store, dispatcher) = setup().await;
        run(&dispatcher, "nami set rule 2 no spam", &as_admin()).await;

        assert_eq!(
            run(&dispatcher, "nami rule 3 delete", &as_admin()).await,
            Response::Invalid("Rule #3 does not exist.".into())
        );
        assert!(matches!(
            run(&dispatcher, "nami delete dog", &as_admin()).await,
            Response::Invalid(_)
        ));
        assert!(matches!(
            run(&dispatcher, "nami about <@5> delete", &as_admin()).await,
            Response::Invalid(_)
        ));
        assert_eq!(store.find("1").await.unwrap().unwrap().rules.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_url_not_persisted() {
        let (_dir, store, dispatcher) = setup().await;

        assert!(matches!(
            run(&dispatcher, "nami set cat notaurl", &as_admin()).await,
            Response::Invalid(_)
        ));
        assert!(matches!(
            run(&dispatcher, ".z image notaurl", &as_admin()).await,
            Response::Invalid(_)
        ));
        assert!(matches!(
            run(&dispatcher, "nami set rules https://img/r.png", &as_admin()).await,
            Response::Invalid(msg) if msg.contains("can't be used")
        ));

        let config = store.find_or_default("1").await.unwrap();
        assert!(config.word_images.is_empty());
        assert!(config.welcome_message.image.is_empty());
    }

    #[tokio::test]
    async fn test_about_length_boundary() {
        let (_dir, _store, dispatcher) = setup().await;
        let ok = format!("nami about <@7> {}", "a".repeat(200));
        let too_long = format!("nami about <@7> {}", "b".repeat(201));

        assert!(matches!(run(&dispatcher, &ok, &as_admin()).await, Response::Ack(_)));
        assert!(matches!(
            run(&dispatcher, &too_long, &as_admin()).await,
            Response::Invalid(_)
        ));
        assert_eq!(
            run(&dispatcher, "nami about <@7>", &as_member()).await,
            Response::About {
                user_id: 7,
                description: "a".repeat(200)
            }
        );
    }

    #[tokio::test]
    async fn test_channel_must_exist_in_guild() {
        let (_dir, store, dispatcher) = setup().await;

        assert_eq!(
            run(&dispatcher, ".z channel 99", &as_moderator()).await,
            Response::Invalid(CommandError::InvalidChannel.to_string())
        );
        assert_eq!(
            run(&dispatcher, ".z channel <#20>", &as_moderator()).await,
            Response::Ack("Welcome messages will now be sent to <#20>.".into())
        );
        assert!(matches!(
            run(&dispatcher, ".z aichannel off", &as_moderator()).await,
            Response::Ack(_)
        ));

        let config = store.find("1").await.unwrap().unwrap();
        assert_eq!(config.welcome_channel_id(), Some(20));
        assert_eq!(config.ai_channel_id(), None);
    }

    #[tokio::test]
    async fn test_word_image_lookup_is_case_insensitive() {
        let (_dir, _store, dispatcher) = setup().await;
        run(&dispatcher, "nami set Cat https://img/cat.png", &as_admin()).await;

        assert_eq!(
            run(&dispatcher, "NAMI CAT", &as_member()).await,
            Response::WordImage {
                word: "cat".into(),
                url: "https://img/cat.png".into()
            }
        );
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_not_lost() {
        let (_dir, store, dispatcher) = setup().await;
        let dispatcher = Arc::new(dispatcher);

        let mut handles = Vec::new();
        for n in 1..=8u32 {
            let dispatcher = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                let content = format!("nami set rule {} rule number {}", n, n);
                dispatcher.handle(parse(&content).unwrap(), &as_admin()).await
            }));
        }
        for handle in handles {
            assert!(matches!(handle.await.unwrap(), Response::Ack(_)));
        }

        assert_eq!(store.find("1").await.unwrap().unwrap().rules.len(), 8);
    }

    #[tokio::test]
    async fn test_parse_errors_become_invalid() {
        let (_dir, _store, dispatcher) = setup().await;
        assert_eq!(
            run(&dispatcher, ".z dance", &as_admin()).await,
            Response::Invalid("Unknown command. Use `.z help` for a list of commands.".into())
        );
        assert!(matches!(
            run(&dispatcher, "nami help", &as_member()).await,
            Response::Text(text) if text.contains("nami rule")
        ));
    }

    #[tokio::test]
    async fn test_malformed_welcome_command_checks_permission_first() {
        let (_dir, _store, dispatcher) = setup().await;
        let denied = Response::Denied(DENIED_MESSAGE.to_string());

        assert_eq!(run(&dispatcher, ".z dance", &as_member()).await, denied);
        assert_eq!(run(&dispatcher, ".z channel nowhere", &as_member()).await, denied);
        assert_eq!(run(&dispatcher, ".z image", &as_member()).await, denied);

        assert!(matches!(
            run(&dispatcher, ".z image", &as_moderator()).await,
            Response::Invalid(msg) if msg.contains("`.z image <url>`")
        ));
        // `nami` parse errors stay visible to everyone
        assert!(matches!(
            run(&dispatcher, "nami rule zero", &as_member()).await,
            Response::Invalid(_)
        ));
    }
}
