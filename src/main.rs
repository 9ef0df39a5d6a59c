// Nami Bot - Rust Edition
// Welcome greetings, server rules, member bios, word images and a chatty AI persona

mod api;
mod commands;
mod events;
mod features;
mod health;
mod models;
mod store;
mod utils;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use poise::serenity_prelude as serenity;
use tracing::{error, info};

use crate::api::firebase::FirebaseClient;
use crate::api::llm::GeminiClient;
use crate::commands::dispatch::Dispatcher;
use crate::store::{
    CachedStore, ConfigStore, FirestoreStore, GuildCache, JsonFileStore, RedisCache, TimedStore,
};
use crate::utils::config::{Settings, StoreBackend};
use crate::utils::logging::{self, ErrorRing};

/// User data shared across all commands and event handlers
pub struct Data {
    pub store: Arc<dyn ConfigStore>,
    pub dispatcher: Dispatcher,
    pub gemini: GeminiClient,
    pub errors: ErrorRing,
    /// Set once the status rotation task is running
    pub presence_started: AtomicBool,
}

// Manual Debug impl since the store and clients don't impl Debug
impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("store", &"dyn ConfigStore")
            .field("gemini", &"GeminiClient")
            .field("errors", &self.errors)
            .finish()
    }
}

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = Settings::from_env();
    let log_dir = settings
        .as_ref()
        .map(|s| s.log_dir.clone())
        .unwrap_or_else(|_| "logs".into());

    // Initialize logging; the guard flushes the error file on drop
    let (errors, log_guard) = logging::init(&log_dir);
    logging::install_panic_hook();

    let code = match settings {
        Ok(settings) => match run(settings, errors).await {
            Ok(()) => 0,
            Err(e) => {
                error!("Fatal error: {:#}", e);
                1
            }
        },
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            1
        }
    };

    info!("Goodbye!");
    drop(log_guard);
    std::process::exit(code);
}

/// Pick the backend, then layer the shared cache and the timeout on top
async fn build_store(
    settings: &Settings,
    http_client: reqwest::Client,
    cache: Arc<dyn GuildCache>,
) -> anyhow::Result<Arc<dyn ConfigStore>> {
    let backend: Arc<dyn ConfigStore> = match &settings.store {
        StoreBackend::JsonFile(path) => {
            let store = JsonFileStore::open(path.clone()).await?;
            info!("Using JSON file store at {}", store.path().display());
            Arc::new(store)
        }
        StoreBackend::Firestore(key_path) => {
            let firebase = FirebaseClient::from_file(http_client, key_path)?;
            info!("Firebase client initialized");
            Arc::new(FirestoreStore::new(Arc::new(firebase)))
        }
    };

    let cached: Arc<dyn ConfigStore> = Arc::new(CachedStore::new(backend, cache));
    Ok(Arc::new(TimedStore::new(cached, settings.store_timeout)))
}

async fn run(settings: Settings, errors: ErrorRing) -> anyhow::Result<()> {
    info!("Starting Nami Bot (Rust Edition)...");

    // Build HTTP client for API calls
    let http_client = reqwest::Client::builder()
        .user_agent("Nami-Bot/1.0")
        .build()?;

    let cache = RedisCache::connect(&settings.redis_url).await?;
    let store = build_store(&settings, http_client.clone(), Arc::new(cache)).await?;

    let gemini = GeminiClient::new(
        http_client,
        &settings.gemini_endpoint,
        &settings.gemini_api_key,
        settings.ai_timeout,
    );

    let health_port = settings.health_port;
    tokio::spawn(async move {
        if let Err(e) = health::start_health_server(health_port).await {
            error!("Health server stopped: {:?}", e);
        }
    });

    let data = Data {
        dispatcher: Dispatcher::new(store.clone()),
        store,
        gemini,
        errors,
        presence_started: AtomicBool::new(false),
    };

    // Setup framework
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Command error in /{}: {:?}", ctx.command().name, error);
                            let _ = ctx
                                .say("Something went wrong while running that command.")
                                .await;
                        }
                        poise::FrameworkError::EventHandler { error, .. } => {
                            error!("Event handler error: {:?}", error);
                        }
                        err => {
                            if let Err(e) = poise::builtins::on_error(err).await {
                                error!("Error while handling error: {:?}", e);
                            }
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                info!("Bot is ready! Registering commands...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Commands registered successfully!");

                Ok(data)
            })
        })
        .build();

    // MESSAGE_CONTENT and GUILD_MEMBERS are privileged, enable them in the Discord Dev Portal
    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::ClientBuilder::new(&settings.discord_token, intents)
        .framework(framework)
        .await?;

    // Run with graceful shutdown
    let shard_manager = client.shard_manager.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to register Ctrl+C handler: {:?}", e);
            return;
        }
        info!("Shutting down...");
        shard_manager.shutdown_all().await;
    });

    client.start().await?;
    Ok(())
}
