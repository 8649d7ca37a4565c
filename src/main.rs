// This is the entry point of the anti-spam bot.
//
// **Architecture Overview:**
// - `core/` = Moderation policy and its ports (platform-agnostic)
// - `infra/` = Implementations of core traits (trust stores, classifiers)
// - `discord/` = Discord-specific adapters (gateway, events, commands)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
mod config;
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::config::{BotConfig, ClassifierSettings, StoreSettings};
use crate::core::moderation::{ModerationEngine, SpamClassifier, TrustStore};
use crate::discord::moderation::{events, SerenityGateway};
use crate::discord::{Data, Error};
use crate::infra::classifier::{KeywordClassifier, OpenRouterClassifier};
use crate::infra::moderation::{InMemoryTrustStore, KeyLockedTrustStore, SqliteTrustStore};
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Event handler for non-command Discord events.
/// Serenity runs every event on its own task, so slow moderation of one
/// message never holds up the next.
async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Message { new_message } = event {
        events::handle_message(data, new_message).await;
    }

    Ok(())
}

async fn build_store(settings: &StoreSettings) -> anyhow::Result<Box<dyn TrustStore>> {
    match settings {
        StoreSettings::Sqlite { url } => {
            let store = SqliteTrustStore::connect(url)
                .await
                .with_context(|| format!("Failed to open trust database at {}", url))?;
            tracing::info!("Trust records stored in {}", url);
            Ok(Box::new(store))
        }
        StoreSettings::Memory => {
            tracing::warn!("Trust records kept in memory; everyone is back on probation after a restart");
            Ok(Box::new(InMemoryTrustStore::new()))
        }
    }
}

fn build_classifier(settings: &ClassifierSettings) -> anyhow::Result<Box<dyn SpamClassifier>> {
    let classifier: Box<dyn SpamClassifier> = match settings {
        ClassifierSettings::OpenRouter {
            api_key,
            model,
            timeout,
        } => Box::new(OpenRouterClassifier::new(
            api_key.clone(),
            model.clone(),
            *timeout,
        )?),
        ClassifierSettings::Keywords {
            file: Some(path),
            min_matches,
        } => Box::new(KeywordClassifier::from_file(path, *min_matches)?),
        ClassifierSettings::Keywords {
            file: None,
            min_matches,
        } => Box::new(KeywordClassifier::with_defaults(*min_matches)?),
    };
    tracing::info!("Using {} spam classifier", classifier.name());
    Ok(classifier)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = BotConfig::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // The store and classifier are built here; the gateway needs the client's
    // HTTP handle and cache, so the engine itself is assembled in setup().

    let store = KeyLockedTrustStore::new(build_store(&config.store).await?);
    let classifier = build_classifier(&config.classifier)?;

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS; // Guild roles and owner for admin checks

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                discord::moderation::commands::start(),
                discord::moderation::commands::trust(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                tracing::info!("Connected as {}", ready.user.name);

                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("Commands registered");

                let gateway = SerenityGateway::new(ctx.http.clone(), ctx.cache.clone());
                let engine = ModerationEngine::new(store, classifier, gateway);

                Ok(Data {
                    moderation: Arc::new(engine),
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
