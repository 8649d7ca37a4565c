// Bot configuration, read from the environment (and `.env` via dotenv in main).

use anyhow::{anyhow, Context};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/trust.db";
const DEFAULT_OPENROUTER_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 10;

/// Where trust records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSettings {
    Sqlite { url: String },
    Memory,
}

/// Which classifier backend to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierSettings {
    OpenRouter {
        api_key: String,
        model: String,
        timeout: Duration,
    },
    Keywords {
        file: Option<PathBuf>,
        min_matches: usize,
    },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub store: StoreSettings,
    pub classifier: ClassifierSettings,
}

impl BotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key -> value lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN").ok_or_else(|| {
            anyhow!(
                "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token."
            )
        })?;

        let store = match get("DATABASE_URL") {
            Some(url) if url.eq_ignore_ascii_case("memory") => StoreSettings::Memory,
            Some(url) => StoreSettings::Sqlite { url },
            None => StoreSettings::Sqlite {
                url: DEFAULT_DATABASE_URL.to_string(),
            },
        };

        let classifier = match get("OPENROUTER_API_KEY") {
            Some(api_key) => {
                let timeout_secs = match get("CLASSIFIER_TIMEOUT_SECS") {
                    Some(v) => v
                        .parse::<u64>()
                        .with_context(|| format!("Invalid CLASSIFIER_TIMEOUT_SECS: {}", v))?,
                    None => DEFAULT_CLASSIFIER_TIMEOUT_SECS,
                };
                ClassifierSettings::OpenRouter {
                    api_key,
                    model: get("OPENROUTER_MODEL")
                        .unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
                    timeout: Duration::from_secs(timeout_secs),
                }
            }
            None => {
                let min_matches = match get("SPAM_KEYWORDS_MIN_MATCHES") {
                    Some(v) => v
                        .parse::<usize>()
                        .with_context(|| format!("Invalid SPAM_KEYWORDS_MIN_MATCHES: {}", v))?,
                    None => 1,
                };
                ClassifierSettings::Keywords {
                    file: get("SPAM_KEYWORDS_FILE").map(PathBuf::from),
                    min_matches,
                }
            }
        };

        Ok(Self {
            discord_token,
            store,
            classifier,
        })
    }
}
