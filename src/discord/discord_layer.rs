// Discord layer - gateway implementation, event handlers and commands.

#[path = "moderation/mod.rs"]
pub mod moderation;

use crate::core::moderation::{ModerationEngine, SpamClassifier, TrustStore};
use crate::infra::moderation::KeyLockedTrustStore;
use moderation::SerenityGateway;
use std::sync::Arc;

pub type Engine =
    ModerationEngine<KeyLockedTrustStore<Box<dyn TrustStore>>, Box<dyn SpamClassifier>, SerenityGateway>;

/// Shared state handed to every command and event.
pub struct Data {
    pub moderation: Arc<Engine>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
