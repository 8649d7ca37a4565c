// Moderation engine - core business logic for the probation gate.
//
// This service handles:
// - Trust promotion (first clean message moves a user out of probation)
// - Spam removal for users still on probation (delete, then ban non-admins)
// - The admin `!check` override (delete + ban + demote on confirmed spam)
// - Removal of join/leave notices
//
// NO Discord dependencies here - just pure domain logic behind three ports.

use super::moderation_models::{
    non_blank, InboundEvent, MessageRef, ModerationOutcome, ReplyTarget, Sender, SpamVerdict,
    TrustRecord, CHECK_CLEAN_REPLY, CHECK_PROMPT_REPLY, CHECK_SPAM_BANNED_REPLY,
    CHECK_SPAM_REPLY,
};
use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Classifier gave an unexpected answer: {0}")]
    UnexpectedAnswer(String),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Missing permissions: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// PORTS
// ============================================================================

/// Durable (chat, user) -> trusted mapping.
#[async_trait]
pub trait TrustStore: Send + Sync {
    /// Stored trust flag, or `Ok(false)` when the pair was never written.
    ///
    /// A missing record is the normal state for a new user, not an error.
    /// Only I/O failures produce `Err`.
    async fn get(&self, chat_id: u64, user_id: u64) -> Result<bool, StoreError>;

    /// Insert or overwrite the trust flag for the pair.
    async fn set(&self, chat_id: u64, user_id: u64, trusted: bool) -> Result<(), StoreError>;
}

#[async_trait]
impl TrustStore for Box<dyn TrustStore> {
    async fn get(&self, chat_id: u64, user_id: u64) -> Result<bool, StoreError> {
        (**self).get(chat_id, user_id).await
    }

    async fn set(&self, chat_id: u64, user_id: u64, trusted: bool) -> Result<(), StoreError> {
        (**self).set(chat_id, user_id, trusted).await
    }
}

/// Opaque text -> spam verdict function.
#[async_trait]
pub trait SpamClassifier: Send + Sync {
    /// Classify non-empty text.
    async fn classify(&self, text: &str) -> Result<SpamVerdict, ClassifierError>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

// Lets main pick the classifier backend at runtime.
#[async_trait]
impl SpamClassifier for Box<dyn SpamClassifier> {
    async fn classify(&self, text: &str) -> Result<SpamVerdict, ClassifierError> {
        (**self).classify(text).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Actions against the chat platform.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Whether the user administers the chat. Lookup failures count as `false`.
    async fn is_admin(&self, chat_id: u64, user_id: u64) -> bool;

    async fn delete_message(&self, message: &MessageRef) -> Result<(), GatewayError>;

    async fn ban_user(&self, chat_id: u64, user_id: u64) -> Result<(), GatewayError>;

    async fn reply(&self, message: &MessageRef, text: &str) -> Result<(), GatewayError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Decides what to do with every inbound event.
///
/// Holds no per-user state of its own: each decision re-reads the store.
pub struct ModerationEngine<S: TrustStore, C: SpamClassifier, G: ChatGateway> {
    store: S,
    classifier: C,
    gateway: G,
}

impl<S: TrustStore, C: SpamClassifier, G: ChatGateway> ModerationEngine<S, C, G> {
    pub fn new(store: S, classifier: C, gateway: G) -> Self {
        Self {
            store,
            classifier,
            gateway,
        }
    }

    /// Apply the moderation policy to one event.
    ///
    /// Only store failures are returned; classifier and gateway failures are
    /// logged and the event is still handled to completion.
    pub async fn handle_event(
        &self,
        event: InboundEvent,
    ) -> Result<ModerationOutcome, ModerationError> {
        let chat_id = event.chat_id();
        let outcome = match event {
            InboundEvent::RegularMessage {
                message,
                sender,
                text,
                reply_target: _,
            } => {
                self.handle_regular_message(&message, &sender, text.as_deref())
                    .await?
            }
            InboundEvent::CheckCommand {
                message,
                invoker,
                reply_target,
            } => {
                self.handle_check_command(&message, &invoker, reply_target.as_ref())
                    .await?
            }
            InboundEvent::ServiceMessage { message } => {
                self.handle_service_message(&message).await
            }
        };

        tracing::info!(chat_id, %outcome, "Moderation decision");
        Ok(outcome)
    }

    /// Current trust state of a user, read-only.
    pub async fn trust_status(
        &self,
        chat_id: u64,
        user_id: u64,
    ) -> Result<TrustRecord, ModerationError> {
        let trusted = self.store.get(chat_id, user_id).await?;
        Ok(TrustRecord {
            chat_id,
            user_id,
            trusted,
        })
    }

    async fn handle_regular_message(
        &self,
        message: &MessageRef,
        sender: &Sender,
        text: Option<&str>,
    ) -> Result<ModerationOutcome, ModerationError> {
        let Some(text) = non_blank(text) else {
            return Ok(ModerationOutcome::Ignored);
        };

        if !self.classify(text).await.is_spam() {
            self.store.set(message.chat_id, sender.user_id, true).await?;
            return Ok(ModerationOutcome::Accepted);
        }

        tracing::info!(
            chat_id = message.chat_id,
            user_id = sender.user_id,
            "Detected spam message from {}: {:?}",
            sender.display_name,
            text
        );

        if self.store.get(message.chat_id, sender.user_id).await? {
            tracing::info!(
                chat_id = message.chat_id,
                user_id = sender.user_id,
                "Sender is trusted, leaving message in place"
            );
            return Ok(ModerationOutcome::Tolerated);
        }

        tracing::info!(
            chat_id = message.chat_id,
            user_id = sender.user_id,
            "Sender is on probation, deleting spam message"
        );
        self.delete(message).await;
        let banned = self.ban_unless_admin(message.chat_id, sender).await;

        Ok(ModerationOutcome::Removed { banned })
    }

    async fn handle_check_command(
        &self,
        message: &MessageRef,
        invoker: &Sender,
        reply_target: Option<&ReplyTarget>,
    ) -> Result<ModerationOutcome, ModerationError> {
        if !self.gateway.is_admin(message.chat_id, invoker.user_id).await {
            return Ok(ModerationOutcome::CheckIgnored);
        }

        tracing::info!(
            chat_id = message.chat_id,
            user_id = invoker.user_id,
            "Handling check for admin {}",
            invoker.display_name
        );

        let Some((target, text)) = reply_target.and_then(|t| t.checkable_text().map(|x| (t, x)))
        else {
            self.send_reply(message, CHECK_PROMPT_REPLY).await;
            return Ok(ModerationOutcome::CheckPrompted);
        };

        if !self.classify(text).await.is_spam() {
            self.send_reply(message, CHECK_CLEAN_REPLY).await;
            return Ok(ModerationOutcome::CheckClean);
        }

        // Demote first: a store failure must drop the event before any action runs.
        self.store
            .set(target.message.chat_id, target.sender.user_id, false)
            .await?;
        self.delete(&target.message).await;
        let banned = self
            .ban_unless_admin(target.message.chat_id, &target.sender)
            .await;

        tracing::info!(
            chat_id = target.message.chat_id,
            user_id = target.sender.user_id,
            banned,
            "Deleted spam message from {} on admin check: {:?}",
            target.sender.display_name,
            text
        );

        let reply = if banned {
            CHECK_SPAM_BANNED_REPLY
        } else {
            CHECK_SPAM_REPLY
        };
        self.send_reply(message, reply).await;

        Ok(ModerationOutcome::CheckConfirmedSpam { banned })
    }

    async fn handle_service_message(&self, message: &MessageRef) -> ModerationOutcome {
        self.delete(message).await;
        ModerationOutcome::ServiceRemoved
    }

    /// Classify, treating any classifier failure as a clean message.
    async fn classify(&self, text: &str) -> SpamVerdict {
        match self.classifier.classify(text).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(
                    classifier = self.classifier.name(),
                    "Classifier failed, treating message as not spam: {}",
                    e
                );
                SpamVerdict::NotSpam
            }
        }
    }

    async fn delete(&self, message: &MessageRef) {
        if let Err(e) = self.gateway.delete_message(message).await {
            tracing::warn!(
                chat_id = message.chat_id,
                message_id = message.message_id,
                "Failed to delete message: {}",
                e
            );
        }
    }

    /// Ban the sender unless they administer the chat. Returns whether a ban landed.
    async fn ban_unless_admin(&self, chat_id: u64, sender: &Sender) -> bool {
        if self.gateway.is_admin(chat_id, sender.user_id).await {
            return false;
        }

        match self.gateway.ban_user(chat_id, sender.user_id).await {
            Ok(()) => {
                tracing::info!(chat_id, user_id = sender.user_id, "Banned {}", sender.display_name);
                true
            }
            Err(e) => {
                tracing::warn!(chat_id, user_id = sender.user_id, "Failed to ban user: {}", e);
                false
            }
        }
    }

    async fn send_reply(&self, message: &MessageRef, text: &str) {
        if let Err(e) = self.gateway.reply(message, text).await {
            tracing::warn!(
                chat_id = message.chat_id,
                message_id = message.message_id,
                "Failed to send reply: {}",
                e
            );
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
