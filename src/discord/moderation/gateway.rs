// ChatGateway implementation over serenity's HTTP client and cache.
//
// A "chat" is a guild: chat ids are guild ids, and messages are addressed by
// channel + message id.

use crate::core::moderation::{ChatGateway, GatewayError, MessageRef};
use async_trait::async_trait;
use serenity::all::{Cache, ChannelId, CreateMessage, GuildId, Http, MessageId, UserId};
use std::sync::Arc;

const AUDIT_LOG_REASON: &str = "Spam";

pub struct SerenityGateway {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityGateway {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    /// Owner, or a member whose roles grant Administrator or Manage Messages.
    async fn member_is_admin(&self, chat_id: u64, user_id: u64) -> Result<bool, GatewayError> {
        let guild_id = GuildId::new(chat_id);
        let user_id = UserId::new(user_id);

        let member = self
            .http
            .get_member(guild_id, user_id)
            .await
            .map_err(map_serenity_error)?;

        // The cache guard is not Send, so it must be gone before the next await.
        let permissions = {
            let guild = self
                .cache
                .guild(guild_id)
                .ok_or_else(|| GatewayError::NotFound(format!("guild {} not cached", guild_id)))?;
            if guild.owner_id == user_id {
                return Ok(true);
            }
            guild.member_permissions(&member)
        };

        Ok(permissions.administrator() || permissions.manage_messages())
    }
}

fn map_serenity_error(e: serenity::Error) -> GatewayError {
    if let serenity::Error::Http(http_error) = &e {
        match http_error.status_code().map(|status| status.as_u16()) {
            Some(403) => return GatewayError::PermissionDenied(e.to_string()),
            Some(404) => return GatewayError::NotFound(e.to_string()),
            _ => {}
        }
    }
    GatewayError::Transport(e.to_string())
}

#[async_trait]
impl ChatGateway for SerenityGateway {
    async fn is_admin(&self, chat_id: u64, user_id: u64) -> bool {
        match self.member_is_admin(chat_id, user_id).await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                tracing::warn!(chat_id, user_id, "Admin lookup failed: {}", e);
                false
            }
        }
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), GatewayError> {
        self.http
            .delete_message(
                ChannelId::new(message.channel_id),
                MessageId::new(message.message_id),
                Some(AUDIT_LOG_REASON),
            )
            .await
            .map_err(map_serenity_error)
    }

    async fn ban_user(&self, chat_id: u64, user_id: u64) -> Result<(), GatewayError> {
        self.http
            .ban_user(
                GuildId::new(chat_id),
                UserId::new(user_id),
                0,
                Some(AUDIT_LOG_REASON),
            )
            .await
            .map_err(map_serenity_error)
    }

    async fn reply(&self, message: &MessageRef, text: &str) -> Result<(), GatewayError> {
        let channel_id = ChannelId::new(message.channel_id);
        let builder = CreateMessage::new()
            .content(text)
            .reference_message((channel_id, MessageId::new(message.message_id)));

        channel_id
            .send_message(&self.http, builder)
            .await
            .map(|_| ())
            .map_err(map_serenity_error)
    }
}
