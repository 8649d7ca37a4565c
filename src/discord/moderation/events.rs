// Discord message -> InboundEvent translation, and the per-message handler.
//
// This layer is THIN - no policy, just translation and logging.

use crate::core::moderation::{InboundEvent, MessageRef, ReplyTarget, Sender};
use crate::discord::Data;
use poise::serenity_prelude as serenity;

const CHECK_COMMANDS: &[&str] = &["!check", "/check"];

/// Whether the message text invokes the check command.
fn is_check_command(content: &str) -> bool {
    content
        .split_whitespace()
        .next()
        .map(|word| CHECK_COMMANDS.iter().any(|c| word.eq_ignore_ascii_case(c)))
        .unwrap_or(false)
}

fn message_ref(chat_id: u64, msg: &serenity::Message) -> MessageRef {
    MessageRef {
        chat_id,
        channel_id: msg.channel_id.get(),
        message_id: msg.id.get(),
    }
}

fn sender(user: &serenity::User) -> Sender {
    Sender {
        user_id: user.id.get(),
        display_name: user.name.clone(),
    }
}

fn text_of(msg: &serenity::Message) -> Option<String> {
    Some(msg.content.clone()).filter(|content| !content.is_empty())
}

/// Map a Discord message to the event the engine should see.
///
/// DMs, bot-authored chat messages and system messages other than member joins
/// map to `None`. Join notices are always service messages, even for bots.
pub fn inbound_event(msg: &serenity::Message) -> Option<InboundEvent> {
    let chat_id = msg.guild_id?.get();
    let message = message_ref(chat_id, msg);

    match msg.kind {
        serenity::MessageType::MemberJoin => Some(InboundEvent::ServiceMessage { message }),
        serenity::MessageType::Regular | serenity::MessageType::InlineReply => {
            if msg.author.bot {
                return None;
            }

            let reply_target = msg.referenced_message.as_deref().map(|quoted| ReplyTarget {
                message: message_ref(chat_id, quoted),
                sender: sender(&quoted.author),
                text: text_of(quoted),
            });

            if is_check_command(&msg.content) {
                Some(InboundEvent::CheckCommand {
                    message,
                    invoker: sender(&msg.author),
                    reply_target,
                })
            } else {
                Some(InboundEvent::RegularMessage {
                    message,
                    sender: sender(&msg.author),
                    text: text_of(msg),
                    reply_target,
                })
            }
        }
        _ => None,
    }
}

/// Run one Discord message through the moderation engine.
///
/// Store failures drop the event; they are logged, never shown in chat.
pub async fn handle_message(data: &Data, msg: &serenity::Message) {
    let Some(event) = inbound_event(msg) else {
        return;
    };

    // The engine logs every decision itself; only failures are logged here.
    if let Err(e) = data.moderation.handle_event(event).await {
        tracing::error!(
            chat_id = msg.guild_id.map(|g| g.get()),
            user_id = msg.author.id.get(),
            "Dropping event after moderation failure: {}",
            e
        );
    }
}
