// Moderation domain models - data structures for the probation gate.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer converts its messages into `InboundEvent`s and turns the
// engine's gateway calls back into Discord actions.

use serde::{Deserialize, Serialize};

pub const CHECK_PROMPT_REPLY: &str =
    "Please reply to the text message you want to check for spam.";
pub const CHECK_SPAM_REPLY: &str = "Spam removed.";
pub const CHECK_SPAM_BANNED_REPLY: &str = "Spam removed and the sender was banned.";
pub const CHECK_CLEAN_REPLY: &str = "This message is not spam.";
pub const START_REPLY: &str = "Hi! Add me to your server and give me the Manage Messages \
    and Ban Members permissions, and I will keep it free of spam. New members are on \
    probation until their first clean message. Admins can reply to any message with \
    `!check` to have it re-checked.";

/// What the classifier thinks of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpamVerdict {
    Spam,
    NotSpam,
}

impl SpamVerdict {
    pub fn is_spam(self) -> bool {
        matches!(self, SpamVerdict::Spam)
    }
}

/// Trust state of one user in one chat.
///
/// `trusted == false` is Probation, the state every user starts in.
/// A missing record means exactly the same thing as `trusted == false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRecord {
    pub chat_id: u64,
    pub user_id: u64,
    pub trusted: bool,
}

/// Where a message lives.
///
/// On Discord the chat is the guild and the message sits in one of its channels,
/// so both are needed to delete or reply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
}

/// Who sent a message. The display name is only used in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub user_id: u64,
    pub display_name: String,
}

/// The message a command or message replies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub message: MessageRef,
    pub sender: Sender,
    pub text: Option<String>,
}

impl ReplyTarget {
    /// Text worth classifying: present and not just whitespace.
    pub fn checkable_text(&self) -> Option<&str> {
        non_blank(self.text.as_deref())
    }
}

/// Events the moderation engine understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Any ordinary chat message.
    RegularMessage {
        message: MessageRef,
        sender: Sender,
        text: Option<String>,
        reply_target: Option<ReplyTarget>,
    },
    /// An admin asking for the replied-to message to be checked.
    CheckCommand {
        message: MessageRef,
        invoker: Sender,
        reply_target: Option<ReplyTarget>,
    },
    /// Join/leave notices.
    ServiceMessage { message: MessageRef },
}

impl InboundEvent {
    pub fn chat_id(&self) -> u64 {
        match self {
            InboundEvent::RegularMessage { message, .. }
            | InboundEvent::CheckCommand { message, .. }
            | InboundEvent::ServiceMessage { message } => message.chat_id,
        }
    }
}

/// What the engine decided for a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationOutcome {
    /// Nothing to do (e.g. a message without text).
    Ignored,
    /// Clean message; the sender is now trusted.
    Accepted,
    /// Spam from a trusted sender, left alone.
    Tolerated,
    /// Spam from a sender on probation was deleted.
    Removed { banned: bool },
    /// `CheckCommand` from someone who is not an admin.
    CheckIgnored,
    /// `CheckCommand` without a text message to check.
    CheckPrompted,
    /// `CheckCommand` confirmed spam; target deleted and demoted.
    CheckConfirmedSpam { banned: bool },
    /// `CheckCommand` found the target clean.
    CheckClean,
    /// Join/leave notice deleted (or at least attempted).
    ServiceRemoved,
}

impl std::fmt::Display for ModerationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModerationOutcome::Ignored => write!(f, "ignored"),
            ModerationOutcome::Accepted => write!(f, "accepted"),
            ModerationOutcome::Tolerated => write!(f, "tolerated"),
            ModerationOutcome::Removed { banned: true } => write!(f, "removed+banned"),
            ModerationOutcome::Removed { banned: false } => write!(f, "removed"),
            ModerationOutcome::CheckIgnored => write!(f, "check ignored"),
            ModerationOutcome::CheckPrompted => write!(f, "check prompted"),
            ModerationOutcome::CheckConfirmedSpam { banned: true } => {
                write!(f, "check spam+banned")
            }
            ModerationOutcome::CheckConfirmedSpam { banned: false } => write!(f, "check spam"),
            ModerationOutcome::CheckClean => write!(f, "check clean"),
            ModerationOutcome::ServiceRemoved => write!(f, "service removed"),
        }
    }
}

pub(crate) fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(text: Option<&str>) -> ReplyTarget {
        ReplyTarget {
            message: MessageRef {
                chat_id: 1,
                channel_id: 2,
                message_id: 3,
            },
            sender: Sender {
                user_id: 4,
                display_name: "someone".to_string(),
            },
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn test_checkable_text_skips_blank() {
        assert_eq!(target(None).checkable_text(), None);
        assert_eq!(target(Some("   \n")).checkable_text(), None);
        assert_eq!(target(Some("buy now")).checkable_text(), Some("buy now"));
    }

    #[test]
    fn test_event_chat_id() {
        let event = InboundEvent::ServiceMessage {
            message: MessageRef {
                chat_id: 77,
                channel_id: 1,
                message_id: 2,
            },
        };
        assert_eq!(event.chat_id(), 77);
    }
}
