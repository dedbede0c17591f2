// ABOUTME: Chat-side seam between routing logic and the Discord client.
// ABOUTME: Defines the ChatPlatform trait and the platform-neutral message types.

use crate::error::Result;
use async_trait::async_trait;

/// Name prefix shared by every private support channel.
pub const SUPPORT_CHANNEL_PREFIX: &str = "support-";

/// An inbound chat message, reduced to what routing needs.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    /// Channel name, when the channel could be resolved.
    pub channel_name: Option<String>,
    pub author: Author,
    pub content: String,
}

/// The sender of an inbound message.
#[derive(Debug, Clone)]
pub struct Author {
    pub id: u64,
    /// Account username (not the server nickname).
    pub name: String,
    /// Display form used in tickets, e.g. `alice` or `alice#1234`.
    pub tag: String,
    /// Mention markup, e.g. `<@555>`.
    pub mention: String,
    pub bot: bool,
}

impl IncomingMessage {
    /// Whether the message was posted in a private support channel.
    pub fn in_support_channel(&self) -> bool {
        self.channel_name
            .as_deref()
            .is_some_and(|name| name.starts_with(SUPPORT_CHANNEL_PREFIX))
    }
}

/// A private support channel to be created for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportChannelRequest {
    pub guild_id: u64,
    pub user_id: u64,
    pub name: String,
    pub topic: String,
}

impl SupportChannelRequest {
    pub fn for_author(guild_id: u64, author: &Author) -> Self {
        Self {
            guild_id,
            user_id: author.id,
            name: support_channel_name(&author.name, author.id),
            topic: format!("Support for {} | User ID: {}", author.tag, author.id),
        }
    }
}

/// `support-<lowercased username>-<user_id % 10000>`.
pub fn support_channel_name(username: &str, user_id: u64) -> String {
    format!(
        "{}{}-{}",
        SUPPORT_CHANNEL_PREFIX,
        username.to_lowercase(),
        user_id % 10000
    )
}

/// Chat operations the bridge performs.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Create a text channel visible only to the requesting user and the bot.
    /// Returns the new channel id.
    async fn create_support_channel(&self, request: &SupportChannelRequest) -> Result<u64>;

    /// Post a plain text message.
    async fn send_message(&self, channel_id: u64, text: &str) -> Result<()>;

    /// Whether the channel currently exists and is visible to the bot.
    async fn channel_exists(&self, channel_id: u64) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> Author {
        Author {
            id: 555,
            name: "Alice".to_string(),
            tag: "Alice".to_string(),
            mention: "<@555>".to_string(),
            bot: false,
        }
    }

    #[test]
    fn test_support_channel_name() {
        assert_eq!(support_channel_name("Alice", 555), "support-alice-555");
        assert_eq!(
            support_channel_name("bob", 123_456_789_012_345),
            "support-bob-2345"
        );
    }

    #[test]
    fn test_support_channel_request_topic() {
        let req = SupportChannelRequest::for_author(9, &author());
        assert_eq!(req.guild_id, 9);
        assert_eq!(req.name, "support-alice-555");
        assert_eq!(req.topic, "Support for Alice | User ID: 555");
    }

    #[test]
    fn test_in_support_channel() {
        let mut msg = IncomingMessage {
            guild_id: Some(9),
            channel_id: 1,
            channel_name: Some("support-alice-555".to_string()),
            author: author(),
            content: "hi".to_string(),
        };
        assert!(msg.in_support_channel());

        msg.channel_name = Some("general".to_string());
        assert!(!msg.in_support_channel());

        msg.channel_name = None;
        assert!(!msg.in_support_channel());
    }
}
