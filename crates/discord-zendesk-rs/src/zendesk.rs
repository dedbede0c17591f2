// ABOUTME: Zendesk REST client for creating tickets and appending comments.
// ABOUTME: Exposes the TicketApi trait so routing logic can run against fakes.

use crate::config::ZendeskConfig;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Characters of the triggering message kept in the ticket subject.
pub const SUBJECT_PREFIX_CHARS: usize = 50;

const TICKET_TAGS: [&str; 2] = ["discord", "live-chat"];
const TICKET_PRIORITY: &str = "normal";

/// Ticket creation request, as sent under the `ticket` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTicket {
    pub subject: String,
    pub comment: TicketComment,
    pub requester: Requester,
    pub tags: Vec<String>,
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketComment {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Requester {
    pub name: String,
    pub email: String,
}

impl NewTicket {
    /// Build a support ticket for a Discord user's first message.
    pub fn from_discord(
        user_id: u64,
        author_tag: &str,
        content: &str,
        requester_domain: &str,
    ) -> Self {
        Self {
            subject: ticket_subject(content),
            comment: TicketComment {
                body: format!("**From Discord User:** {}\n\n{}", author_tag, content),
            },
            requester: Requester {
                name: author_tag.to_string(),
                email: requester_email(user_id, requester_domain),
            },
            tags: TICKET_TAGS.iter().map(|t| t.to_string()).collect(),
            priority: TICKET_PRIORITY.to_string(),
        }
    }
}

/// Subject line: the first 50 characters of the message plus a literal ellipsis.
pub fn ticket_subject(content: &str) -> String {
    let prefix: String = content.chars().take(SUBJECT_PREFIX_CHARS).collect();
    format!("Discord Support: {}...", prefix)
}

/// Placeholder requester address; Discord does not expose verified emails to bots.
pub fn requester_email(user_id: u64, domain: &str) -> String {
    format!("discord+{}@{}", user_id, domain)
}

#[derive(Serialize)]
struct CreateTicketRequest<'a> {
    ticket: &'a NewTicket,
}

#[derive(Deserialize)]
struct TicketEnvelope {
    ticket: TicketId,
}

#[derive(Deserialize)]
struct TicketId {
    id: u64,
}

#[derive(Serialize)]
struct UpdateTicketRequest<'a> {
    comment: CommentUpdate<'a>,
}

#[derive(Serialize)]
struct CommentUpdate<'a> {
    body: &'a str,
    public: bool,
}

/// Outbound ticketing operations used by the router.
#[async_trait]
pub trait TicketApi: Send + Sync {
    /// Create a ticket, returning its id.
    async fn create_ticket(&self, ticket: &NewTicket) -> Result<u64>;

    /// Append a comment to an existing ticket.
    async fn append_comment(&self, ticket_id: u64, body: &str, public: bool) -> Result<()>;
}

/// Zendesk API client using email/token basic auth.
pub struct ZendeskClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    api_token: String,
}

impl ZendeskClient {
    pub fn new(config: &ZendeskConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = config.api_base_url();
        info!(base_url = %base_url, "Zendesk client configured");

        Ok(Self {
            http,
            base_url,
            username: format!("{}/token", config.email),
            api_token: config.api_token.clone(),
        })
    }

    async fn rejection(response: reqwest::Response) -> BridgeError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        BridgeError::Zendesk { status, body }
    }
}

#[async_trait]
impl TicketApi for ZendeskClient {
    async fn create_ticket(&self, ticket: &NewTicket) -> Result<u64> {
        let url = format!("{}/tickets.json", self.base_url);
        debug!(url = %url, subject = %ticket.subject, "Creating Zendesk ticket");

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.api_token))
            .json(&CreateTicketRequest { ticket })
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            let err = Self::rejection(response).await;
            warn!(error = %err, "Zendesk rejected ticket creation");
            return Err(err);
        }

        let envelope: TicketEnvelope = response.json().await?;
        info!(ticket_id = envelope.ticket.id, "Zendesk ticket created");
        Ok(envelope.ticket.id)
    }

    async fn append_comment(&self, ticket_id: u64, body: &str, public: bool) -> Result<()> {
        let url = format!("{}/tickets/{}.json", self.base_url, ticket_id);
        debug!(url = %url, ticket_id, public, "Appending Zendesk comment");

        let response = self
            .http
            .put(&url)
            .basic_auth(&self.username, Some(&self.api_token))
            .json(&UpdateTicketRequest {
                comment: CommentUpdate { body, public },
            })
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let err = Self::rejection(response).await;
            warn!(ticket_id, error = %err, "Zendesk rejected comment");
            return Err(err);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_truncates_to_fifty_chars() {
        let long = "a".repeat(80);
        let subject = ticket_subject(&long);
        assert_eq!(subject, format!("Discord Support: {}...", "a".repeat(50)));
    }

    #[test]
    fn test_subject_appends_ellipsis_to_short_message() {
        assert_eq!(
            ticket_subject("Help, my order #123 is missing"),
            "Discord Support: Help, my order #123 is missing..."
        );
    }

    #[test]
    fn test_subject_counts_characters_not_bytes() {
        let text = "é".repeat(60);
        let subject = ticket_subject(&text);
        assert_eq!(subject.chars().filter(|c| *c == 'é').count(), 50);
    }

    #[test]
    fn test_requester_email_is_deterministic() {
        assert_eq!(
            requester_email(555, "yourtemporarydomain.com"),
            "discord+555@yourtemporarydomain.com"
        );
    }

    #[test]
    fn test_new_ticket_payload_shape() {
        let ticket = NewTicket::from_discord(555, "alice", "hi there", "example.com");
        let value = serde_json::to_value(CreateTicketRequest { ticket: &ticket }).unwrap();
        assert_eq!(value["ticket"]["subject"], "Discord Support: hi there...");
        assert_eq!(
            value["ticket"]["comment"]["body"],
            "**From Discord User:** alice\n\nhi there"
        );
        assert_eq!(value["ticket"]["requester"]["name"], "alice");
        assert_eq!(
            value["ticket"]["requester"]["email"],
            "discord+555@example.com"
        );
        assert_eq!(value["ticket"]["tags"], serde_json::json!(["discord", "live-chat"]));
        assert_eq!(value["ticket"]["priority"], "normal");
    }
}
