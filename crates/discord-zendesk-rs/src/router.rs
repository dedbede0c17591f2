// ABOUTME: Core routing logic from Discord messages to Zendesk tickets.
// ABOUTME: Opens tickets from the intake channel and forwards support-channel replies as comments.

use crate::chat::{ChatPlatform, IncomingMessage, SupportChannelRequest};
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::store::MappingStore;
use crate::zendesk::{NewTicket, TicketApi};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What the router did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Bot author, or an intake message outside a guild.
    Ignored,
    /// Support channel created, ticket created, mapping stored.
    TicketOpened { channel_id: u64, ticket_id: u64 },
    /// Support channel created but Zendesk refused the ticket.
    TicketFailed { channel_id: u64 },
    /// Message appended to the mapped ticket.
    CommentForwarded { ticket_id: u64 },
    /// Zendesk refused the comment; a notice was posted.
    CommentFailed { ticket_id: u64 },
    /// Support channel with no stored ticket.
    Unmapped,
    /// Not a bridged channel.
    PassThrough,
}

/// Routing settings taken from the loaded config.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub intake_channel_id: u64,
    pub requester_domain: String,
}

impl RouterSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            intake_channel_id: config.bridge.intake_channel_id,
            requester_domain: config.zendesk.requester_domain.clone(),
        }
    }
}

/// Posted into a freshly created support channel.
pub fn welcome_message(mention: &str) -> String {
    format!(
        "Hello {}! Your support request has been received.\n\
         Our team will respond shortly. All messages here will sync with Zendesk.",
        mention
    )
}

/// Posted once the ticket behind a support channel exists.
pub fn ticket_created_message(ticket_id: u64) -> String {
    format!(
        "Ticket #{} created in Zendesk.\nReply here to continue the conversation.",
        ticket_id
    )
}

/// Body of a comment forwarded from a support channel.
pub fn comment_body(author_tag: &str, content: &str) -> String {
    format!("**Discord User ({}):**\n{}", author_tag, content)
}

fn ticket_error_message(err: &BridgeError) -> String {
    format!("Error creating ticket: {}", err)
}

fn sync_error_message(err: &BridgeError) -> String {
    match err.zendesk_status() {
        Some(status) => format!("Failed to sync to Zendesk: {}", status),
        None => format!("Failed to sync to Zendesk: {}", err),
    }
}

/// Routes chat messages to Zendesk.
pub struct Router {
    chat: Arc<dyn ChatPlatform>,
    tickets: Arc<dyn TicketApi>,
    store: MappingStore,
    settings: RouterSettings,
}

impl Router {
    pub fn new(
        chat: Arc<dyn ChatPlatform>,
        tickets: Arc<dyn TicketApi>,
        store: MappingStore,
        settings: RouterSettings,
    ) -> Self {
        Self {
            chat,
            tickets,
            store,
            settings,
        }
    }

    pub fn intake_channel_id(&self) -> u64 {
        self.settings.intake_channel_id
    }

    /// Handle an incoming chat message.
    ///
    /// The intake channel is checked before the support-channel prefix.
    pub async fn handle_message(&self, msg: &IncomingMessage) -> Result<RouteOutcome> {
        if msg.author.bot {
            return Ok(RouteOutcome::Ignored);
        }

        if msg.channel_id == self.settings.intake_channel_id {
            return self.open_ticket(msg).await;
        }

        if msg.in_support_channel() {
            return self.forward_comment(msg).await;
        }

        debug!(channel_id = msg.channel_id, "Message outside bridged channels");
        Ok(RouteOutcome::PassThrough)
    }

    async fn open_ticket(&self, msg: &IncomingMessage) -> Result<RouteOutcome> {
        let Some(guild_id) = msg.guild_id else {
            warn!(channel_id = msg.channel_id, "Intake message without a guild, ignoring");
            return Ok(RouteOutcome::Ignored);
        };

        let request = SupportChannelRequest::for_author(guild_id, &msg.author);
        let channel_id = self.chat.create_support_channel(&request).await?;
        info!(
            user_id = msg.author.id,
            channel_id,
            name = %request.name,
            "Created support channel"
        );

        self.chat
            .send_message(channel_id, &welcome_message(&msg.author.mention))
            .await?;

        let ticket = NewTicket::from_discord(
            msg.author.id,
            &msg.author.tag,
            &msg.content,
            &self.settings.requester_domain,
        );

        match self.tickets.create_ticket(&ticket).await {
            Ok(ticket_id) => {
                self.store
                    .upsert(msg.author.id, channel_id, ticket_id)
                    .await?;
                self.chat
                    .send_message(channel_id, &ticket_created_message(ticket_id))
                    .await?;
                info!(user_id = msg.author.id, channel_id, ticket_id, "Support ticket opened");
                Ok(RouteOutcome::TicketOpened {
                    channel_id,
                    ticket_id,
                })
            }
            Err(e) => {
                error!(user_id = msg.author.id, channel_id, error = %e, "Ticket creation failed");
                self.chat
                    .send_message(channel_id, &ticket_error_message(&e))
                    .await?;
                Ok(RouteOutcome::TicketFailed { channel_id })
            }
        }
    }

    async fn forward_comment(&self, msg: &IncomingMessage) -> Result<RouteOutcome> {
        let Some(ticket_id) = self.store.find_by_channel(msg.channel_id).await? else {
            debug!(channel_id = msg.channel_id, "Support channel has no ticket mapping");
            return Ok(RouteOutcome::Unmapped);
        };

        let body = comment_body(&msg.author.tag, &msg.content);
        match self.tickets.append_comment(ticket_id, &body, true).await {
            Ok(()) => {
                debug!(channel_id = msg.channel_id, ticket_id, "Forwarded comment");
                Ok(RouteOutcome::CommentForwarded { ticket_id })
            }
            Err(e) => {
                error!(channel_id = msg.channel_id, ticket_id, error = %e, "Comment sync failed");
                self.chat
                    .send_message(msg.channel_id, &sync_error_message(&e))
                    .await?;
                Ok(RouteOutcome::CommentFailed { ticket_id })
            }
        }
    }
}
