// ABOUTME: Discord client wrapper and gateway event handler using serenity.
// ABOUTME: Implements ChatPlatform over the REST API and feeds messages into the Router.

use crate::chat::{Author, ChatPlatform, IncomingMessage, SupportChannelRequest};
use crate::error::Result;
use crate::router::Router;
use async_trait::async_trait;
use serenity::all::{
    ChannelId, ChannelType, Context, CreateChannel, EventHandler, GatewayIntents, GuildId, Http,
    Mentionable, Message, PermissionOverwrite, PermissionOverwriteType, Permissions, Ready,
    RoleId, UserId,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Gateway intents the bridge needs: guild messages with content, and members.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
}

/// Discord REST access used by the router and the outbox worker.
pub struct DiscordChat {
    http: Arc<Http>,
    bot_user_id: OnceCell<UserId>,
}

impl DiscordChat {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            bot_user_id: OnceCell::new(),
        }
    }

    async fn bot_user_id(&self) -> Result<UserId> {
        let id = self
            .bot_user_id
            .get_or_try_init(|| async { self.http.get_current_user().await.map(|u| u.id) })
            .await?;
        Ok(*id)
    }
}

fn private_overwrites(guild_id: GuildId, user_id: UserId, bot_id: UserId) -> Vec<PermissionOverwrite> {
    let member_access = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;
    vec![
        // @everyone shares the guild's id
        PermissionOverwrite {
            allow: Permissions::empty(),
            deny: Permissions::VIEW_CHANNEL,
            kind: PermissionOverwriteType::Role(RoleId::new(guild_id.get())),
        },
        PermissionOverwrite {
            allow: member_access,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Member(user_id),
        },
        PermissionOverwrite {
            allow: member_access,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Member(bot_id),
        },
    ]
}

#[async_trait]
impl ChatPlatform for DiscordChat {
    async fn create_support_channel(&self, request: &SupportChannelRequest) -> Result<u64> {
        let guild_id = GuildId::new(request.guild_id);
        let bot_id = self.bot_user_id().await?;

        let builder = CreateChannel::new(request.name.clone())
            .kind(ChannelType::Text)
            .topic(request.topic.clone())
            .permissions(private_overwrites(
                guild_id,
                UserId::new(request.user_id),
                bot_id,
            ));

        let channel = guild_id.create_channel(&self.http, builder).await?;
        Ok(channel.id.get())
    }

    async fn send_message(&self, channel_id: u64, text: &str) -> Result<()> {
        debug!(channel_id, "Posting message to Discord");
        ChannelId::new(channel_id).say(&self.http, text).await?;
        Ok(())
    }

    async fn channel_exists(&self, channel_id: u64) -> bool {
        self.http.get_channel(ChannelId::new(channel_id)).await.is_ok()
    }
}

/// Gateway event handler that routes guild messages.
pub struct Handler {
    router: Arc<Router>,
}

impl Handler {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }
}

/// Name of a guild channel, read from the cache and fetched over REST on a miss.
async fn channel_name(ctx: &Context, channel_id: ChannelId) -> Option<String> {
    // The cache guard must not live across the fetch below
    let cached = ctx.cache.channel(channel_id).map(|c| c.name.clone());
    resolve_channel_name(channel_id, cached, || async {
        ctx.http
            .get_channel(channel_id)
            .await
            .map(|channel| channel.guild().map(|c| c.name))
    })
    .await
}

async fn resolve_channel_name<F, Fut, E>(
    channel_id: ChannelId,
    cached: Option<String>,
    fetch: F,
) -> Option<String>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<Option<String>, E>>,
    E: std::fmt::Display,
{
    if cached.is_some() {
        return cached;
    }

    debug!(channel_id = %channel_id, "Channel not cached, fetching");
    match fetch().await {
        Ok(name) => name,
        Err(e) => {
            warn!(
                channel_id = %channel_id,
                error = %e,
                "Could not resolve channel name, message will not be bridged"
            );
            None
        }
    }
}

fn incoming_message(msg: &Message, channel_name: Option<String>) -> IncomingMessage {
    IncomingMessage {
        guild_id: msg.guild_id.map(|g| g.get()),
        channel_id: msg.channel_id.get(),
        channel_name,
        author: Author {
            id: msg.author.id.get(),
            name: msg.author.name.clone(),
            tag: msg.author.tag(),
            mention: msg.author.mention().to_string(),
            bot: msg.author.bot,
        },
        content: msg.content.clone(),
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "Discord bot is online"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        // The intake channel is matched by id, so its name is never needed
        let channel_name = if msg.channel_id.get() == self.router.intake_channel_id() {
            None
        } else {
            channel_name(&ctx, msg.channel_id).await
        };

        let incoming = incoming_message(&msg, channel_name);
        match self.router.handle_message(&incoming).await {
            Ok(outcome) => debug!(
                channel_id = incoming.channel_id,
                outcome = ?outcome,
                "Message routed"
            ),
            Err(e) => error!(
                channel_id = incoming.channel_id,
                user_id = incoming.author.id,
                error = %e,
                "Failed to handle message"
            ),
        }
    }
}
