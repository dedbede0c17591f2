// ABOUTME: Library root for discord-zendesk-rs.
// ABOUTME: Wires the store, Zendesk client, Discord handler, outbox, and webhook into run().

pub mod chat;
pub mod config;
pub mod discord;
pub mod error;
pub mod outbox;
pub mod router;
pub mod store;
pub mod webhook;
pub mod zendesk;

pub use chat::{Author, ChatPlatform, IncomingMessage, SupportChannelRequest};
pub use config::Config;
pub use error::{BridgeError, Result};
pub use outbox::ChatOutbox;
pub use router::{RouteOutcome, Router, RouterSettings};
pub use store::{MappingStore, TicketMapping};
pub use webhook::WebhookState;
pub use zendesk::{NewTicket, TicketApi, ZendeskClient};

use discord::{DiscordChat, Handler};
use serenity::all::{Client, Http};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Run the support bridge with the given config path.
///
/// Without a path, configuration comes from the environment.
pub async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    info!("discord-zendesk-bridge starting");

    let config = Config::load(config_path)?;
    info!(
        intake_channel_id = config.bridge.intake_channel_id,
        webhook = %config.webhook.listen_addr,
        store = %config.store.path.display(),
        "Configuration loaded"
    );

    let store = MappingStore::open(&config.store.path).await?;
    info!(mappings = store.count().await?, "Ticket store ready");
    let tickets: Arc<dyn TicketApi> = Arc::new(ZendeskClient::new(&config.zendesk)?);

    let http = Arc::new(Http::new(&config.discord.token));
    let chat: Arc<dyn ChatPlatform> = Arc::new(DiscordChat::new(http));

    let router = Arc::new(Router::new(
        Arc::clone(&chat),
        tickets,
        store.clone(),
        RouterSettings::from_config(&config),
    ));

    // Webhook posts cross into Discord through the outbox
    let (outbox, outbox_rx) = outbox::channel();
    let outbox_worker = tokio::spawn(outbox::run_outbox(outbox_rx, Arc::clone(&chat)));

    let webhook_state = WebhookState::new(
        store,
        outbox,
        &config.webhook.username,
        &config.webhook.password,
    );
    let listener = TcpListener::bind(config.webhook.listen_addr).await?;

    let mut client = Client::builder(&config.discord.token, discord::intents())
        .event_handler(Handler::new(router))
        .await?;
    let shard_manager = Arc::clone(&client.shard_manager);

    // Handle shutdown signals
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    info!("Starting Discord gateway and webhook listener");

    // Run until either side stops or a shutdown signal arrives
    tokio::select! {
        result = client.start() => {
            if let Err(e) = result {
                error!(error = %e, "Discord client stopped with error");
            } else {
                info!("Discord client stopped");
            }
        }
        result = webhook::serve(listener, webhook_state) => {
            if let Err(e) = result {
                error!(error = %e, "Webhook listener stopped with error");
            } else {
                info!("Webhook listener stopped");
            }
        }
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }

    shard_manager.shutdown_all().await;
    outbox_worker.abort();

    info!("discord-zendesk-bridge stopped");
    Ok(())
}
