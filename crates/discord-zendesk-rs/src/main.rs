// ABOUTME: Entry point for discord-zendesk-bridge binary.
// ABOUTME: Sets up logging, parses CLI flags, and runs the bridge.

use anyhow::Result;
use clap::Parser;

#[derive(Parser)]
#[command(name = "discord-zendesk-bridge")]
#[command(about = "Discord support channels synced with Zendesk tickets")]
struct Cli {
    /// Config file path (environment variables are used when omitted)
    #[arg(short, long, env = "ZENDESK_BRIDGE_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("discord_zendesk_rs=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    discord_zendesk_rs::run(cli.config).await
}
