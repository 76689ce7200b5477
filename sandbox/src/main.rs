use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use crate::game_server::{GameServer, SandboxConfig, item_stack};

mod game_server;
mod world;

/// Local gateway with a scripted world for exercising the bot.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "127.0.0.1:25565")]
    bind: SocketAddr,

    /// Game version accepted from clients that pin one
    #[arg(long, default_value = "1.21.1")]
    version: String,

    /// Inventory item names, placed in slots 0, 1, ...
    #[arg(long, value_delimiter = ',', default_value = "iron_sword")]
    items: Vec<String>,

    /// Mobs spawned around each player
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "zombie,skeleton,spider,cow,sheep"
    )]
    mobs: Vec<String>,

    /// Prompt for `/login <password>` after spawn
    #[arg(long)]
    login_password: Option<String>,

    /// Usernames to kick on login
    #[arg(long, value_delimiter = ',')]
    kick: Vec<String>,

    /// World tick in milliseconds
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = SandboxConfig {
        version: args.version,
        inventory: args
            .items
            .iter()
            .zip(0_u8..)
            .map(|(name, slot)| item_stack(slot, name))
            .collect(),
        mobs: args.mobs,
        login_password: args.login_password.filter(|p| !p.is_empty()),
        kick: args.kick,
        tick: Duration::from_millis(args.tick_ms.max(1)),
    };

    let listener = TcpListener::bind(args.bind).await?;
    info!(bind = %args.bind, "Sandbox gateway listening");
    Arc::new(GameServer::new(config)).listen(listener).await
}
