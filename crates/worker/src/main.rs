//! offcache worker entry point.
//!
//! Boots the engine, runs install/activate, then serves control commands as
//! JSON lines on stdin with replies on stdout. Logging goes to stderr to
//! keep stdout clean for the reply channel.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use offcache_client::{FetchClient, FetchConfig};
use offcache_core::store::PartitionStore;
use offcache_core::AppConfig;
use offcache_worker::control::{Command, Reply};
use offcache_worker::hub::StdoutHub;
use offcache_worker::Engine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.version, db_path = %config.db_path.display(), "starting offcache worker");

    let store = PartitionStore::open(&config.db_path).await?;
    let fetch_config = FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        ..Default::default()
    };
    let network = Arc::new(FetchClient::new(fetch_config)?);

    let mut engine = Engine::new(&config, store, network, Arc::new(StdoutHub));
    engine.startup().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Command>(&line) {
            Ok(command) => engine.handle_command(command).await,
            Err(e) => Reply::err(format!("unrecognized command: {e}")),
        };
        println!("{}", serde_json::to_string(&reply)?);
    }

    Ok(())
}
