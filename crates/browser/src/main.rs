use std::sync::Arc;

use anyhow::Context;
use echo_networking::{start, BareRelay, ServerConfig, Tunnel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Echo v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env().context("Invalid configuration")?;
    match &config.bare_upstream {
        Some(upstream) => log::info!("Tunnel {} -> {}", config.tunnel_prefix, upstream),
        None => log::warn!(
            "ECHO_BARE_UPSTREAM is not set; requests under {} will get 502",
            config.tunnel_prefix
        ),
    }

    let tunnel: Arc<dyn Tunnel> = Arc::new(
        BareRelay::new(config.tunnel_prefix.clone(), config.bare_upstream.clone())
            .context("Invalid tunnel configuration")?,
    );

    // Binding is the only failure that stops the process
    let handle = start(config, tunnel)
        .await
        .context("Failed to start server")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    log::info!("Shutting down");
    handle.shutdown();
    handle.join().await;
    Ok(())
}
