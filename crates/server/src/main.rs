//! Crosslight Intersection Controller - Main Entry Point

use server::{init_logging, run, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config_path = std::env::var("CROSSLIGHT_CONFIG").ok();
    let config = ServerConfig::load(config_path.as_deref())?;

    info!(
        "=== Crosslight Intersection Controller v{} ===",
        env!("CARGO_PKG_VERSION")
    );
    info!(site = %config.site_id, mode = ?config.mode, "starting fleet session server");

    run(config).await?;

    Ok(())
}
