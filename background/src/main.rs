use std::sync::Arc;

use anyhow::Context;
use background::{transport, ActionRouter};
use shared::{ApiClient, Config, FileSettingsStore, SettingsStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries protocol frames, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let store = FileSettingsStore::new(&config.settings_path, config.install_defaults());
    if store
        .ensure_initialized()
        .await
        .context("initializing settings")?
    {
        info!(path = %config.settings_path.display(), "Installed default settings");
    }

    let api = ApiClient::new().context("building HTTP client")?;
    let router = ActionRouter::new(Arc::new(api), Arc::new(store));

    info!(version = env!("CARGO_PKG_VERSION"), "Marchiver host started");
    transport::serve(tokio::io::stdin(), tokio::io::stdout(), router).await?;
    info!("Extension disconnected; exiting");

    Ok(())
}
