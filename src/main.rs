//! Chat idler entry point
//!
//! # Architecture
//! - **irc**: Sessions and the wire protocol subset
//! - **pool**: Join dispatch, autoscaling, health monitoring
//! - **discovery**: Directory polling for live channels
//! - **core**: Rate counters, join queue, channel registry
//! - **infrastructure**: Cold path (config, logging, metrics)

use anyhow::Context;
use chat_idle::discovery::{DiscoveryPoller, HelixClient, TokenStore};
use chat_idle::infrastructure::{config::Config, init_logging};
use chat_idle::{log_main, PoolManager};
use std::sync::Arc;
use tracing::Level;

/// Main application state
pub struct IdleApp {
    config: Config,
    tokens: TokenStore,
    pool: PoolManager,
}

impl IdleApp {
    /// Build the pool and token store from configuration
    pub fn new(config: Config) -> Self {
        let tokens = TokenStore::new(config.directory.app_token.clone());
        let pool = PoolManager::setup(&config, &config.pool.host, config.pool.port);
        Self {
            config,
            tokens,
            pool,
        }
    }

    /// Connect, run until Ctrl-C, then shut down and persist the config
    pub async fn run(mut self) -> anyhow::Result<()> {
        log_main!(
            Level::INFO,
            user = %self.config.account.user,
            channels = self.config.channels.len(),
            "Starting chat idler"
        );

        let token = self.tokens.current();
        if !token.access_token.is_empty() {
            log_main!(Level::INFO, expires = %token.expiry_display(), "Directory token loaded");
        }

        self.pool
            .start()
            .await
            .context("Failed to connect the first session")?;

        if self.config.directory.enabled {
            let directory = &self.config.directory;
            let api = Arc::new(HelixClient::new(
                directory.api_base.as_str(),
                directory.id_base.as_str(),
                directory.client_id.as_str(),
                directory.client_secret.as_str(),
            ));
            let poller = DiscoveryPoller::new(
                api,
                self.tokens.clone(),
                Arc::new(self.pool.clone()),
                directory.discovery_settings(),
            );
            self.pool.spawn_discovery(poller);
        }

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        log_main!(Level::INFO, "Shutdown signal received");

        self.pool.shutdown().await;
        log_main!(Level::INFO, "{}", self.pool.stats());

        self.config.directory.app_token = self.tokens.current();
        self.config.save().context("Failed to save config")?;
        log_main!(Level::INFO, path = %Config::path().display(), "Config saved");

        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()
        .with_context(|| format!("Failed to load config from {}", Config::path().display()))?;

    let _guards = init_logging(&config.logging).context("Failed to initialize logging")?;

    IdleApp::new(config).run().await
}
