//! Discovery poller
//!
//! Walks the directory's live listing one page per cycle and feeds channels
//! inside the viewer window into the pool's join queue.
//!
//! The listing is ordered by descending viewers. Once a page shows a channel
//! below the minimum, nothing further down qualifies, so the cursor goes
//! back to the top and the next cycle picks up channels that have grown
//! into the window since.

use crate::discovery::client::{DirectoryApi, DirectoryError, LiveChannel, StreamPage};
use crate::discovery::token::TokenStore;
use crate::log_directory;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// Where discovered channels go
///
/// Implemented by the pool manager.
pub trait ChannelSink: Send + Sync {
    /// Channel has a registry entry (confirmed at least once)
    fn is_known(&self, channel: &str) -> bool;

    /// Append channels to the join queue in order
    fn append_to_queue(&self, channels: Vec<String>);
}

/// Poller tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySettings {
    pub viewers_min: u64,
    pub viewers_max: u64,
    pub page_size: u32,
    pub poll_interval: Duration,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            viewers_min: 10,
            viewers_max: 10_000,
            page_size: 100,
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// Periodic directory walker
pub struct DiscoveryPoller {
    api: Arc<dyn DirectoryApi>,
    tokens: TokenStore,
    sink: Arc<dyn ChannelSink>,
    settings: DiscoverySettings,
    cursor: String,
}

impl DiscoveryPoller {
    pub fn new(
        api: Arc<dyn DirectoryApi>,
        tokens: TokenStore,
        sink: Arc<dyn ChannelSink>,
        settings: DiscoverySettings,
    ) -> Self {
        Self {
            api,
            tokens,
            sink,
            settings,
            cursor: String::new(),
        }
    }

    /// Current pagination cursor (empty = top of the list)
    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    /// One discovery cycle. Returns the channels appended to the queue.
    ///
    /// A failed listing invalidates the token so the next cycle refreshes
    /// it; the cursor is left where it was.
    pub async fn poll_once(&mut self) -> Result<Vec<String>, DirectoryError> {
        if self.tokens.is_expired() {
            log_directory!(Level::INFO, "App token expired, refreshing");
            let token = self.api.exchange_token().await?;
            log_directory!(Level::INFO, expires = %token.expiry_display(), "App token refreshed");
            self.tokens.replace(token);
        }

        let token = self.tokens.current();
        let page = match self
            .api
            .list_active(&token, &self.cursor, self.settings.page_size)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.tokens.invalidate();
                return Err(e);
            }
        };

        self.advance_cursor(&page);

        let candidates = select_candidates(&page.data, &self.settings, |name| {
            self.sink.is_known(name)
        });
        if !candidates.is_empty() {
            self.sink.append_to_queue(candidates.clone());
        }

        Ok(candidates)
    }

    fn advance_cursor(&mut self, page: &StreamPage) {
        let exhausted = page
            .data
            .iter()
            .any(|channel| channel.viewers < self.settings.viewers_min);

        if exhausted {
            self.cursor.clear();
        } else {
            self.cursor.clone_from(&page.pagination.cursor);
        }
    }

    /// Poll until cancelled, sleeping `poll_interval` between cycles
    pub async fn run(mut self, cancel: CancellationToken) {
        log_directory!(
            Level::INFO,
            min = self.settings.viewers_min,
            max = self.settings.viewers_max,
            "Discovery poller started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.poll_once() => match result {
                    Ok(found) if !found.is_empty() => {
                        log_directory!(Level::INFO, count = found.len(), "Queued discovered channels");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log_directory!(Level::WARN, error = %e, "Directory request failed");
                    }
                },
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        log_directory!(Level::INFO, "Discovery poller stopped");
    }
}

/// Channels inside `[viewers_min, viewers_max]` that the pool does not know yet
pub fn select_candidates<F>(
    channels: &[LiveChannel],
    settings: &DiscoverySettings,
    is_known: F,
) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    channels
        .iter()
        .filter(|c| (settings.viewers_min..=settings.viewers_max).contains(&c.viewers))
        .filter(|c| !is_known(&c.name))
        .map(|c| c.name.clone())
        .collect()
}
