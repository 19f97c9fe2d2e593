//! Session pool manager
//!
//! Owns every session, the join queue and the channel registry. Four
//! background loops share one cancellation token:
//! - dispatch: pops the queue head and joins it on the current session,
//!   reconnecting or scaling out first when needed
//! - health: disconnects sessions that stopped receiving traffic and
//!   requeues their channels
//! - status: logs a one-line snapshot
//! - discovery: optional, see [`DiscoveryPoller`]
//!
//! Session inbound loops report back through the [`EventBus`]; those
//! handlers only touch the registry and counters and never await.

use crate::bus::EventBus;
use crate::core::{ChannelRegistry, JoinQueue};
use crate::discovery::{ChannelSink, DiscoveryPoller};
use crate::infrastructure::config::{Config, PoolConfig};
use crate::infrastructure::metrics::{PoolMetrics, PoolStats};
use crate::irc::{Session, SessionError, SessionId, SessionSettings};
use crate::log_pool;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// Pool timing and endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub host: String,
    pub port: u16,
    /// Pause after the first connect before the loops start
    pub start_delay: Duration,
    /// Pause after each issued join
    pub join_interval: Duration,
    /// Pause while the queue is empty
    pub idle_interval: Duration,
    /// Received frames per minute on the current session that trigger a new one
    pub autoscale_threshold: u64,
    pub health_check_interval: Duration,
    pub status_interval: Duration,
}

impl PoolSettings {
    pub fn from_config(pool: &PoolConfig, host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            start_delay: pool.start_delay(),
            join_interval: pool.join_interval(),
            idle_interval: pool.idle_interval(),
            autoscale_threshold: pool.autoscale_threshold,
            health_check_interval: pool.health_check_interval(),
            status_interval: pool.status_interval(),
        }
    }
}

/// Outcome of one dispatch iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStep {
    /// Queue was empty
    Idle,
    /// Current session was down and has been reconnected; nothing consumed
    Reconnected(SessionId),
    /// Head was already joined and has been dropped
    Skipped(String),
    /// Join sent for `channel` on `session`
    Joined { channel: String, session: SessionId },
}

/// State guarded by the pool lock
struct PoolState {
    sessions: BTreeMap<SessionId, Arc<Session>>,
    current: Option<SessionId>,
    next_id: u64,
    registry: ChannelRegistry,
}

struct PoolInner {
    settings: PoolSettings,
    session_settings: Arc<SessionSettings>,
    bus: Arc<EventBus>,
    queue: JoinQueue,
    state: Mutex<PoolState>,
    metrics: PoolMetrics,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PoolInner {
    fn on_joined(&self, channel: &str) {
        let changed = self.state.lock().registry.mark_joined(channel);
        if changed {
            self.metrics.record_joined();
            log_pool!(Level::DEBUG, "Joined #{}", channel);
        }
    }

    fn on_received(&self, session: &Session) {
        session.record_received();
        self.metrics.record_received();
    }
}

/// Connection pool manager
///
/// Cheap to clone; clones share the same pool.
#[derive(Clone)]
pub struct PoolManager {
    inner: Arc<PoolInner>,
}

impl PoolManager {
    /// Build a pool from the loaded configuration, seeding the queue with
    /// the configured channels
    pub fn setup(config: &Config, host: &str, port: u16) -> Self {
        let session_settings = SessionSettings {
            user: config.account.user.clone(),
            token: config.account.wire_token(),
            settle_delay: config.pool.settle_delay(),
            ..SessionSettings::default()
        };
        Self::new(
            PoolSettings::from_config(&config.pool, host, port),
            session_settings,
            config.channels.iter().cloned(),
        )
    }

    pub fn new<I, S>(settings: PoolSettings, session_settings: SessionSettings, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inner = Arc::new(PoolInner {
            settings,
            session_settings: Arc::new(session_settings),
            bus: Arc::new(EventBus::new()),
            queue: JoinQueue::seeded(channels),
            state: Mutex::new(PoolState {
                sessions: BTreeMap::new(),
                current: None,
                next_id: 1,
                registry: ChannelRegistry::new(),
            }),
            metrics: PoolMetrics::new(),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        });

        // Sessions hold the bus and the bus holds these handlers, so they
        // must not keep the pool alive.
        let weak: Weak<PoolInner> = Arc::downgrade(&inner);
        inner.bus.subscribe_joined(move |channel| {
            if let Some(inner) = weak.upgrade() {
                inner.on_joined(channel);
            }
        });
        let weak: Weak<PoolInner> = Arc::downgrade(&inner);
        inner.bus.subscribe_received(move |session| {
            if let Some(inner) = weak.upgrade() {
                inner.on_received(session);
            }
        });

        Self { inner }
    }

    /// Connect the first session and start the background loops
    ///
    /// # Errors
    /// Fails if the first session cannot reach the server.
    pub async fn start(&self) -> crate::Result<()> {
        let id = self.connect_first_session().await?;
        log_pool!(
            Level::INFO,
            session = %id,
            queued = self.inner.queue.len(),
            "Pool started"
        );

        tokio::time::sleep(self.inner.settings.start_delay).await;

        let cancel = &self.inner.cancel;
        let mut tasks = self.inner.tasks.lock();
        tasks.push(tokio::spawn(self.clone().dispatch_loop(cancel.clone())));
        tasks.push(tokio::spawn(self.clone().health_loop(cancel.clone())));
        tasks.push(tokio::spawn(self.clone().status_loop(cancel.clone())));
        Ok(())
    }

    /// Run `poller` under the pool's cancellation token
    pub fn spawn_discovery(&self, poller: DiscoveryPoller) {
        let handle = tokio::spawn(poller.run(self.inner.cancel.clone()));
        self.inner.tasks.lock().push(handle);
    }

    /// Open session #1 and make it the dispatch target
    pub async fn connect_first_session(&self) -> Result<SessionId, SessionError> {
        let session = self.allocate_session();
        self.connect_and_promote(session).await
    }

    /// Stop every loop and disconnect every session
    pub async fn shutdown(&self) {
        log_pool!(Level::INFO, "Shutting down pool");
        self.inner.cancel.cancel();

        let tasks: Vec<_> = self.inner.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                log_pool!(Level::WARN, error = %e, "Pool task ended abnormally");
            }
        }

        for session in self.sessions() {
            session.disconnect().await;
        }
        log_pool!(Level::INFO, "Pool stopped");
    }

    /// Append channels to the tail of the join queue
    pub fn append_to_queue<I, S>(&self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.queue.append(channels);
    }

    /// Join confirmation from any session
    pub fn on_joined(&self, channel: &str) {
        self.inner.on_joined(channel);
    }

    /// Inbound frame on `session`
    pub fn on_received(&self, session: &Session) {
        self.inner.on_received(session);
    }

    /// One pass of the dispatch loop
    ///
    /// The caller decides how long to pause based on the returned step.
    pub async fn dispatch_once(&self) -> Result<DispatchStep, SessionError> {
        if self.inner.queue.is_empty() {
            return Ok(DispatchStep::Idle);
        }

        let mut current = match self.current_session() {
            Some(session) => session,
            None => {
                let id = self.connect_first_session().await?;
                return Ok(DispatchStep::Reconnected(id));
            }
        };

        if !current.is_connected() {
            let id = current.id();
            log_pool!(Level::WARN, session = %id, state = ?current.state(), "Current session down, reconnecting");
            current.disconnect().await;
            self.release_session(&current);
            current
                .connect(&self.inner.settings.host, self.inner.settings.port)
                .await?;
            return Ok(DispatchStep::Reconnected(id));
        }

        let rate = current.per_minute_rate();
        if rate >= self.inner.settings.autoscale_threshold {
            log_pool!(
                Level::INFO,
                session = %current.id(),
                rate,
                threshold = self.inner.settings.autoscale_threshold,
                "Autoscale threshold reached, opening new session"
            );
            let session = self.allocate_session();
            self.connect_and_promote(Arc::clone(&session)).await?;
            current = session;
        }

        let Some(channel) = self.inner.queue.pop() else {
            return Ok(DispatchStep::Idle);
        };

        if self.is_joined(&channel) {
            return Ok(DispatchStep::Skipped(channel));
        }

        if let Err(e) = current.join(&channel).await {
            self.inner.queue.push_front(channel);
            return Err(e);
        }
        self.inner.metrics.record_join_issued();
        log_pool!(Level::DEBUG, session = %current.id(), "Dispatched #{}", channel);

        Ok(DispatchStep::Joined {
            channel,
            session: current.id(),
        })
    }

    /// Disconnect every monitored session that received nothing during the
    /// last minute and requeue its channels. Returns the retired ids.
    pub async fn health_check_once(&self) -> Vec<SessionId> {
        let mut retired = Vec::new();

        for session in self.sessions() {
            if !session.is_monitoring() || session.per_minute_rate() > 0 {
                continue;
            }

            session.disconnect().await;
            let channels = self.release_session(&session);
            self.inner.metrics.record_session_retired();
            log_pool!(
                Level::WARN,
                session = %session.id(),
                requeued = channels.len(),
                "Session silent for a minute, disconnected"
            );
            retired.push(session.id());
        }

        retired
    }

    /// Flip the session's channels back to un-joined and requeue them
    fn release_session(&self, session: &Session) -> Vec<String> {
        let channels = session.take_joined();
        if channels.is_empty() {
            return channels;
        }

        {
            let mut state = self.inner.state.lock();
            for channel in &channels {
                state.registry.release(channel);
            }
        }
        self.inner.queue.append(channels.iter().cloned());
        channels
    }

    fn allocate_session(&self) -> Arc<Session> {
        let id = {
            let mut state = self.inner.state.lock();
            let id = SessionId(state.next_id);
            state.next_id += 1;
            id
        };
        Session::new(
            id,
            Arc::clone(&self.inner.session_settings),
            Arc::clone(&self.inner.bus),
        )
    }

    /// Connect `session`, then register it and make it current
    async fn connect_and_promote(&self, session: Arc<Session>) -> Result<SessionId, SessionError> {
        session
            .connect(&self.inner.settings.host, self.inner.settings.port)
            .await?;

        let id = session.id();
        {
            let mut state = self.inner.state.lock();
            state.sessions.insert(id, session);
            state.current = Some(id);
        }
        self.inner.metrics.record_session_created();
        log_pool!(Level::INFO, session = %id, "Session promoted to dispatch target");
        Ok(id)
    }

    async fn dispatch_loop(self, cancel: CancellationToken) {
        log_pool!(Level::INFO, "Dispatch loop started");
        let settings = self.inner.settings.clone();

        loop {
            let pause = tokio::select! {
                _ = cancel.cancelled() => break,
                step = self.dispatch_once() => match step {
                    Ok(DispatchStep::Idle) => settings.idle_interval,
                    Ok(DispatchStep::Skipped(_)) => Duration::ZERO,
                    Ok(DispatchStep::Reconnected(_)) | Ok(DispatchStep::Joined { .. }) => {
                        settings.join_interval
                    }
                    Err(e) => {
                        log_pool!(Level::WARN, error = %e, "Dispatch failed");
                        settings.join_interval
                    }
                },
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        log_pool!(Level::INFO, "Dispatch loop stopped");
    }

    async fn health_loop(self, cancel: CancellationToken) {
        let period = self.inner.settings.health_check_interval;
        log_pool!(Level::INFO, interval_secs = period.as_secs(), "Health monitor started");

        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.health_check_once().await;
                }
                _ = cancel.cancelled() => break,
            }
        }

        log_pool!(Level::INFO, "Health monitor stopped");
    }

    async fn status_loop(self, cancel: CancellationToken) {
        let period = self.inner.settings.status_interval;
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    log_pool!(Level::INFO, "{}", self.stats());
                }
                _ = cancel.cancelled() => break,
            }
        }
    }

    /// Pool snapshot for the status line
    pub fn stats(&self) -> PoolStats {
        let mut stats = self.inner.metrics.snapshot();
        stats.queued_channels = self.inner.queue.len();

        let state = self.inner.state.lock();
        stats.joined_channels = state.registry.joined_count();
        stats.sessions_total = state.sessions.len();
        stats.sessions_connected = state.sessions.values().filter(|s| s.is_connected()).count();
        if let Some(current) = state.current.and_then(|id| state.sessions.get(&id)) {
            stats.current_per_second = current.per_second_rate();
            stats.current_per_minute = current.per_minute_rate();
        }
        stats
    }

    /// The session new joins are issued against
    pub fn current_session(&self) -> Option<Arc<Session>> {
        let state = self.inner.state.lock();
        state.current.and_then(|id| state.sessions.get(&id).cloned())
    }

    /// Every session ever promoted, in id order
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.inner.state.lock().sessions.values().cloned().collect()
    }

    /// Queued names, head first
    pub fn queued(&self) -> Vec<String> {
        self.inner.queue.snapshot()
    }

    pub fn is_joined(&self, channel: &str) -> bool {
        self.inner.state.lock().registry.is_joined(channel)
    }

    pub fn is_known(&self, channel: &str) -> bool {
        self.inner.state.lock().registry.is_known(channel)
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }
}

impl ChannelSink for PoolManager {
    fn is_known(&self, channel: &str) -> bool {
        PoolManager::is_known(self, channel)
    }

    fn append_to_queue(&self, channels: Vec<String>) {
        PoolManager::append_to_queue(self, channels);
    }
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("host", &self.inner.settings.host)
            .field("port", &self.inner.settings.port)
            .field("stats", &self.stats())
            .finish()
    }
}
