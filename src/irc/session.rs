//! One authenticated connection to the chat server
//!
//! A session owns the write half of a TCP stream; the read half is moved
//! into a spawned task that parses frames for the lifetime of the
//! connection. Inbound bookkeeping is handed to the pool through the
//! [`EventBus`].

use crate::bus::EventBus;
use crate::core::RateCounter;
use crate::irc::frame::{parse_frame, Command, Frame};
use crate::log_irc;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::Level;

/// Monotonic session instance id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Session lifecycle
///
/// "Silent" is not a state here; the pool infers it from the inbound rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
}

impl From<u8> for SessionState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Authenticating,
            3 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

impl From<SessionState> for u8 {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Disconnected => 0,
            SessionState::Connecting => 1,
            SessionState::Authenticating => 2,
            SessionState::Connected => 3,
        }
    }
}

/// Identity and timing shared by every session of a pool
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Login name, used for NICK and USER
    pub user: String,
    /// Password sent with PASS (already carries the `oauth:` prefix)
    pub token: String,
    /// Pause after the handshake before the caller may issue joins
    pub settle_delay: Duration,
    /// Pause before closing so in-flight writes can drain
    pub flush_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            user: String::new(),
            token: String::new(),
            settle_delay: Duration::from_secs(2),
            flush_delay: Duration::from_millis(200),
        }
    }
}

/// Errors raised by session I/O
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Connection to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Send failed: {0}")]
    SendFailed(#[source] std::io::Error),
    #[error("Not connected")]
    NotConnected,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SessionError>;

/// A single protocol connection
pub struct Session {
    id: SessionId,
    settings: Arc<SessionSettings>,
    bus: Arc<EventBus>,
    /// Outbound half; `None` while disconnected
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    /// Inbound loop task
    reader: Mutex<Option<JoinHandle<()>>>,
    /// Channels this session has confirmed
    joined: Mutex<HashSet<String>>,
    state: AtomicU8,
    /// Bumped on every connect; a read loop only touches `state` while its
    /// generation is still the latest
    generation: AtomicU64,
    /// Cleared by `disconnect`; the health monitor skips sessions without it
    monitoring: AtomicBool,
    per_second: RateCounter,
    per_minute: RateCounter,
}

impl Session {
    /// Create a disconnected session
    pub fn new(id: SessionId, settings: Arc<SessionSettings>, bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self {
            id,
            settings,
            bus,
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
            joined: Mutex::new(HashSet::new()),
            state: AtomicU8::new(SessionState::Disconnected.into()),
            generation: AtomicU64::new(0),
            monitoring: AtomicBool::new(false),
            per_second: RateCounter::per_second(),
            per_minute: RateCounter::per_minute(),
        })
    }

    /// Open the transport, start the inbound loop and log in
    ///
    /// Failure to reach the server is returned to the caller untouched;
    /// retry policy belongs to the pool.
    pub async fn connect(self: &Arc<Self>, host: &str, port: u16) -> Result<()> {
        let addr = format!("{host}:{port}");
        self.set_state(SessionState::Connecting);
        log_irc!(Level::INFO, session = %self.id, %addr, "Connecting");

        let stream = match TcpStream::connect(&addr).await {
            Ok(stream) => stream,
            Err(source) => {
                self.set_state(SessionState::Disconnected);
                return Err(SessionError::ConnectFailed { addr, source });
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            log_irc!(Level::DEBUG, session = %self.id, error = %e, "TCP_NODELAY not applied");
        }

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.monitoring.store(true, Ordering::Release);
        self.set_state(SessionState::Authenticating);

        let session = Arc::clone(self);
        let handle = tokio::spawn(async move { session.read_loop(read_half, generation).await });
        if let Some(previous) = self.reader.lock().replace(handle) {
            previous.abort();
        }

        if let Err(e) = self.login().await {
            self.close_transport().await;
            return Err(e);
        }
        tokio::time::sleep(self.settings.settle_delay).await;
        Ok(())
    }

    /// Send a join for `channel` (without `#`)
    ///
    /// Does not wait for confirmation; that arrives on the bus.
    pub async fn join(&self, channel: &str) -> Result<()> {
        log_irc!(Level::DEBUG, session = %self.id, "<- JOIN #{}", channel);
        self.send(&[Command::Join(channel)]).await
    }

    /// Answer a keepalive probe
    pub async fn pong(&self, server: &str) -> Result<()> {
        log_irc!(Level::DEBUG, session = %self.id, "<- PONG :{}", server);
        self.send(&[Command::Pong(server)]).await
    }

    /// Stop monitoring, let writes drain, close the transport
    pub async fn disconnect(&self) {
        tokio::time::sleep(self.settings.flush_delay).await;
        log_irc!(Level::INFO, session = %self.id, "Disconnecting");
        self.close_transport().await;
    }

    /// Stop the read loop and drop both halves of the transport
    async fn close_transport(&self) {
        self.monitoring.store(false, Ordering::Release);
        // Invalidate the running read loop before it is aborted
        self.generation.fetch_add(1, Ordering::AcqRel);

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        self.set_state(SessionState::Disconnected);
    }

    async fn login(&self) -> Result<()> {
        log_irc!(Level::DEBUG, session = %self.id, user = %self.settings.user, "<- PASS ***, NICK, USER");
        self.send(&[
            Command::Pass(&self.settings.token),
            Command::Nick(&self.settings.user),
            Command::User(&self.settings.user),
        ])
        .await
    }

    /// Write commands in order under the writer lock
    async fn send(&self, commands: &[Command<'_>]) -> Result<()> {
        let mut buf = String::with_capacity(64 * commands.len());
        for command in commands {
            command.write_to(&mut buf);
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SessionError::NotConnected)?;

        let written = async {
            writer.write_all(buf.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = written {
            self.set_state(SessionState::Disconnected);
            return Err(SessionError::SendFailed(e));
        }
        Ok(())
    }

    async fn read_loop(self: Arc<Self>, read_half: OwnedReadHalf, generation: u64) {
        let mut reader = BufReader::new(read_half);
        // Reused across lines
        let mut buf = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    log_irc!(Level::WARN, session = %self.id, "Connection closed by server");
                    break;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    self.handle_line(&line, generation).await;
                }
                Err(e) => {
                    log_irc!(Level::WARN, session = %self.id, error = %e, "Read failed");
                    break;
                }
            }
        }

        self.set_state_if_current(generation, SessionState::Disconnected);
    }

    async fn handle_line(&self, line: &str, generation: u64) {
        self.bus.publish_received(self);
        log_irc!(Level::TRACE, session = %self.id, "-> {}", line.trim_end());

        match parse_frame(line) {
            Some(Frame::Ping { server }) => {
                if let Err(e) = self.pong(server).await {
                    log_irc!(Level::WARN, session = %self.id, error = %e, "PONG failed");
                }
            }
            Some(Frame::Welcome) => {
                log_irc!(Level::INFO, session = %self.id, "Connected");
                self.set_state_if_current(generation, SessionState::Connected);
            }
            Some(Frame::Join { channel, .. }) => {
                log_irc!(Level::DEBUG, session = %self.id, "-> JOIN #{}", channel);
                self.record_joined(channel);
                self.bus.publish_joined(channel);
            }
            Some(Frame::Privmsg { nick, channel, text }) => {
                if text.contains(self.settings.user.as_str()) && !self.settings.user.is_empty() {
                    log_irc!(Level::DEBUG, session = %self.id, "-> {} #{}: {}", nick, channel, text);
                }
            }
            Some(Frame::Numeric(_)) | Some(Frame::Other(_)) | None => {}
        }
    }

    pub(crate) fn record_joined(&self, channel: &str) {
        self.joined.lock().insert(channel.to_owned());
    }

    /// Count one inbound frame on both windows
    #[inline]
    pub fn record_received(&self) {
        self.per_second.incr(1);
        self.per_minute.incr(1);
    }

    /// Drain the joined set (used when the pool releases this session)
    pub fn take_joined(&self) -> Vec<String> {
        self.joined.lock().drain().collect()
    }

    /// Copy of the joined set
    pub fn joined_channels(&self) -> Vec<String> {
        self.joined.lock().iter().cloned().collect()
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state.load(Ordering::Acquire).into()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    #[inline]
    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Acquire)
    }

    /// Inbound frames over the last second
    #[inline]
    pub fn per_second_rate(&self) -> u64 {
        self.per_second.rate()
    }

    /// Inbound frames over the last minute
    #[inline]
    pub fn per_minute_rate(&self) -> u64 {
        self.per_minute.rate()
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state.into(), Ordering::Release);
    }

    /// State change from a read loop; ignored once a newer connect or a
    /// disconnect has superseded that loop
    fn set_state_if_current(&self, generation: u64, state: SessionState) {
        if self.generation.load(Ordering::Acquire) == generation {
            self.set_state(state);
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("monitoring", &self.is_monitoring())
            .field("joined", &self.joined.lock().len())
            .finish()
    }
}
