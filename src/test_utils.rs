//! Test utilities: loopback chat server and polling helpers
//!
//! `FakeServer` accepts any number of connections on 127.0.0.1, greets each
//! with the registration numeric (unless silent) and records every line it
//! receives per connection index.

use crate::irc::SessionSettings;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// How long polling helpers wait before giving up
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(3);

const WELCOME: &str = ":tmi.twitch.tv 001 idler :Welcome, GLHF!\r\n";

/// Session settings with no settle/flush pauses
pub fn test_session_settings() -> SessionSettings {
    SessionSettings {
        user: "idler".to_string(),
        token: "oauth:secret".to_string(),
        settle_delay: Duration::ZERO,
        flush_delay: Duration::ZERO,
    }
}

/// Poll `cond` every 10ms until it holds or `WAIT_TIMEOUT` elapses
pub async fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

#[derive(Default)]
struct Shared {
    lines: Mutex<Vec<Vec<String>>>,
    writers: tokio::sync::Mutex<Vec<Option<OwnedWriteHalf>>>,
}

/// Loopback chat server
pub struct FakeServer {
    port: u16,
    shared: Arc<Shared>,
    accept_task: JoinHandle<()>,
}

impl FakeServer {
    /// Server that greets and does nothing else
    pub async fn start() -> Self {
        Self::with_options(true, false).await
    }

    /// Server that never sends anything on its own
    pub async fn silent() -> Self {
        Self::with_options(false, false).await
    }

    /// Server that greets and confirms every JOIN it receives
    pub async fn echoing_joins() -> Self {
        Self::with_options(true, true).await
    }

    async fn with_options(greet: bool, echo_joins: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Shared::default());

        let accept_shared = Arc::clone(&shared);
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (read_half, mut write_half) = stream.into_split();
                if greet {
                    let _ = write_half.write_all(WELCOME.as_bytes()).await;
                }

                let index = {
                    let mut writers = accept_shared.writers.lock().await;
                    writers.push(Some(write_half));
                    accept_shared.lines.lock().push(Vec::new());
                    writers.len() - 1
                };

                let conn_shared = Arc::clone(&accept_shared);
                tokio::spawn(async move {
                    let mut lines = BufReader::new(read_half).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let join_target = line.strip_prefix("JOIN #").map(str::to_string);
                        conn_shared.lines.lock()[index].push(line);

                        if let (true, Some(channel)) = (echo_joins, join_target) {
                            let reply = format!(":idler!idler@idler.tmi.twitch.tv JOIN #{channel}\r\n");
                            if let Some(Some(writer)) = conn_shared.writers.lock().await.get_mut(index) {
                                let _ = writer.write_all(reply.as_bytes()).await;
                            }
                        }
                    }
                });
            }
        });

        Self {
            port,
            shared,
            accept_task,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Number of accepted connections
    pub fn connections(&self) -> usize {
        self.shared.lines.lock().len()
    }

    /// Lines received on connection `conn`
    pub fn lines(&self, conn: usize) -> Vec<String> {
        self.shared.lines.lock().get(conn).cloned().unwrap_or_default()
    }

    /// Wait until connection `conn` has received at least `n` lines
    pub async fn wait_for_lines(&self, conn: usize, n: usize) -> bool {
        wait_until(|| self.lines(conn).len() >= n).await
    }

    /// Send a line (CRLF appended) on connection `conn`
    pub async fn send(&self, conn: usize, line: &str) {
        assert!(wait_until(|| self.connections() > conn).await, "no connection {conn}");
        let mut writers = self.shared.writers.lock().await;
        let writer = writers[conn].as_mut().expect("connection closed");
        writer.write_all(format!("{line}\r\n").as_bytes()).await.unwrap();
    }

    /// Close the server side of connection `conn`
    pub async fn close(&self, conn: usize) {
        let mut writers = self.shared.writers.lock().await;
        if let Some(mut writer) = writers[conn].take() {
            let _ = writer.shutdown().await;
        }
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}
