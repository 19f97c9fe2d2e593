//! Synchronous event fan-out between sessions and the pool manager
//!
//! Two topics: `joined` (channel name) and `received` (session reference).
//! Publishing calls every registered handler inline, in the publisher's task.
//! Handlers sit on a session's read path and must be short and non-blocking.

use crate::irc::Session;
use parking_lot::RwLock;
use std::sync::Arc;

/// Handler for join confirmations
pub type JoinedHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Handler for every inbound frame
pub type ReceivedHandler = Arc<dyn Fn(&Session) + Send + Sync>;

/// Typed publish/subscribe hub
#[derive(Default)]
pub struct EventBus {
    joined: RwLock<Vec<JoinedHandler>>,
    received: RwLock<Vec<ReceivedHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for join confirmations
    pub fn subscribe_joined<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.joined.write().push(Arc::new(handler));
    }

    /// Register a handler for inbound frames
    pub fn subscribe_received<F>(&self, handler: F)
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        self.received.write().push(Arc::new(handler));
    }

    /// Notify that `channel` was joined
    #[inline]
    pub fn publish_joined(&self, channel: &str) {
        for handler in self.joined.read().iter() {
            handler(channel);
        }
    }

    /// Notify that `session` received a frame
    #[inline]
    pub fn publish_received(&self, session: &Session) {
        for handler in self.received.read().iter() {
            handler(session);
        }
    }

    /// Number of registered handlers (joined, received)
    pub fn handler_count(&self) -> (usize, usize) {
        (self.joined.read().len(), self.received.read().len())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (joined, received) = self.handler_count();
        f.debug_struct("EventBus")
            .field("joined_handlers", &joined)
            .field("received_handlers", &received)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irc::{SessionId, SessionSettings};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_joined_fan_out() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            bus.subscribe_joined(move |channel| seen.lock().push(format!("{tag}:{channel}")));
        }

        bus.publish_joined("alpha");
        assert_eq!(*seen.lock(), vec!["a:alpha", "b:alpha"]);
    }

    #[test]
    fn test_received_gets_session() {
        let bus = Arc::new(EventBus::new());
        let last_id = Arc::new(AtomicU64::new(0));

        let sink = Arc::clone(&last_id);
        bus.subscribe_received(move |session| sink.store(session.id().0, Ordering::Relaxed));

        let session = Session::new(SessionId(7), Arc::new(SessionSettings::default()), Arc::clone(&bus));
        bus.publish_received(&session);

        assert_eq!(last_id.load(Ordering::Relaxed), 7);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish_joined("alpha");
        assert_eq!(bus.handler_count(), (0, 0));
    }
}
