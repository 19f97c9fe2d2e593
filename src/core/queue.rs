//! FIFO queue of channels awaiting a join

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Mutex-protected join queue
///
/// Every operation takes the lock once, so readers never observe a
/// half-applied bulk append. No duplicate suppression happens here.
#[derive(Debug, Default)]
pub struct JoinQueue {
    inner: Mutex<VecDeque<String>>,
}

impl JoinQueue {
    /// Queue seeded with `channels` in order
    pub fn seeded<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Mutex::new(channels.into_iter().map(Into::into).collect()),
        }
    }

    /// Append channels to the tail
    pub fn append<I, S>(&self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.lock().extend(channels.into_iter().map(Into::into));
    }

    /// Put a channel back at the head (used when a dispatch fails)
    pub fn push_front(&self, channel: String) {
        self.inner.lock().push_front(channel);
    }

    /// Remove and return the head
    pub fn pop(&self) -> Option<String> {
        self.inner.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Copy of the queued names, head first
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.lock().iter().cloned().collect()
    }
}
