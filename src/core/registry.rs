//! Pool-wide channel registry
//!
//! Maps channel name to a joined flag. An entry is created only when the
//! server confirms a join; the flag flips back to `false` when the owning
//! session is found dead. Issued but unconfirmed joins leave no trace here,
//! so discovery can still pick those channels up again.
//!
//! The registry itself is not synchronized. The pool manager keeps it under
//! the same lock as its session map.

use std::collections::HashMap;

/// Channel name -> joined flag
#[derive(Debug, Default, Clone)]
pub struct ChannelRegistry {
    entries: HashMap<String, bool>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a confirmed join. Returns true if the flag changed.
    pub fn mark_joined(&mut self, channel: &str) -> bool {
        match self.entries.insert(channel.to_owned(), true) {
            Some(true) => false,
            _ => true,
        }
    }

    /// Clear the joined flag so the channel can be dispatched again
    pub fn release(&mut self, channel: &str) {
        if let Some(flag) = self.entries.get_mut(channel) {
            *flag = false;
        }
    }

    /// Channel was confirmed at least once
    #[inline]
    pub fn is_known(&self, channel: &str) -> bool {
        self.entries.contains_key(channel)
    }

    /// Channel is confirmed joined
    #[inline]
    pub fn is_joined(&self, channel: &str) -> bool {
        self.entries.get(channel).copied().unwrap_or(false)
    }

    /// Number of confirmed channels
    pub fn joined_count(&self) -> usize {
        self.entries.values().filter(|&&joined| joined).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_channel() {
        let registry = ChannelRegistry::new();
        assert!(!registry.is_known("alpha"));
        assert!(!registry.is_joined("alpha"));
        assert_eq!(registry.joined_count(), 0);
    }

    #[test]
    fn test_confirmed_join_creates_entry() {
        let mut registry = ChannelRegistry::new();

        assert!(registry.mark_joined("alpha"));

        assert!(registry.is_known("alpha"));
        assert!(registry.is_joined("alpha"));
        assert_eq!(registry.joined_count(), 1);
    }

    #[test]
    fn test_mark_joined_twice() {
        let mut registry = ChannelRegistry::new();
        assert!(registry.mark_joined("alpha"));
        assert!(!registry.mark_joined("alpha"));
        assert_eq!(registry.joined_count(), 1);
    }

    #[test]
    fn test_release_keeps_entry() {
        let mut registry = ChannelRegistry::new();
        registry.mark_joined("alpha");
        registry.release("alpha");

        assert!(registry.is_known("alpha"));
        assert!(!registry.is_joined("alpha"));
        assert_eq!(registry.joined_count(), 0);

        // A later confirmation counts again
        assert!(registry.mark_joined("alpha"));
    }

    #[test]
    fn test_release_unknown_is_noop() {
        let mut registry = ChannelRegistry::new();
        registry.release("ghost");
        assert!(!registry.is_known("ghost"));
    }
}
