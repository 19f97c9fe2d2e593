//! Chat idler
//!
//! Keeps a pool of authenticated chat sessions joined to as many channels
//! as possible while staying under the server's per-connection join rate.

pub mod bus;
pub mod core;
pub mod discovery;
pub mod infrastructure;
pub mod irc;
pub mod pool;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use infrastructure::config::Config;
pub use pool::PoolManager;

use thiserror::Error;

/// Main error type for the idler
#[derive(Error, Debug)]
pub enum IdleError {
    #[error("Session error: {0}")]
    Session(#[from] irc::SessionError),

    #[error("Directory error: {0}")]
    Directory(#[from] discovery::DirectoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] infrastructure::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, IdleError>;
