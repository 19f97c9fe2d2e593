//! Infrastructure - cold path only
//!
//! This module contains code off the session read path:
//! - Configuration loading and persistence
//! - Logging
//! - Pool metrics

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{Config, ConfigError};
pub use logging::init_logging;
pub use metrics::{PoolMetrics, PoolStats};
