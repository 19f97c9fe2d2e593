//! Core bookkeeping types shared by the pool and its sessions
//!
//! - RateCounter: sliding-window event counter
//! - ChannelRegistry: pool-wide channel -> joined flag
//! - JoinQueue: FIFO of channels awaiting dispatch

pub mod queue;
pub mod rate_counter;
pub mod registry;

pub use queue::JoinQueue;
pub use rate_counter::RateCounter;
pub use registry::ChannelRegistry;
