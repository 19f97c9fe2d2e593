//! Session pool: dispatch, autoscaling and health monitoring

pub mod manager;

pub use manager::{DispatchStep, PoolManager, PoolSettings};
