//! Channel discovery through the external directory service

pub mod client;
pub mod poller;
pub mod token;

pub use client::{DirectoryApi, DirectoryError, HelixClient, LiveChannel, StreamPage};
pub use poller::{select_candidates, ChannelSink, DiscoveryPoller, DiscoverySettings};
pub use token::{AccessToken, TokenStore};
