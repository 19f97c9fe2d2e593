//! Directory API client (Cold Path)
//!
//! Lists currently-live channels ordered by viewer count and exchanges
//! client credentials for an app access token.

use crate::discovery::token::{unix_now, AccessToken};
use crate::log_directory;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_API_BASE: &str = "https://api.twitch.tv/helix";
pub const DEFAULT_ID_BASE: &str = "https://id.twitch.tv/oauth2";

/// A live channel as reported by the directory
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LiveChannel {
    #[serde(rename = "user_login")]
    pub name: String,
    #[serde(rename = "viewer_count")]
    pub viewers: u64,
}

/// Continuation token; empty at the end of the list
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub cursor: String,
}

/// One page of live channels
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamPage {
    #[serde(default)]
    pub data: Vec<LiveChannel>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Directory errors
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Request/response surface of the directory service
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// One page of live channels starting after `cursor` (empty = top)
    async fn list_active(
        &self,
        token: &AccessToken,
        cursor: &str,
        page_size: u32,
    ) -> Result<StreamPage, DirectoryError>;

    /// Exchange the client credentials for a fresh app token
    async fn exchange_token(&self) -> Result<AccessToken, DirectoryError>;
}

/// HTTP implementation against the Helix API
pub struct HelixClient {
    client: reqwest::Client,
    api_base: String,
    id_base: String,
    client_id: String,
    client_secret: String,
}

impl HelixClient {
    pub fn new(
        api_base: impl Into<String>,
        id_base: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent(concat!("chat-idle/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            id_base: id_base.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl DirectoryApi for HelixClient {
    /// API: GET {api_base}/streams?first=N&after=cursor
    async fn list_active(
        &self,
        token: &AccessToken,
        cursor: &str,
        page_size: u32,
    ) -> Result<StreamPage, DirectoryError> {
        let url = format!("{}/streams", self.api_base);

        let mut request = self
            .client
            .get(&url)
            .query(&[("first", page_size.to_string())])
            .header("Client-ID", &self.client_id)
            .bearer_auth(&token.access_token);
        if !cursor.is_empty() {
            request = request.query(&[("after", cursor)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DirectoryError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Http(response.status().as_u16()));
        }

        response
            .json::<StreamPage>()
            .await
            .map_err(|e| DirectoryError::Parse(e.to_string()))
    }

    /// API: POST {id_base}/token?client_id&client_secret&grant_type=client_credentials
    async fn exchange_token(&self) -> Result<AccessToken, DirectoryError> {
        let url = format!("{}/token", self.id_base);

        log_directory!(Level::INFO, "Requesting app access token");

        let response = self
            .client
            .post(&url)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| DirectoryError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Http(response.status().as_u16()));
        }

        let mut token: AccessToken = response
            .json()
            .await
            .map_err(|e| DirectoryError::Parse(e.to_string()))?;
        token.issued = unix_now();

        Ok(token)
    }
}
