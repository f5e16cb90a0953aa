//! HTTP client for the Mirth Connect management API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use thiserror::Error;

use crate::config::Config;
use crate::protocol::{
    decode_channel_statistics, decode_channel_statuses, decode_version, ChannelStatistics,
    ChannelStatus, DecodeError,
};

pub const CHANNEL_STATUSES_PATH: &str = "/api/channels/statuses";
pub const CHANNEL_STATISTICS_PATH: &str = "/api/channels/statistics";
pub const SERVER_VERSION_PATH: &str = "/api/server/version";

/// Mirth's CSRF filter rejects API calls that do not identify themselves.
const REQUESTED_WITH: &str = "mirth-channel-exporter";

/// Everything that can go wrong talking to the engine. Both variants are
/// contained at the collection boundary and surface only as `mirth_up 0`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The connection could not be established, the request could not be
    /// constructed, or the body could not be read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The body was read but does not parse as the expected document. A
    /// non-2xx response with an unparseable body lands here too: status
    /// codes are never inspected.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// The typed operations the collection pipeline needs from the engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelApi: Send + Sync {
    async fn channel_statuses(&self) -> Result<Vec<ChannelStatus>, FetchError>;
    async fn channel_statistics(&self) -> Result<Vec<ChannelStatistics>, FetchError>;
    async fn server_version(&self) -> Result<String, FetchError>;
}

/// Client for one engine instance. Base URL and credentials are fixed at
/// construction; the inner `reqwest::Client` is shared across concurrent
/// scrape cycles.
pub struct MirthClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl MirthClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert("X-Requested-With", HeaderValue::from_static(REQUESTED_WITH));

        // The management port is typically self-signed, so certificate
        // verification is deliberately disabled.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(Duration::from_secs(config.http_connect_timeout_secs))
            .timeout(Duration::from_secs(config.http_request_timeout_secs))
            .default_headers(headers)
            .user_agent(REQUESTED_WITH)
            .build()?;

        Ok(Self {
            http,
            base_url: config.mirth_endpoint.trim_end_matches('/').to_string(),
            username: config.mirth_username.clone(),
            password: config.mirth_password.clone(),
        })
    }

    /// Issues an authenticated GET and returns the full body. The response
    /// status is not inspected; a body that is not the expected document
    /// fails later, in the decoder.
    async fn fetch(&self, path: &str) -> Result<String, FetchError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl ChannelApi for MirthClient {
    async fn channel_statuses(&self) -> Result<Vec<ChannelStatus>, FetchError> {
        let body = self.fetch(CHANNEL_STATUSES_PATH).await?;
        Ok(decode_channel_statuses(&body)?)
    }

    async fn channel_statistics(&self) -> Result<Vec<ChannelStatistics>, FetchError> {
        let body = self.fetch(CHANNEL_STATISTICS_PATH).await?;
        Ok(decode_channel_statistics(&body)?)
    }

    async fn server_version(&self) -> Result<String, FetchError> {
        let body = self.fetch(SERVER_VERSION_PATH).await?;
        Ok(decode_version(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped_from_the_endpoint() {
        let client = MirthClient::new(&Config {
            mirth_endpoint: "https://mirth.example.org:8443/".to_string(),
            ..Config::default()
        })
        .unwrap();
        assert_eq!(client.base_url, "https://mirth.example.org:8443");
    }

    #[tokio::test]
    async fn unreachable_engine_is_a_transport_error() {
        let client = MirthClient::new(&Config {
            // Reserved TEST-NET-1 address, nothing listens there.
            mirth_endpoint: "http://192.0.2.1:1".to_string(),
            http_connect_timeout_secs: 1,
            http_request_timeout_secs: 1,
            ..Config::default()
        })
        .unwrap();

        match client.channel_statuses().await {
            Err(FetchError::Transport(_)) => {}
            other => panic!("expected transport error, got {:?}", other.map(|_| ())),
        }
    }
}
