//! Request/response exchange with the DashClaw service.
//!
//! Every call is a JSON round trip authenticated with `x-api-key`. Non-2xx
//! responses become [`TransportError::Status`] carrying the service's
//! `error`/`details` fields.

pub mod api_error;
pub mod http_client;

use crate::error::{ConfigError, TransportError};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

pub use api_error::{api_error, sanitize_api_error};
pub use http_client::build_http_client_with_timeout;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct Transport {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl Transport {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let invalid = |reason: String| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let base_url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("URL cannot carry a path".into()));
        }

        if base_url.scheme() != "https" && !is_loopback(&base_url) {
            tracing::warn!(
                base_url = %base_url,
                "base_url does not use HTTPS; API keys will be sent in plaintext"
            );
        }

        Ok(Self {
            client: build_http_client_with_timeout(timeout),
            base_url,
            api_key: api_key.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Resolve path segments against the base URL, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub async fn get<T>(&self, segments: &[&str], query: &[(&str, String)]) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let request = self.request(Method::GET, segments).query(query);
        self.send(request).await
    }

    pub async fn post<B, T>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, segments).query(query).json(body);
        self.send(request).await
    }

    pub async fn patch<B, T>(&self, segments: &[&str], body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::PATCH, segments).json(body);
        self.send(request).await
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        tracing::debug!(method = %method, path = %url.path(), "dashclaw.request");
        self.client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/json")
    }

    async fn send<T>(&self, request: RequestBuilder) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"))
}
