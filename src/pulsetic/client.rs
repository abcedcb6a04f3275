//! HTTP plumbing shared by every Pulsetic endpoint

use std::fmt;

use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::{ApiError, PulseticError};

/// Pulsetic API client bound to one API key
#[derive(Clone)]
pub struct PulseticClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for PulseticClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PulseticClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PulseticClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, PulseticError> {
        let http = Client::builder()
            .user_agent(concat!("pulsetic-operator/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http_client(http, base_url, api_key))
    }

    /// Build a client on top of an existing connection pool
    pub fn with_http_client(http: Client, base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%method, %url, "Pulsetic request");

        self.http
            .request(method, url)
            .header(CACHE_CONTROL, "no-cache")
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, &self.api_key)
    }

    /// Send a request, turning any status >= 400 into [`PulseticError::ApiError`]
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<Response, PulseticError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await?;
            return Err(ApiError::from_body(status.as_u16(), &body).into());
        }
        Ok(response)
    }

    pub(crate) async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, PulseticError> {
        let response = self.execute(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
