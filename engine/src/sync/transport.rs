//! HTTP transport seam for the Sync Engine (§9 design note: "the core calls
//! it through a request function"). Swapping [`ReqwestTransport`] for a
//! stub in tests exercises the merge logic without a live server.

use async_trait::async_trait;
use std::time::Duration;

use crate::version::{
    DATASTORE_VERSION, HEADER_CLIENT, HEADER_DATASTORE_VERSION, HEADER_PROTOCOL_VERSION,
    PROTOCOL_VERSION,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A single outbound sync request, already carrying everything except the
/// wire-protocol headers, which [`WireRequest::headers`] derives.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub api_key: String,
    /// JSON-encoded request body; absent for GET requests.
    pub body: Option<String>,
}

impl WireRequest {
    pub fn get(path: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            api_key: api_key.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, api_key: impl Into<String>, body: String) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            api_key: api_key.into(),
            body: Some(body),
        }
    }

    pub fn with_profile(mut self, profile: Option<&str>) -> Self {
        if let Some(p) = profile {
            self.query.push(("profile".to_string(), p.to_string()));
        }
        self
    }
}

/// Response to a [`WireRequest`]. `body` is raw text: a successful response
/// is JSON the caller parses itself; an error response (§6.1) is a plain
/// text message surfaced verbatim in [`crate::error::Error::ServerError`].
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: String,
    pub datastore_version: Option<u32>,
    pub protocol_version: Option<u32>,
}

impl WireResponse {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Request(String),
}

/// Seam between the Sync Engine and the network, so tests never perform
/// real IO (§4.4 design note).
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn request(&self, req: WireRequest) -> Result<WireResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client builds with static configuration");
        Self {
            client,
            base_url: base_url.into(),
            client_id: client_id.into(),
        }
    }

    fn url(&self, req: &WireRequest) -> String {
        let mut url = format!("{}{}", self.base_url.trim_end_matches('/'), req.path);
        if !req.query.is_empty() {
            let qs: Vec<String> = req
                .query
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            url.push('?');
            url.push_str(&qs.join("&"));
        }
        url
    }
}

#[async_trait]
impl SyncTransport for ReqwestTransport {
    async fn request(&self, req: WireRequest) -> Result<WireResponse, TransportError> {
        let url = self.url(&req);
        let mut builder = match req.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };

        builder = builder
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", req.api_key))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(HEADER_DATASTORE_VERSION, DATASTORE_VERSION.to_string())
            .header(HEADER_PROTOCOL_VERSION, PROTOCOL_VERSION.to_string())
            .header(HEADER_CLIENT, self.client_id.clone());

        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let datastore_version = response
            .headers()
            .get(HEADER_DATASTORE_VERSION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let protocol_version = response
            .headers()
            .get(HEADER_PROTOCOL_VERSION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(WireResponse {
            status,
            body,
            datastore_version,
            protocol_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path_and_query() {
        let transport = ReqwestTransport::new("https://sync.example.test/", "pocket-test/1.0");
        let req = WireRequest::get("/items", "key").with_profile(Some("p1"));
        assert_eq!(
            transport.url(&req),
            "https://sync.example.test/items?profile=p1"
        );
    }
}
