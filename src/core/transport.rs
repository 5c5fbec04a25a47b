use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// Query parameter asking the engine for globally consistent term statistics
pub const SEARCH_TYPE: (&str, &str) = ("search_type", "dfs_query_then_fetch");

/// A single outbound request to the search engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl EngineRequest {
    pub fn new(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            params: Vec::new(),
            headers: BTreeMap::new(),
            body,
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw engine answer. The body is returned whatever the HTTP status; engine
/// errors are detected by the response extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResponse {
    pub status: u16,
    pub body: Value,
}

/// Outbound seam to the search engine
pub trait Transport: Send + Sync {
    fn post(&self, request: EngineRequest) -> impl Future<Output = Result<EngineResponse>> + Send;

    /// Used to release server-side resources such as scroll contexts
    fn delete(&self, request: EngineRequest) -> impl Future<Output = Result<EngineResponse>> + Send;
}

/// `{endpoint}/{index}/_search`, or `{endpoint}/_search` without an index
pub fn search_url(endpoint: &str, index: Option<&str>) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    match index {
        Some(index) if !index.is_empty() => format!("{}/{}/_search", endpoint, index),
        _ => format!("{}/_search", endpoint),
    }
}

pub fn scroll_url(endpoint: &str) -> String {
    format!("{}/_search/scroll", endpoint.trim_end_matches('/'))
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl HttpTransport {
    async fn send(&self, method: Method, request: EngineRequest) -> Result<EngineResponse> {
        debug!(%method, url = %request.url, params = ?request.params, "request to search engine");

        let mut builder = self
            .client
            .request(method, &request.url)
            .query(&request.params)
            .json(&request.body);
        for (name, value) in &request.headers {
            // the JSON body sets its own content type
            if name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)?;

        debug!(status, "search engine responded");
        Ok(EngineResponse { status, body })
    }
}

impl Transport for HttpTransport {
    async fn post(&self, request: EngineRequest) -> Result<EngineResponse> {
        self.send(Method::POST, request).await
    }

    async fn delete(&self, request: EngineRequest) -> Result<EngineResponse> {
        self.send(Method::DELETE, request).await
    }
}
