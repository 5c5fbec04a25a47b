//! Gateway: expands inbound search requests before proxying them
//!
//! The inbound body is an ordinary engine search body with a few extra
//! top-level keys (thresholds, paging) that are popped before forwarding.
//! Only `_search` requests carrying a `query` are expanded; anything else is
//! forwarded untouched.

pub mod server;

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::core::config::GatewayConfig;
use crate::core::transport::{EngineRequest, EngineResponse, Transport};
use crate::error::{ProxyError, Result};
use crate::search::expand::ExpansionQuery;
use crate::search::extract::{extract_docs, normalize_total};
use crate::search::params::ExpansionParams;
use crate::search::seed::SeedQuery;
use crate::search::Pagination;

/// Body keys consumed by the gateway
const OVERRIDE_KEYS: [&str; 6] = [
    "min_term_freq",
    "max_query_terms",
    "min_doc_freq",
    "min_doc_frac",
    "max_doc_frac",
    "minimum_should_match",
];

/// Inbound headers never forwarded to the engine. The transport negotiates
/// its own encoding, so `accept-encoding` is dropped with the hop-by-hop set.
const HOP_HEADERS: [&str; 9] = [
    "host",
    "content-length",
    "accept-encoding",
    "connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayRequest {
    /// Path below the engine host, e.g. `arxiv_v6/_search`
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

/// Keyword query and fields pulled out of an inbound `query`
#[derive(Debug, Clone, PartialEq)]
pub struct InboundQuery {
    pub text: String,
    pub fields: Vec<String>,
}

impl InboundQuery {
    /// Accepts a bare string, or the bool/should shape sent by searchkit
    /// front-ends: `should[0].simple_query_string.query` and
    /// `should[1].multi_match.fields`.
    pub fn parse(query: &Value, default_fields: &[String]) -> Result<Self> {
        if let Some(text) = query.as_str() {
            return Ok(Self {
                text: text.to_string(),
                fields: default_fields.to_vec(),
            });
        }

        let text = query
            .pointer("/bool/should/0/simple_query_string/query")
            .and_then(Value::as_str)
            .ok_or_else(|| ProxyError::invalid_argument("unsupported query shape, expected a keyword query"))?;
        let fields = match query.pointer("/bool/should/1/multi_match/fields") {
            Some(fields) => serde_json::from_value(fields.clone())
                .map_err(|e| ProxyError::invalid_argument(format!("bad multi_match fields: {}", e)))?,
            None => default_fields.to_vec(),
        };
        Ok(Self {
            text: text.to_string(),
            fields,
        })
    }
}

/// Drop `lte` bounds at or above `limit` from range clauses, except on
/// year/date fields. The front-end sends its slider maximum as a bound,
/// which would otherwise exclude documents with larger values.
pub fn strip_upper_limits(post_filter: &mut Value, limit: i64) {
    let ranges: Vec<&mut Value> = if post_filter.get("range").is_some() {
        post_filter.get_mut("range").into_iter().collect()
    } else {
        match post_filter.pointer_mut("/bool/must").and_then(Value::as_array_mut) {
            Some(must) => must.iter_mut().filter_map(|clause| clause.get_mut("range")).collect(),
            None => Vec::new(),
        }
    };

    for range in ranges {
        let Some(fields) = range.as_object_mut() else {
            continue;
        };
        for (field, limits) in fields.iter_mut() {
            if field.starts_with("year") || field.starts_with("date") {
                continue;
            }
            let Some(limits) = limits.as_object_mut() else {
                continue;
            };
            let too_high = limits.get("lte").and_then(as_i64_lenient).is_some_and(|lte| lte >= limit);
            if too_high {
                limits.remove("lte");
            }
        }
    }
}

/// Pop a paging key that must be a non-negative integer when present
fn take_count(body: &mut Map<String, Value>, key: &str) -> Result<Option<u64>> {
    match body.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| ProxyError::invalid_argument(format!("'{}' must be a non-negative integer, got {}", key, value))),
    }
}

fn as_i64_lenient(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Replace a structured `hits.total` with its integer value
pub fn normalize_response(mut body: Value) -> Value {
    if let Some(total) = body.pointer_mut("/hits/total") {
        if let Some(n) = normalize_total(total) {
            *total = Value::from(n);
        }
    }
    body
}

pub struct Gateway<T> {
    transport: T,
    config: GatewayConfig,
    defaults: ExpansionParams,
    default_fields: Vec<String>,
}

impl<T: Transport> Gateway<T> {
    pub fn new(transport: T, config: GatewayConfig, defaults: ExpansionParams, default_fields: Vec<String>) -> Self {
        Self {
            transport,
            config,
            defaults,
            default_fields,
        }
    }

    fn response(&self, engine: EngineResponse) -> GatewayResponse {
        let mut headers = BTreeMap::new();
        if self.config.cors {
            headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
            headers.insert("Access-Control-Allow-Credentials".to_string(), "true".to_string());
        }
        GatewayResponse {
            status_code: engine.status,
            headers,
            body: normalize_response(engine.body),
        }
    }

    /// Resolve and check the target engine host
    fn resolve_endpoint(&self, headers: &mut BTreeMap<String, String>) -> Result<String> {
        let header = self.config.endpoint_header.to_lowercase();
        let key = headers.keys().find(|k| k.to_lowercase() == header).cloned();
        let endpoint = key
            .and_then(|k| headers.remove(&k))
            .ok_or_else(|| ProxyError::Configuration(format!("missing '{}' header", self.config.endpoint_header)))?;

        if !self.config.allowed_endpoints.iter().any(|allowed| *allowed == endpoint) {
            warn!(endpoint = %endpoint, "rejected unregistered endpoint");
            return Err(ProxyError::Configuration(format!("{} has not been registered", endpoint)));
        }
        Ok(endpoint)
    }

    /// Pop the expansion overrides out of the body, layered over the defaults
    fn take_overrides(&self, body: &mut Map<String, Value>) -> Result<ExpansionParams> {
        let mut merged = match serde_json::to_value(&self.defaults)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for key in OVERRIDE_KEYS {
            if let Some(value) = body.remove(key) {
                let canonical = match key {
                    "min_doc_freq" => "min_doc_frac",
                    "minimum_should_match" => "min_should_match",
                    other => other,
                };
                merged.insert(canonical.to_string(), value);
            }
        }
        let params: ExpansionParams = serde_json::from_value(Value::Object(merged))
            .map_err(|e| ProxyError::invalid_argument(format!("bad expansion parameter: {}", e)))?;
        params.validate()?;
        Ok(params)
    }

    pub async fn handle(&self, request: GatewayRequest) -> Result<GatewayResponse> {
        let GatewayRequest { path, mut headers, body } = request;
        let mut body = match body {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ProxyError::invalid_argument("request body must be a JSON object")),
        };

        if let (Some(limit), Some(post_filter)) = (self.config.range_upper_limit, body.get_mut("post_filter")) {
            strip_upper_limits(post_filter, limit);
        }

        let endpoint = self.resolve_endpoint(&mut headers)?;
        headers.retain(|k, _| !HOP_HEADERS.contains(&k.to_lowercase().as_str()));
        let url = format!(
            "{}://{}/{}",
            self.config.scheme,
            endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        if !url.ends_with("_search") || !body.contains_key("query") {
            let forwarded = EngineRequest::new(url, Value::Object(body)).headers(headers);
            let response = self.transport.post(forwarded).await?;
            return Ok(self.response(response));
        }

        let from = take_count(&mut body, "from")?;
        let size = take_count(&mut body, "size")?;
        let params = self.take_overrides(&mut body)?;
        let inbound = body.remove("query").unwrap_or(Value::Null);
        let query = InboundQuery::parse(&inbound, &self.default_fields)?;

        let seed_request = SeedQuery {
            text: &query.text,
            fields: &query.fields,
            ..Default::default()
        }
        .request(&url, &headers);
        let seed_body = seed_request.body.clone();
        let seed_response = self.transport.post(seed_request).await?;
        let seed = extract_docs(&seed_body, &seed_response.body, false, false)?;
        let total = seed.token.count().unwrap_or_default();
        if total == 0 {
            info!(query = %query.text, "no seed documents, returning seed response");
            return Ok(self.response(seed_response));
        }

        let pagination = Pagination {
            limit: size,
            offset: from,
            scroll: None,
        };
        let expansion = ExpansionQuery {
            fields: &query.fields,
            like: &seed.documents,
            total,
            params: &params,
            stop_words: None,
            filters: &[],
            pagination: &pagination,
            passthrough: Some(&body),
        };
        let response = self.transport.post(expansion.request(&url, &headers)).await?;
        info!(query = %query.text, seed_total = total, status = response.status, "expanded search proxied");
        Ok(self.response(response))
    }
}
