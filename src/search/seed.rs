//! Seed retrieval: the plain keyword search whose top hits seed the expansion

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::debug;

use super::extract::extract_docs;
use super::Document;
use crate::core::transport::{EngineRequest, Transport, SEARCH_TYPE};
use crate::error::Result;

/// Parameters of a seed query
#[derive(Debug, Clone, Default)]
pub struct SeedQuery<'a> {
    pub text: &'a str,
    pub fields: &'a [String],
    pub filters: &'a [Value],
    pub size: Option<u64>,
    /// Aggregation clause; when present `_source` is dropped from the request
    pub aggregation: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeedResult {
    pub total: u64,
    pub documents: Vec<Document>,
}

impl SeedQuery<'_> {
    /// Request body. Matching is case-insensitive, filters are ANDed.
    pub fn body(&self) -> Value {
        let mut body = json!({
            "query": {
                "bool": {
                    "must": [{
                        "query_string": {
                            "query": self.text.to_lowercase(),
                            "fields": self.fields,
                        }
                    }],
                    "filter": self.filters,
                }
            }
        });
        if let Some(size) = self.size {
            body["size"] = json!(size);
        }
        match &self.aggregation {
            Some(aggregation) => body["aggregations"] = aggregation.clone(),
            None => body["_source"] = json!(false),
        }
        body
    }

    pub fn request(&self, url: &str, headers: &BTreeMap<String, String>) -> EngineRequest {
        EngineRequest::new(url, self.body())
            .param(SEARCH_TYPE.0, SEARCH_TYPE.1)
            .headers(headers.clone())
    }
}

/// Run the seed query against `url` (a `_search` endpoint)
pub async fn simple_query<T: Transport>(transport: &T, url: &str, query: &SeedQuery<'_>) -> Result<SeedResult> {
    let request = query.request(url, &BTreeMap::new());
    let body = request.body.clone();
    let response = transport.post(request).await?;

    let page = extract_docs(&body, &response.body, false, false)?;
    let total = page.token.count().unwrap_or_default();
    debug!(total, seeds = page.documents.len(), "seed query done");

    Ok(SeedResult {
        total,
        documents: page.documents,
    })
}
