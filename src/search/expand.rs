//! More-like-this expansion
//!
//! The seed documents become the "like" set of a `more_like_this` query.
//! Document frequency thresholds are given as fractions of the seed total and
//! converted to absolute counts here, so that "too common" and "too rare"
//! scale with the size of the seed result set.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::debug;

use super::extract::extract_docs;
use super::params::{render_percentage, ExpansionParams, StopWords};
use super::{Document, Pagination, SearchPage};
use crate::core::transport::{EngineRequest, Transport, SEARCH_TYPE};
use crate::error::Result;

/// Boost applied to significant terms, by their tf-idf score
const BOOST_TERMS: f64 = 1.0;

/// Field list meaning "every field"
const ALL_FIELDS: &str = "*";

/// Parameters of an expansion query
#[derive(Debug, Clone)]
pub struct ExpansionQuery<'a> {
    pub fields: &'a [String],
    pub like: &'a [Document],
    /// Seed total, the base for the document frequency bounds
    pub total: u64,
    pub params: &'a ExpansionParams,
    pub stop_words: Option<&'a StopWords>,
    pub filters: &'a [Value],
    pub pagination: &'a Pagination,
    /// Extra top-level body keys (aggregations, highlight, post_filter, ...)
    pub passthrough: Option<&'a Map<String, Value>>,
}

impl ExpansionQuery<'_> {
    /// The `more_like_this` clause. Thresholds must already be validated.
    pub fn clause(&self) -> Value {
        let fields: Vec<&str> = if self.fields.is_empty() {
            vec![ALL_FIELDS]
        } else {
            self.fields.iter().map(String::as_str).collect()
        };
        let like: Vec<Value> = self.like.iter().map(Document::like_ref).collect();
        let (min_doc_freq, max_doc_freq) = self.params.doc_freq_bounds(self.total);

        let mut mlt = json!({
            "fields": fields,
            "like": like,
            "min_term_freq": self.params.min_term_freq,
            "max_query_terms": self.params.max_query_terms,
            "min_doc_freq": min_doc_freq,
            "max_doc_freq": max_doc_freq,
            "boost_terms": BOOST_TERMS,
            "minimum_should_match": render_percentage(self.params.min_should_match),
            "include": true,
        });
        if let Some(stop_words) = self.stop_words {
            mlt["stop_words"] = json!(stop_words.to_vec());
        }
        json!({"more_like_this": mlt})
    }

    /// Whether this request pages by offset rather than by scroll
    fn uses_offset(&self) -> bool {
        matches!(self.pagination.offset, Some(offset) if offset < self.total)
    }

    pub fn body(&self) -> Value {
        let mut body = Map::new();
        if let Some(extra) = self.passthrough {
            body.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        body.insert(
            "query".to_string(),
            json!({"bool": {"must": [self.clause()], "filter": self.filters}}),
        );
        if self.uses_offset() {
            body.insert("from".to_string(), json!(self.pagination.offset));
        }
        if let Some(limit) = self.pagination.limit {
            body.insert("size".to_string(), json!(limit));
        }
        Value::Object(body)
    }

    /// Scroll window, only when not paging by offset
    pub fn scroll(&self) -> Option<&str> {
        if self.uses_offset() {
            None
        } else {
            self.pagination.scroll.as_deref()
        }
    }

    pub fn request(&self, url: &str, headers: &BTreeMap<String, String>) -> EngineRequest {
        let mut request = EngineRequest::new(url, self.body())
            .param(SEARCH_TYPE.0, SEARCH_TYPE.1)
            .headers(headers.clone());
        if let Some(window) = self.scroll() {
            request = request.param("scroll", window);
        }
        request
    }
}

/// Run the expansion against `url` (a `_search` endpoint).
///
/// An empty seed set cannot seed an expansion: `total == 0` returns an empty
/// page without contacting the engine.
pub async fn more_like_this<T: Transport>(
    transport: &T,
    url: &str,
    query: &ExpansionQuery<'_>,
) -> Result<SearchPage> {
    if query.total == 0 {
        return Ok(SearchPage::empty());
    }
    query.params.validate()?;

    let request = query.request(url, &BTreeMap::new());
    let continuation = query.scroll().is_some();
    let body = request.body.clone();
    let response = transport.post(request).await?;

    let page = extract_docs(&body, &response.body, continuation, false)?;
    debug!(returned = page.documents.len(), token = ?page.token, "expansion query done");
    Ok(page)
}
