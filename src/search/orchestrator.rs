//! End-to-end expansion search: seed, then expand

use serde_json::Value;
use tracing::info;

use super::expand::{more_like_this, ExpansionQuery};
use super::params::{ExpansionParams, StopWords};
use super::seed::{simple_query, SeedQuery};
use super::{Pagination, SearchPage};
use crate::core::transport::{search_url, Transport};
use crate::error::Result;

/// Everything needed for one expansion search
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub index: Option<String>,
    pub query: String,
    pub fields: Vec<String>,
    /// Applied to the seed query
    pub pre_filters: Vec<Value>,
    /// Applied to the expansion query
    pub post_filters: Vec<Value>,
    /// Cap on the number of seed documents
    pub n_seed_docs: Option<u64>,
    pub pagination: Pagination,
    pub params: ExpansionParams,
    pub stop_words: Option<StopWords>,
}

/// Seed with the keyword query, then expand from the seed documents.
///
/// An empty seed set ends the search with an empty page.
pub async fn search<T: Transport>(transport: &T, endpoint: &str, request: &SearchRequest) -> Result<SearchPage> {
    let url = search_url(endpoint, request.index.as_deref());

    let seed = simple_query(
        transport,
        &url,
        &SeedQuery {
            text: &request.query,
            fields: &request.fields,
            filters: &request.pre_filters,
            size: request.n_seed_docs,
            aggregation: None,
        },
    )
    .await?;

    if seed.total == 0 {
        info!(query = %request.query, "no seed documents, skipping expansion");
        return Ok(SearchPage::empty());
    }

    let page = more_like_this(
        transport,
        &url,
        &ExpansionQuery {
            fields: &request.fields,
            like: &seed.documents,
            total: seed.total,
            params: &request.params,
            stop_words: request.stop_words.as_ref(),
            filters: &request.post_filters,
            pagination: &request.pagination,
            passthrough: None,
        },
    )
    .await?;

    info!(
        query = %request.query,
        seeds = seed.documents.len(),
        seed_total = seed.total,
        returned = page.documents.len(),
        "expansion search done"
    );
    Ok(page)
}
