pub mod keywords;
pub mod search;
pub mod serve;
pub mod stream;

use clap::Args;
use serde_json::Value;

use crate::core::config::AppConfig;
use crate::search::orchestrator::SearchRequest;
use crate::search::params::StopWords;
use crate::search::Pagination;

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON filter: {}", e))
}

/// Arguments shared by the search commands
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Keyword query
    pub query: String,

    /// Index to search (defaults to the configured index)
    #[arg(short, long)]
    pub index: Option<String>,

    /// Field to match and expand on, repeatable
    #[arg(short, long = "field")]
    pub fields: Vec<String>,

    /// Filter clause (JSON) applied to the seed query, repeatable
    #[arg(long = "pre-filter", value_parser = parse_json)]
    pub pre_filters: Vec<Value>,

    /// Filter clause (JSON) applied to the expanded query, repeatable
    #[arg(long = "post-filter", value_parser = parse_json)]
    pub post_filters: Vec<Value>,

    /// Number of seed documents
    #[arg(long)]
    pub n_seed_docs: Option<u64>,

    #[arg(long)]
    pub min_term_freq: Option<u32>,

    #[arg(long)]
    pub max_query_terms: Option<u32>,

    #[arg(long)]
    pub min_doc_frac: Option<f64>,

    #[arg(long)]
    pub max_doc_frac: Option<f64>,

    /// Fraction of significant terms a result must match
    #[arg(long)]
    pub min_should_match: Option<f64>,

    /// Extra stop word, repeatable
    #[arg(long = "stop-word")]
    pub stop_words: Vec<String>,
}

impl QueryArgs {
    pub fn index(&self, config: &AppConfig) -> Option<String> {
        self.index.clone().or_else(|| config.index.clone())
    }

    pub fn fields(&self, config: &AppConfig) -> Vec<String> {
        if self.fields.is_empty() {
            config.fields.clone()
        } else {
            self.fields.clone()
        }
    }

    pub fn stop_words(&self, config: &AppConfig) -> StopWords {
        StopWords::with_overlay(config.stop_words.iter().chain(&self.stop_words))
    }

    /// Flags layered over the configured defaults
    pub fn to_request(&self, config: &AppConfig, pagination: Pagination) -> SearchRequest {
        let mut params = config.expansion.clone();
        if let Some(v) = self.min_term_freq {
            params.min_term_freq = v;
        }
        if let Some(v) = self.max_query_terms {
            params.max_query_terms = v;
        }
        if let Some(v) = self.min_doc_frac {
            params.min_doc_frac = v;
        }
        if let Some(v) = self.max_doc_frac {
            params.max_doc_frac = v;
        }
        if let Some(v) = self.min_should_match {
            params.min_should_match = v;
        }

        SearchRequest {
            index: self.index(config),
            query: self.query.clone(),
            fields: self.fields(config),
            pre_filters: self.pre_filters.clone(),
            post_filters: self.post_filters.clone(),
            n_seed_docs: self.n_seed_docs.or(config.n_seed_docs),
            pagination,
            params,
            stop_words: Some(self.stop_words(config)),
        }
    }
}
