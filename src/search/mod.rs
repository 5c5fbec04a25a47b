//! Query expansion pipeline
//!
//! Seed retrieval, more-like-this expansion, keyword discovery and
//! scroll-based streaming on top of an Elasticsearch-compatible engine.

pub mod expand;
pub mod extract;
pub mod keywords;
pub mod orchestrator;
pub mod params;
pub mod seed;
pub mod stream;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A search hit. Identity is `(id, index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(flatten)]
    pub source: Map<String, Value>,
    #[serde(rename = "_score", skip_serializing_if = "Option::is_none", default)]
    pub score: Option<f64>,
}

impl Document {
    /// Reference used in a more-like-this "like" set
    pub fn like_ref(&self) -> Value {
        json!({"_id": self.id, "_index": self.index})
    }
}

/// What a page of results says about the rest of the result set.
///
/// `Count` is the (normalized) total number of matches. `Cursor` is the
/// engine's scroll id, only ever produced when continuation was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageToken {
    Count(u64),
    Cursor(String),
}

impl PageToken {
    pub fn count(&self) -> Option<u64> {
        match self {
            PageToken::Count(n) => Some(*n),
            PageToken::Cursor(_) => None,
        }
    }

    pub fn cursor(&self) -> Option<&str> {
        match self {
            PageToken::Cursor(c) => Some(c),
            PageToken::Count(_) => None,
        }
    }
}

/// One page of documents
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub token: PageToken,
    pub documents: Vec<Document>,
}

impl SearchPage {
    pub fn empty() -> Self {
        Self {
            token: PageToken::Count(0),
            documents: Vec::new(),
        }
    }
}

/// Offset XOR scroll continuation. Offset wins when it is inside the result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Scroll keep-alive window, e.g. `"1m"`
    pub scroll: Option<String>,
}
