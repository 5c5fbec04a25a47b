//! Keyword discovery
//!
//! For each field a sampled significance aggregation is run over the
//! documents matching the seed query. Scores for a term seen under several
//! fields are combined into a background-weighted quadrature mean
//!
//! ```text
//! score = sqrt( sum(score_i^2 * bg_i^2) / sum(bg_i^2) )
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::extract::{extract_keywords, SignificantBucket};
use super::params::StopWords;
use super::seed::SeedQuery;
use crate::core::transport::Transport;
use crate::error::{ProxyError, Result};

const SAMPLER_AGG: &str = "sample";
const KEYWORDS_AGG: &str = "keywords";

/// A ranked significant term
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyword {
    pub term: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct KeywordQuery<'a> {
    pub text: &'a str,
    pub fields: &'a [String],
    pub filters: &'a [Value],
    pub max_query_terms: usize,
    pub stop_words: &'a StopWords,
    /// Documents scanned per shard before scoring
    pub sample_size: u64,
}

impl KeywordQuery<'_> {
    fn aggregation(&self, field: &str) -> Value {
        json!({
            SAMPLER_AGG: {
                "sampler": {"shard_size": self.sample_size},
                "aggregations": {
                    KEYWORDS_AGG: {
                        "significant_text": {"field": field, "size": self.max_query_terms}
                    }
                }
            }
        })
    }

    fn seed_for(&self, field: &str) -> SeedQuery<'_> {
        SeedQuery {
            text: self.text,
            fields: self.fields,
            filters: self.filters,
            size: Some(0),
            aggregation: Some(self.aggregation(field)),
        }
    }
}

#[derive(Default)]
struct Accumulator {
    weighted: f64,
    weights: f64,
}

/// Merge per-field buckets into one score per term, rank and truncate.
///
/// Stop words are discarded. A term whose background counts are all zero has
/// no weight to average over and fails the merge.
pub fn merge_scores(
    per_field: &[Vec<SignificantBucket>],
    stop_words: &StopWords,
    max_query_terms: usize,
) -> Result<Vec<Keyword>> {
    let mut terms: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for bucket in per_field.iter().flatten() {
        if stop_words.contains(&bucket.key) {
            continue;
        }
        let bg2 = (bucket.bg_count as f64).powi(2);
        let acc = terms.entry(bucket.key.as_str()).or_default();
        acc.weighted += bucket.score.powi(2) * bg2;
        acc.weights += bg2;
    }

    let mut keywords = Vec::with_capacity(terms.len());
    for (term, acc) in terms {
        if acc.weights == 0.0 {
            return Err(ProxyError::DegenerateScore(term.to_string()));
        }
        keywords.push(Keyword {
            term: term.to_string(),
            score: (acc.weighted / acc.weights).sqrt(),
        });
    }

    keywords.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.term.cmp(&b.term))
    });
    keywords.truncate(max_query_terms);
    Ok(keywords)
}

/// Discover the most significant terms for a seed query at `url`
pub async fn discover_keywords<T: Transport>(
    transport: &T,
    url: &str,
    query: &KeywordQuery<'_>,
) -> Result<Vec<Keyword>> {
    let mut per_field = Vec::with_capacity(query.fields.len());
    for field in query.fields {
        let request = query.seed_for(field).request(url, &BTreeMap::new());
        let body = request.body.clone();
        let response = transport.post(request).await?;
        let buckets = extract_keywords(&body, &response.body, KEYWORDS_AGG)?;
        debug!(field = %field, buckets = buckets.len(), "significance aggregation done");
        per_field.push(buckets);
    }

    let keywords = merge_scores(&per_field, query.stop_words, query.max_query_terms)?;
    info!(fields = query.fields.len(), keywords = keywords.len(), "keyword discovery done");
    Ok(keywords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::testing::MockTransport;

    fn bucket(key: &str, score: f64, bg_count: u64) -> SignificantBucket {
        SignificantBucket {
            key: key.to_string(),
            score,
            bg_count,
            doc_count: 1,
        }
    }

    fn agg_response(buckets: Value) -> Value {
        json!({
            "hits": {"total": {"value": 250, "relation": "eq"}, "hits": []},
            "aggregations": {"sample": {"doc_count": 250, "keywords": {"buckets": buckets}}}
        })
    }

    #[test]
    fn test_merge_quadrature_mean() {
        let per_field = vec![
            vec![bucket("joel", 2.3, 100)],
            vec![bucket("joel", 1000.3, 1)],
            vec![bucket("joel", 1.3, 1000)],
        ];
        let keywords = merge_scores(&per_field, &StopWords::default(), 10).unwrap();
        assert_eq!(keywords.len(), 1);

        let expected = ((2.3f64.powi(2) * 100f64.powi(2) + 1000.3f64.powi(2) + 1.3f64.powi(2) * 1000f64.powi(2))
            / (100f64.powi(2) + 1.0 + 1000f64.powi(2)))
        .sqrt();
        assert!((keywords[0].score - expected).abs() < 1e-9);
        assert!((keywords[0].score - 1.648).abs() < 1e-3);
    }

    #[test]
    fn test_merge_ranks_filters_and_truncates() {
        let per_field = vec![
            vec![bucket("graphene", 5.0, 10), bucket("the", 100.0, 10), bucket("carbon", 2.0, 10)],
            vec![bucket("sheet", 3.0, 4), bucket("lattice", 4.0, 8)],
        ];
        let stop_words = StopWords::with_overlay(["lattice"]);
        let keywords = merge_scores(&per_field, &stop_words, 2).unwrap();
        let terms: Vec<&str> = keywords.iter().map(|k| k.term.as_str()).collect();
        assert_eq!(terms, vec!["graphene", "sheet"]);
    }

    #[test]
    fn test_merge_zero_background_is_degenerate() {
        let per_field = vec![vec![bucket("orphan", 1.0, 0)], vec![bucket("orphan", 2.0, 0)]];
        let err = merge_scores(&per_field, &StopWords::default(), 10).unwrap_err();
        assert!(matches!(err, ProxyError::DegenerateScore(ref t) if t == "orphan"));
    }

    #[tokio::test]
    async fn test_discover_keywords_one_request_per_field() {
        let transport = MockTransport::new(vec![
            agg_response(json!([
                {"key": "quantum", "score": 4.0, "bg_count": 10, "doc_count": 30},
                {"key": "and", "score": 9.0, "bg_count": 10, "doc_count": 30}
            ])),
            agg_response(json!([
                {"key": "quantum", "score": 2.0, "bg_count": 10, "doc_count": 12},
                {"key": "qubit", "score": 3.0, "bg_count": 5, "doc_count": 9}
            ])),
        ]);
        let fields = vec!["title".to_string(), "abstract".to_string()];
        let filters = vec![json!({"term": {"lang": "en"}})];
        let stop_words = StopWords::default();
        let query = KeywordQuery {
            text: "Quantum computing",
            fields: &fields,
            filters: &filters,
            max_query_terms: 10,
            stop_words: &stop_words,
            sample_size: 1000,
        };
        let keywords = discover_keywords(&transport, "http://es/arxiv/_search", &query)
            .await
            .unwrap();

        let terms: Vec<&str> = keywords.iter().map(|k| k.term.as_str()).collect();
        assert_eq!(terms, vec!["quantum", "qubit"]);
        assert!((keywords[0].score - 10f64.sqrt()).abs() < 1e-9);
        assert!((keywords[1].score - 3.0).abs() < 1e-9);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        let body = &requests[1].body;
        assert_eq!(body["size"], json!(0));
        assert!(body.get("_source").is_none());
        assert_eq!(body["query"]["bool"]["filter"], json!(filters));
        assert_eq!(body["query"]["bool"]["must"][0]["query_string"]["query"], "quantum computing");
        let agg = &body["aggregations"]["sample"];
        assert_eq!(agg["sampler"]["shard_size"], json!(1000));
        assert_eq!(agg["aggregations"]["keywords"]["significant_text"]["field"], "abstract");
    }

    #[tokio::test]
    async fn test_discover_keywords_stops_on_transport_failure() {
        use crate::core::transport::testing::decode_error;

        let transport = MockTransport::with_results(vec![Err(decode_error())]);
        let fields = vec!["title".to_string(), "abstract".to_string()];
        let stop_words = StopWords::default();
        let query = KeywordQuery {
            text: "quantum",
            fields: &fields,
            filters: &[],
            max_query_terms: 10,
            stop_words: &stop_words,
            sample_size: 1000,
        };
        let err = discover_keywords(&transport, "http://es/arxiv/_search", &query)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Decode(_)));
        assert_eq!(transport.requests().len(), 1);
    }
}
