//! Response normalization
//!
//! Turns raw engine responses into documents or significance buckets,
//! surfacing engine errors and absorbing the change of `hits.total` from an
//! integer to `{"value": n, "relation": "eq" | "gte"}`.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{Document, PageToken, SearchPage};
use crate::error::{ProxyError, Result};

/// One bucket of a `significant_text` / `significant_terms` aggregation
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignificantBucket {
    pub key: String,
    pub score: f64,
    #[serde(default)]
    pub bg_count: u64,
    #[serde(default)]
    pub doc_count: u64,
}

/// Total hit count from either representation. The `relation` of the
/// structured form is dropped.
pub fn normalize_total(total: &Value) -> Option<u64> {
    match total {
        Value::Number(n) => n.as_u64(),
        Value::Object(obj) => obj.get("value").and_then(Value::as_u64),
        _ => None,
    }
}

fn check_engine_error(request: &Value, response: &Value) -> Result<()> {
    match response.get("error") {
        Some(err) => {
            let message = err
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            Err(ProxyError::engine(message, request, response))
        }
        None => Ok(()),
    }
}

/// Extract the documents and the page token from a search or scroll response
pub fn extract_docs(
    request: &Value,
    response: &Value,
    continuation: bool,
    include_score: bool,
) -> Result<SearchPage> {
    check_engine_error(request, response)?;

    let hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| ProxyError::engine("response has no hits", request, response))?;

    let mut documents = Vec::with_capacity(hits.len());
    for hit in hits {
        let id = hit.get("_id").and_then(Value::as_str);
        let index = hit.get("_index").and_then(Value::as_str);
        let (Some(id), Some(index)) = (id, index) else {
            return Err(ProxyError::engine("hit without _id or _index", request, response));
        };
        let source = match hit.get("_source") {
            Some(Value::Object(source)) => source.clone(),
            _ => Map::new(),
        };
        let score = if include_score {
            hit.get("_score").and_then(Value::as_f64)
        } else {
            None
        };
        documents.push(Document {
            id: id.to_string(),
            index: index.to_string(),
            source,
            score,
        });
    }

    let scroll_id = response.get("_scroll_id").and_then(Value::as_str);
    let token = match scroll_id {
        Some(cursor) if continuation => PageToken::Cursor(cursor.to_string()),
        _ => {
            let total = response
                .pointer("/hits/total")
                .and_then(normalize_total)
                .ok_or_else(|| ProxyError::engine("response has no readable hits.total", request, response))?;
            PageToken::Count(total)
        }
    };

    Ok(SearchPage { token, documents })
}

/// Extract the buckets of the aggregation called `name`, wherever it is
/// nested under `aggregations`
pub fn extract_keywords(request: &Value, response: &Value, name: &str) -> Result<Vec<SignificantBucket>> {
    check_engine_error(request, response)?;

    let buckets = response
        .get("aggregations")
        .and_then(|aggs| find_aggregation(aggs, name))
        .and_then(|agg| agg.get("buckets"))
        .ok_or_else(|| {
            ProxyError::engine(format!("response has no '{}' aggregation", name), request, response)
        })?;

    serde_json::from_value(buckets.clone())
        .map_err(|e| ProxyError::engine(format!("unreadable buckets: {}", e), request, response))
}

fn find_aggregation<'a>(aggs: &'a Value, name: &str) -> Option<&'a Value> {
    let obj = aggs.as_object()?;
    if let Some(agg) = obj.get(name).filter(|agg| agg.get("buckets").is_some()) {
        return Some(agg);
    }
    obj.values()
        .filter(|v| v.is_object())
        .find_map(|v| find_aggregation(v, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> Value {
        json!({"query": {"match_all": {}}})
    }

    #[test]
    fn test_normalize_total() {
        assert_eq!(normalize_total(&json!(42)), Some(42));
        assert_eq!(normalize_total(&json!({"value": 42, "relation": "eq"})), Some(42));
        assert_eq!(normalize_total(&json!({"value": 10000, "relation": "gte"})), Some(10000));
        assert_eq!(normalize_total(&json!("42")), None);
    }

    #[test]
    fn test_extract_docs() {
        let hits: Vec<Value> = (0..100)
            .map(|i| json!({"_id": i.to_string(), "_index": "arxiv", "_score": 1.5, "_source": {"title": "t"}}))
            .collect();
        let response = json!({"hits": {"total": 10, "hits": hits}});

        let page = extract_docs(&request(), &response, false, false).unwrap();
        assert_eq!(page.token, PageToken::Count(10));
        assert_eq!(page.documents.len(), 100);
        assert_eq!(page.documents[3].id, "3");
        assert_eq!(page.documents[3].source.get("title"), Some(&json!("t")));
        assert_eq!(page.documents[3].score, None);

        let page = extract_docs(&request(), &response, false, true).unwrap();
        assert_eq!(page.documents[0].score, Some(1.5));
    }

    #[test]
    fn test_extract_docs_structured_total_and_missing_source() {
        let response = json!({"hits": {
            "total": {"value": 7, "relation": "gte"},
            "hits": [{"_id": "a", "_index": "nih", "_score": null}]
        }});
        let page = extract_docs(&request(), &response, false, true).unwrap();
        assert_eq!(page.token, PageToken::Count(7));
        assert!(page.documents[0].source.is_empty());
        assert_eq!(page.documents[0].score, None);
    }

    #[test]
    fn test_scroll_id_only_when_requested() {
        let response = json!({
            "_scroll_id": "DXF1ZXJ5",
            "hits": {"total": 3, "hits": []}
        });
        let page = extract_docs(&request(), &response, true, false).unwrap();
        assert_eq!(page.token, PageToken::Cursor("DXF1ZXJ5".into()));

        let page = extract_docs(&request(), &response, false, false).unwrap();
        assert_eq!(page.token, PageToken::Count(3));
    }

    #[test]
    fn test_engine_error_carries_payloads() {
        let response = json!({"error": {"type": "parsing_exception", "reason": "bad query"}, "status": 400});
        let err = extract_docs(&request(), &response, false, false).unwrap_err();
        match err {
            ProxyError::Engine { message, request, response } => {
                assert_eq!(message, "bad query");
                assert!(request.contains("match_all"));
                assert!(response.contains("parsing_exception"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_extract_keywords_nested() {
        let response = json!({
            "hits": {"total": 100, "hits": []},
            "aggregations": {"sample": {"doc_count": 100, "keywords": {
                "doc_count": 100,
                "bg_count": 5000,
                "buckets": [
                    {"key": "neural", "doc_count": 40, "score": 3.2, "bg_count": 120},
                    {"key": "network", "doc_count": 35, "score": 2.1, "bg_count": 300}
                ]
            }}}
        });
        let buckets = extract_keywords(&request(), &response, "keywords").unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].key, "neural");
        assert_eq!(buckets[0].bg_count, 120);
        assert_eq!(buckets[1].score, 2.1);
    }

    #[test]
    fn test_extract_keywords_missing_aggregation() {
        let response = json!({"hits": {"total": 0, "hits": []}});
        assert!(matches!(
            extract_keywords(&request(), &response, "keywords"),
            Err(ProxyError::Engine { .. })
        ));
    }
}
