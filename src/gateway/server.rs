//! HTTP front of the gateway

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{Gateway, GatewayRequest};
use crate::core::transport::Transport;
use crate::error::ProxyError;

/// Error wrapper mapping proxy errors to HTTP responses
pub struct ApiError(ProxyError);

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ProxyError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ProxyError::Configuration(_) => StatusCode::FORBIDDEN,
            ProxyError::Transport(_) | ProxyError::Decode(_) | ProxyError::Engine { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::DegenerateScore(_) | ProxyError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(status = status.as_u16(), error = %self.0, "request failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Proxy a request through the gateway
async fn proxy<T: Transport + 'static>(
    State(gateway): State<Arc<Gateway<T>>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ProxyError::invalid_argument(format!("request body is not JSON: {}", e)))?
    };
    let headers: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();

    let resp = gateway.handle(GatewayRequest { path, headers, body }).await?;

    let status = StatusCode::from_u16(resp.status_code).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut out = (status, Json(resp.body)).into_response();
    for (name, value) in resp.headers {
        // CorsLayer owns the cross-origin headers
        if name.to_lowercase().starts_with("access-control-") {
            continue;
        }
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            out.headers_mut().insert(name, value);
        }
    }
    Ok(out)
}

/// Permissive CORS for browser front-ends, answering preflights for the
/// JSON content type and the endpoint header
fn cors_layer(endpoint_header: &str) -> CorsLayer {
    let mut headers = vec![header::CONTENT_TYPE, header::AUTHORIZATION];
    match HeaderName::from_bytes(endpoint_header.as_bytes()) {
        Ok(name) => headers.push(name),
        Err(e) => tracing::warn!(header = endpoint_header, error = %e, "endpoint header is not a valid header name"),
    }
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(headers)
}

pub fn create_router<T: Transport + 'static>(gateway: Gateway<T>) -> Router {
    let cors = gateway.config.cors.then(|| cors_layer(&gateway.config.endpoint_header));

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/{*proxy}", post(proxy::<T>));
    if let Some(cors) = cors {
        router = router.layer(cors);
    }
    router.layer(TraceLayer::new_for_http()).with_state(Arc::new(gateway))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GatewayConfig;
    use crate::core::transport::testing::{hits_response, MockTransport};
    use crate::search::params::ExpansionParams;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn config() -> GatewayConfig {
        GatewayConfig {
            allowed_endpoints: vec!["search.example.com".into()],
            ..Default::default()
        }
    }

    fn router_with(transport: MockTransport, config: GatewayConfig) -> Router {
        create_router(Gateway::new(transport, config, ExpansionParams::default(), vec![]))
    }

    fn router(responses: Vec<Value>) -> Router {
        router_with(MockTransport::new(responses), config())
    }

    fn allow_origin(resp: &Response) -> Option<&str> {
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok())
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let resp = router(vec![])
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn test_proxy_expands_search() {
        let app = router(vec![
            hits_response(json!(10), ["s1".to_string()], "arxiv"),
            hits_response(json!({"value": 3, "relation": "eq"}), ["e1".to_string()], "arxiv"),
        ]);
        let req = Request::post("/arxiv/_search")
            .header("origin", "https://app.example.com")
            .header("es-endpoint", "search.example.com")
            .header("content-type", "application/json")
            .body(Body::from(json!({"query": "graphene", "size": 5}).to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(allow_origin(&resp), Some("*"));
        assert_eq!(resp.headers().get_all("access-control-allow-origin").iter().count(), 1);
        let body = body_json(resp).await;
        assert_eq!(body["hits"]["total"], json!(3));
        assert_eq!(body["hits"]["hits"][0]["_id"], "e1");
    }

    #[tokio::test]
    async fn test_unregistered_endpoint_is_forbidden() {
        let req = Request::post("/arxiv/_search")
            .header("es-endpoint", "elsewhere.example.com")
            .body(Body::from(json!({"query": "graphene"}).to_string()))
            .unwrap();
        let resp = router(vec![]).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("has not been registered"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let req = Request::post("/arxiv/_search")
            .header("es-endpoint", "search.example.com")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = router(vec![]).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_preflight_is_answered() {
        let req = Request::options("/arxiv/_search")
            .header("origin", "https://app.example.com")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type,es-endpoint")
            .body(Body::empty())
            .unwrap();
        let resp = router(vec![]).oneshot(req).await.unwrap();
        assert!(resp.status().is_success());
        assert_eq!(allow_origin(&resp), Some("*"));

        let methods = resp.headers()["access-control-allow-methods"].to_str().unwrap().to_string();
        assert!(methods.contains("POST"));
        let allowed = resp.headers()["access-control-allow-headers"].to_str().unwrap().to_lowercase();
        assert!(allowed.contains("content-type"));
        assert!(allowed.contains("es-endpoint"));
    }

    #[tokio::test]
    async fn test_error_responses_carry_cors_headers() {
        let req = Request::post("/arxiv/_search")
            .header("origin", "https://app.example.com")
            .header("es-endpoint", "elsewhere.example.com")
            .body(Body::from(json!({"query": "graphene"}).to_string()))
            .unwrap();
        let resp = router(vec![]).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(allow_origin(&resp), Some("*"));
    }

    #[tokio::test]
    async fn test_cors_can_be_disabled() {
        let config = GatewayConfig {
            cors: false,
            ..config()
        };
        let req = Request::options("/arxiv/_search")
            .header("origin", "https://app.example.com")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let resp = router_with(MockTransport::new(vec![]), config).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(allow_origin(&resp), None);
    }

    #[tokio::test]
    async fn test_engine_transport_failure_is_bad_gateway() {
        use crate::core::transport::testing::decode_error;

        let transport = MockTransport::with_results(vec![Err(decode_error())]);
        let req = Request::post("/arxiv/_search")
            .header("es-endpoint", "search.example.com")
            .body(Body::from(json!({"query": "graphene"}).to_string()))
            .unwrap();
        let resp = router_with(transport, config()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(body_json(resp).await["error"].is_string());
    }
}
