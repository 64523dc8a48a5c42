use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::guard::{BearerGuard, RateLimiter, enforce_rate_limit, require_bearer};
use crate::handlers::{health_handler, ingest_handler, list_handler, query_handler};
use crate::server::AppState;

/// `/health` stays open; the context routes sit behind auth, the rate
/// limiter and the body size cap.
pub(crate) fn build_router(
    state: AppState,
    auth_token: Option<String>,
    rate_limit: u32,
    max_body_size: usize,
) -> Router {
    let context_routes = Router::new()
        .route("/ingest-context", post(ingest_handler))
        .route("/query-context", post(query_handler))
        .route("/debug/list-context", get(list_handler))
        .route_layer(from_fn_with_state(
            RateLimiter::new(rate_limit),
            enforce_rate_limit,
        ))
        .route_layer(from_fn_with_state(
            BearerGuard::new(auth_token.as_deref()),
            require_bearer,
        ))
        .layer(DefaultBodyLimit::max(max_body_size));

    Router::new()
        .route("/health", get(health_handler))
        .merge(context_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, OnceLock};
    use std::time::Instant;

    use axum::body::Body;
    use axum::http::Request;
    use axum::response::Response;
    use codectx_embed::AnyEmbedder;
    use codectx_embed::mock::MockEmbedder;
    use codectx_index::{AppContext, IndexerConfig};
    use codectx_store::{InMemoryIndex, VectorIndex};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::server::ContextSlot;

    const DIMS: usize = 16;

    struct Fixture {
        embedder: MockEmbedder,
        index: Arc<InMemoryIndex>,
        slot: ContextSlot,
    }

    fn initialized() -> Fixture {
        let embedder = MockEmbedder::with_dimensions(DIMS);
        let index = Arc::new(InMemoryIndex::new(DIMS));
        let ctx = AppContext::new(
            Arc::new(AnyEmbedder::Mock(embedder.clone())),
            Arc::clone(&index) as Arc<dyn VectorIndex>,
            IndexerConfig::default(),
            10,
        );
        let slot: ContextSlot = Arc::new(OnceLock::new());
        assert!(slot.set(Arc::new(ctx)).is_ok());
        Fixture {
            embedder,
            index,
            slot,
        }
    }

    fn router(slot: ContextSlot, auth: Option<String>, rate_limit: u32) -> Router {
        let state = AppState {
            context: slot,
            started_at: Instant::now(),
        };
        build_router(state, auth, rate_limit, 1_048_576)
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_initialization() {
        let app = router(ContextSlot::default(), None, 0);
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);
        let json = json_body(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["initialized"], false);

        let fx = initialized();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let json = json_body(router(fx.slot, None, 0).oneshot(req).await.unwrap()).await;
        assert_eq!(json["initialized"], true);
    }

    #[tokio::test]
    async fn ingest_then_query() {
        let fx = initialized();
        let app = router(Arc::clone(&fx.slot), None, 0);

        let resp = app
            .clone()
            .oneshot(post_json(
                "/ingest-context",
                &serde_json::json!({
                    "filePath": "/p/a.js",
                    "code": "function greet(name) { return format(name); }"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let json = json_body(resp).await;
        assert_eq!(json["message"], "Context ingested successfully");
        let count = json["count"].as_u64().unwrap();
        assert!(count >= 2);
        assert_eq!(fx.index.len().unwrap(), usize::try_from(count).unwrap());

        let resp = app
            .oneshot(post_json(
                "/query-context",
                &serde_json::json!({"query": "greet format", "currentFilePath": "/p/a.js"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let json = json_body(resp).await;
        let results = json["results"].as_array().unwrap();
        assert!(!results.is_empty());
        let first = &results[0];
        assert_eq!(first["path"], "/p/a.js");
        for key in ["text", "start_line", "end_line", "type", "score"] {
            assert!(first.get(key).is_some(), "missing {key}");
        }
    }

    #[tokio::test]
    async fn ingest_missing_fields_is_rejected_without_mutation() {
        let fx = initialized();
        let app = router(Arc::clone(&fx.slot), None, 0);

        for body in [
            serde_json::json!({}),
            serde_json::json!({"filePath": "/p/a.js"}),
            serde_json::json!({"code": "const a = 1;"}),
            serde_json::json!({"filePath": "", "code": "x"}),
        ] {
            let resp = app
                .clone()
                .oneshot(post_json("/ingest-context", &body))
                .await
                .unwrap();
            assert_eq!(resp.status(), 400);
            let json = json_body(resp).await;
            assert!(json["error"].is_string());
        }
        assert!(fx.index.is_empty().unwrap());
        assert_eq!(fx.embedder.calls(), 0);
    }

    #[tokio::test]
    async fn query_missing_text_is_rejected() {
        let fx = initialized();
        let resp = router(fx.slot, None, 0)
            .oneshot(post_json("/query-context", &serde_json::json!({"currentFilePath": "a"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(json_body(resp).await["error"], "query is required");
    }

    #[tokio::test]
    async fn malformed_json_gets_json_error() {
        let fx = initialized();
        let req = Request::builder()
            .method("POST")
            .uri("/ingest-context")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = router(fx.slot, None, 0).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 400);
        let json = json_body(resp).await;
        assert_eq!(json["error"], "invalid request body");
        assert!(json["details"].is_string());
    }

    #[tokio::test]
    async fn uninitialized_context_is_server_error() {
        let app = router(ContextSlot::default(), None, 0);

        let req = Request::builder()
            .uri("/debug/list-context")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 500);
        assert_eq!(json_body(resp).await["error"], "context store not initialized");

        let resp = app
            .oneshot(post_json("/query-context", &serde_json::json!({"query": "x"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
    }

    #[tokio::test]
    async fn debug_list_returns_records() {
        let fx = initialized();
        let app = router(Arc::clone(&fx.slot), None, 0);
        app.clone()
            .oneshot(post_json(
                "/ingest-context",
                &serde_json::json!({"filePath": "/p/b.ts", "code": "type Id = string;"}),
            ))
            .await
            .unwrap();

        let req = Request::builder()
            .uri("/debug/list-context")
            .body(Body::empty())
            .unwrap();
        let json = json_body(app.oneshot(req).await.unwrap()).await;
        let records = json["records"].as_array().unwrap();
        assert_eq!(json["count"].as_u64(), Some(records.len() as u64));
        assert!(records.iter().all(|r| r["path"] == "/p/b.ts"));
        assert!(records.iter().all(|r| r["file_hash"].is_string()));
        assert!(records.iter().any(|r| r["type"] == "type_alias"));
    }

    #[tokio::test]
    async fn embedding_failure_is_internal_error_with_details() {
        let embedder = MockEmbedder::with_dimensions(DIMS).failing_on("EXPLODE");
        let ctx = AppContext::new(
            Arc::new(AnyEmbedder::Mock(embedder)),
            Arc::new(InMemoryIndex::new(DIMS)),
            IndexerConfig::default(),
            10,
        );
        let slot: ContextSlot = Arc::new(OnceLock::new());
        assert!(slot.set(Arc::new(ctx)).is_ok());

        let resp = router(slot, None, 0)
            .oneshot(post_json(
                "/ingest-context",
                &serde_json::json!({"filePath": "/p/c.js", "code": "const EXPLODE = 1;"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        let json = json_body(resp).await;
        assert_eq!(json["error"], "Failed to ingest context");
        assert!(json["details"].as_str().unwrap().contains("mock embedding failure"));
    }

    #[tokio::test]
    async fn query_without_token_is_unauthorized() {
        let fx = initialized();
        let resp = router(fx.slot, Some("secret".into()), 0)
            .oneshot(post_json("/query-context", &serde_json::json!({"query": "x"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
        assert_eq!(
            json_body(resp).await["error"],
            "missing or invalid bearer token"
        );
    }

    #[tokio::test]
    async fn query_with_configured_token_passes() {
        let fx = initialized();
        let mut req = post_json("/query-context", &serde_json::json!({"query": "x"}));
        req.headers_mut()
            .insert("authorization", "Bearer secret".parse().unwrap());
        let resp = router(fx.slot, Some("secret".into()), 0)
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn query_with_other_token_is_unauthorized() {
        let fx = initialized();
        let mut req = post_json("/query-context", &serde_json::json!({"query": "x"}));
        req.headers_mut()
            .insert("authorization", "Bearer wrong".parse().unwrap());
        let resp = router(fx.slot, Some("secret".into()), 0)
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn health_is_reachable_without_token() {
        let app = router(ContextSlot::default(), Some("secret".into()), 0);
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), 200);
    }

    #[tokio::test]
    async fn third_query_in_window_is_throttled() {
        use tower::Service;

        let fx = initialized();
        let mut app = router(fx.slot, None, 2);
        let make_req = || post_json("/query-context", &serde_json::json!({"query": "x"}));

        let mut statuses = Vec::new();
        for _ in 0..2 {
            statuses.push(app.call(make_req()).await.unwrap().status().as_u16());
        }
        let throttled = app.call(make_req()).await.unwrap();
        statuses.push(throttled.status().as_u16());
        assert_eq!(statuses, [200, 200, 429]);
        assert_eq!(json_body(throttled).await["error"], "too many requests");
    }

    #[tokio::test]
    async fn oversized_ingest_is_rejected_before_indexing() {
        let fx = initialized();
        let state = AppState {
            context: fx.slot,
            started_at: Instant::now(),
        };
        let app = build_router(state, None, 0, 64);
        let oversized = serde_json::json!({"filePath": "/p/a.js", "code": "x".repeat(128)});
        let resp = app
            .oneshot(post_json("/ingest-context", &oversized))
            .await
            .unwrap();
        assert_eq!(resp.status(), 413);
        let json = json_body(resp).await;
        assert_eq!(json["error"], "request body too large");
        assert!(json["details"].is_string());
        assert!(fx.index.is_empty().unwrap());
    }
}
