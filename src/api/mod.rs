// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    api::health::{HealthChecks, HealthResponse, ReadyResponse},
    models::{ConfirmPublishRequest, PublishResponse, StartPublishRequest},
    publish::PublishStatus,
    state::AppState,
};

pub mod gateway;
pub mod health;
pub mod publish;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/publish", post(publish::start_publish))
        .route("/publish/{address}", get(publish::publish_status))
        .route("/publish/{address}/confirm", post(publish::confirm_publish))
        .with_state(state.clone());

    let gateway_routes = Router::new()
        .route("/ipfs/{address}", get(gateway::serve_block))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(gateway_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        publish::start_publish,
        publish::confirm_publish,
        publish::publish_status,
        gateway::serve_block,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            StartPublishRequest,
            ConfirmPublishRequest,
            PublishResponse,
            PublishStatus,
            ReadyResponse,
            HealthChecks,
            HealthResponse
        )
    ),
    tags(
        (name = "Publish", description = "Payment-gated publishing"),
        (name = "Gateway", description = "Finalized content by address"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Confirmation, RejectReason};
    use crate::storage::ContentStore;
    use crate::content::ContentAddress;
    use crate::test_support::{public_key, test_state, tx_ref, wallet_headers};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn signed_request(method: &str, uri: &str, seed: u8, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in wallet_headers(seed, method, uri) {
            builder = builder.header(name, value);
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _ctx) = test_state().await;
        let _ = router(state).into_make_service();
    }

    #[tokio::test]
    async fn liveness_is_ok_and_carries_request_id() {
        let (state, _ctx) = test_state().await;
        let app = router(state);

        let response = app
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn readiness_checks_directories() {
        let (state, _ctx) = test_state().await;
        let app = router(state);

        let (status, body) = send(&app, Request::get("/health/ready").body(Body::empty()).unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["data_dir"], "ok");
        assert_eq!(body["checks"]["repos_dir"], "ok");
    }

    #[tokio::test]
    async fn publish_requires_wallet_signature() {
        let (state, _ctx) = test_state().await;
        let app = router(state);

        let request = Request::post("/v1/publish")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "tree_ref": "hello-world" }).to_string()))
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "bad_credentials");
    }

    #[tokio::test]
    async fn publish_then_confirm_finalizes() {
        let (state, ctx) = test_state().await;
        let app = router(state);
        ctx.ledger.set_balance(&public_key(1), 20_000_000);

        let start = signed_request("POST", "/v1/publish", 1, Some(json!({ "tree_ref": "hello-world" })));
        let (status, body) = send(&app, start).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "awaiting_payment");
        let address = body["content_address"].as_str().unwrap().to_string();
        assert!(address.starts_with("Qm"));

        ctx.ledger.set_confirmation(&tx_ref(1), Confirmation::Confirmed);
        let confirm_uri = format!("/v1/publish/{address}/confirm");
        let confirm = signed_request("POST", &confirm_uri, 1, Some(json!({ "transaction_ref": tx_ref(1) })));
        let (status, body) = send(&app, confirm).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "finalized");
        assert_eq!(body["already_finalized"], false);
        let gateway_url = format!("/ipfs/{address}");
        assert_eq!(body["gateway_url"], gateway_url.as_str());

        let parsed = address.parse().unwrap();
        assert!(ctx.store.is_pinned(&parsed).await.unwrap());

        let response = app
            .clone()
            .oneshot(Request::get(&gateway_url).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "application/octet-stream"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(ContentAddress::for_bytes(&bytes), parsed);
    }

    #[tokio::test]
    async fn gateway_does_not_serve_unpaid_content() {
        let (state, ctx) = test_state().await;
        let app = router(state);
        ctx.ledger.set_balance(&public_key(1), 20_000_000);

        let start = signed_request("POST", "/v1/publish", 1, Some(json!({ "tree_ref": "hello-world" })));
        let (_, body) = send(&app, start).await;
        let address = body["content_address"].as_str().unwrap().to_string();

        let get = |uri: String| Request::get(uri).body(Body::empty()).unwrap();
        let (status, body) = send(&app, get(format!("/ipfs/{address}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "unknown_address");

        let (status, _) = send(&app, get("/ipfs/not-a-cid".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn replayed_request_is_rejected() {
        let (state, ctx) = test_state().await;
        let app = router(state);
        ctx.ledger.set_balance(&public_key(1), 20_000_000);

        let headers = wallet_headers(1, "POST", "/v1/publish");
        let build = || {
            let mut builder = Request::post("/v1/publish").header("content-type", "application/json");
            for (name, value) in &headers {
                builder = builder.header(*name, value);
            }
            builder
                .body(Body::from(json!({ "tree_ref": "hello-world" }).to_string()))
                .unwrap()
        };

        let (status, _) = send(&app, build()).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, build()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "bad_credentials");
    }

    #[tokio::test]
    async fn start_headers_cannot_confirm() {
        let (state, ctx) = test_state().await;
        let app = router(state);
        ctx.ledger.set_balance(&public_key(1), 20_000_000);

        let start = signed_request("POST", "/v1/publish", 1, Some(json!({ "tree_ref": "hello-world" })));
        let (_, body) = send(&app, start).await;
        let address = body["content_address"].as_str().unwrap().to_string();

        // Headers captured from a start request, replayed against confirm.
        ctx.ledger.set_confirmation(&tx_ref(9), Confirmation::Rejected(RejectReason::FailedOnChain));
        let mut builder = Request::post(format!("/v1/publish/{address}/confirm"))
            .header("content-type", "application/json");
        for (name, value) in wallet_headers(1, "POST", "/v1/publish") {
            builder = builder.header(name, value);
        }
        let confirm = builder
            .body(Body::from(json!({ "transaction_ref": tx_ref(9) }).to_string()))
            .unwrap();
        let (status, _) = send(&app, confirm).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(ctx.ledger.confirm_calls(), 0);
        assert!(ctx.store.contains(&address.parse().unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn underfunded_wallet_gets_payment_required() {
        let (state, ctx) = test_state().await;
        let app = router(state);
        ctx.ledger.set_balance(&public_key(1), 1_000_000);

        let start = signed_request("POST", "/v1/publish", 1, Some(json!({ "tree_ref": "hello-world" })));
        let (status, body) = send(&app, start).await;

        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["status"], "insufficient_funds");
        assert!(body.get("content_address").is_none());
        assert_eq!(ctx.store.total_puts(), 0);
    }

    #[tokio::test]
    async fn rejected_payment_is_reported_and_reclaimed() {
        let (state, ctx) = test_state().await;
        let app = router(state);
        ctx.ledger.set_balance(&public_key(1), 20_000_000);

        let start = signed_request("POST", "/v1/publish", 1, Some(json!({ "tree_ref": "hello-world" })));
        let (_, body) = send(&app, start).await;
        let address = body["content_address"].as_str().unwrap().to_string();

        ctx.ledger
            .set_confirmation(&tx_ref(7), Confirmation::Rejected(RejectReason::FailedOnChain));
        let confirm_uri = format!("/v1/publish/{address}/confirm");
        let confirm = signed_request("POST", &confirm_uri, 1, Some(json!({ "transaction_ref": tx_ref(7) })));
        let (status, body) = send(&app, confirm).await;

        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["status"], "rejected");
        assert_eq!(body["content_address"], address.as_str());
        assert!(!ctx.store.contains(&address.parse().unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_address_is_unknown() {
        let (state, _ctx) = test_state().await;
        let app = router(state);

        let request = signed_request("GET", "/v1/publish/not-a-cid", 1, None);
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "unknown_address");
    }

    #[tokio::test]
    async fn claimant_can_read_status() {
        let (state, ctx) = test_state().await;
        let app = router(state);
        ctx.ledger.set_balance(&public_key(1), 20_000_000);

        let start = signed_request("POST", "/v1/publish", 1, Some(json!({ "tree_ref": "hello-world" })));
        let (_, body) = send(&app, start).await;
        let address = body["content_address"].as_str().unwrap().to_string();

        let uri = format!("/v1/publish/{address}");
        let (status, body) = send(&app, signed_request("GET", &uri, 1, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "awaiting_payment");

        let (status, _) = send(&app, signed_request("GET", &uri, 2, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_tree_ref_is_bad_request() {
        let (state, ctx) = test_state().await;
        let app = router(state);
        ctx.ledger.set_balance(&public_key(1), 20_000_000);

        let start = signed_request("POST", "/v1/publish", 1, Some(json!({ "tree_ref": "  " })));
        let (status, body) = send(&app, start).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "invalid_request");
    }
}
