//! HTTP 接口测试
//!
//! 通过 `tower::ServiceExt::oneshot` 直接驱动路由，不监听端口。

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use code_validation::test_utils::{TestApp, project, rule_with};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::net::SocketAddr;
use tower::ServiceExt;
use uuid::Uuid;

const LUHN_CODE: &str = "79927398713";

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_validate(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/validate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_validate_ok_then_conflict() {
    let app = TestApp::new();
    let p = app.seed(project(), vec![rule_with(|_| {})]);

    let request = json!({
        "code": LUHN_CODE,
        "project_id": p.id,
        "ow_user_id": "user-1",
        "country": "ES"
    });

    let (status, body) = send(&app, post_validate(request.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["code"], LUHN_CODE);
    assert_eq!(body["code_normalized"], LUHN_CODE);
    assert_eq!(body["project"]["id"], p.id.to_string());
    assert!(body["code_rule"]["name"].is_string());
    assert!(body["redeemed_at"].is_string());
    assert!(body.get("sandbox").is_none());
    let redemption_id = body["redemption_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, post_validate(request)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "KO");
    assert_eq!(body["error_code"], "ALREADY_REDEEMED");
    assert!(body["details"]["redeemed_at"].is_string());

    // 兑换记录可查
    let (status, body) = send(&app, get(&format!("/api/v1/codes/{}", redemption_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], redemption_id);
    assert_eq!(body["project"]["id"], p.id.to_string());
    assert_eq!(body["ow_user_id"], "user-1");
    assert_eq!(body["redemption_count"], 1);
    assert_eq!(body["code_hash"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_validate_error_status_mapping() {
    let app = TestApp::new();
    let p = app.seed(
        project(),
        vec![rule_with(|r| r.allowed_countries = vec!["ES".into()])],
    );

    let cases = [
        (json!({ "code": "79927398714", "project_id": p.id, "country": "ES" }), StatusCode::BAD_REQUEST, "INVALID_CHECK_DIGIT"),
        (json!({ "code": LUHN_CODE, "project_id": p.id, "country": "US" }), StatusCode::FORBIDDEN, "GEO_BLOCKED"),
        (json!({ "code": "ABC", "project_id": p.id }), StatusCode::NOT_FOUND, "NO_MATCHING_RULE"),
        (json!({ "code": LUHN_CODE, "project_id": Uuid::new_v4() }), StatusCode::NOT_FOUND, "NO_MATCHING_RULE"),
    ];

    for (request, expected_status, expected_code) in cases {
        let (status, body) = send(&app, post_validate(request)).await;
        assert_eq!(status, expected_status, "{}", expected_code);
        assert_eq!(body["status"], "KO");
        assert_eq!(body["error_code"], expected_code);
        assert!(body["error_message"].is_string());
    }
    assert_eq!(app.store.ledger_len(), 0);
}

#[tokio::test]
async fn test_validate_rejects_blank_code() {
    let app = TestApp::new();
    let (status, body) = send(
        &app,
        post_validate(json!({ "code": "   ", "project_id": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_sandbox_header() {
    let app = TestApp::new();
    let p = app.seed(project(), vec![rule_with(|_| {})]);

    for value in ["true", "1"] {
        let mut request = post_validate(json!({ "code": LUHN_CODE, "project_id": p.id }));
        request
            .headers_mut()
            .insert("x-sandbox", value.parse().unwrap());

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sandbox"], true);
        assert!(body["redemption_id"].as_str().unwrap().starts_with("sandbox-"));
    }
    assert_eq!(app.store.ledger_len(), 0);
}

#[tokio::test]
async fn test_client_ip_is_recorded() {
    let app = TestApp::new();
    let p = app.seed(project(), vec![rule_with(|_| {})]);

    let mut request = post_validate(json!({ "code": LUHN_CODE, "project_id": p.id }));
    request
        .headers_mut()
        .insert("x-forwarded-for", "198.51.100.4, 10.0.0.1".parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let entries = app.store.ledger_entries();
    assert_eq!(entries[0].ip_address.as_deref(), Some("198.51.100.4"));
}

#[tokio::test]
async fn test_client_ip_falls_back_to_peer_address() {
    let app = TestApp::new();
    let p = app.seed(project(), vec![rule_with(|_| {})]);

    // 请求体中的 ip_address 被忽略
    let mut request = post_validate(json!({
        "code": LUHN_CODE,
        "project_id": p.id,
        "ip_address": "1.2.3.4"
    }));
    let peer: SocketAddr = "192.0.2.10:54321".parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let entries = app.store.ledger_entries();
    assert_eq!(entries[0].ip_address.as_deref(), Some("192.0.2.10"));
}

#[tokio::test]
async fn test_check_endpoint_is_read_only() {
    let app = TestApp::new();
    let p = app.seed(project(), vec![rule_with(|_| {})]);
    let uri = format!("/api/v1/validate/check?code={}&project_id={}", LUHN_CODE, p.id);

    for _ in 0..2 {
        let (status, body) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert!(body.get("redeemed_at").is_none());
        assert!(body.get("redemption_id").is_none());
    }
    assert_eq!(app.store.ledger_len(), 0);

    let (status, body) = send(
        &app,
        get(&format!("/api/v1/validate/check?code=79927398714&project_id={}", p.id)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_CHECK_DIGIT");
}

#[tokio::test]
async fn test_get_unknown_redemption() {
    let app = TestApp::new();
    let (status, body) = send(&app, get(&format!("/api/v1/codes/{}", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({
            "status": "KO",
            "error_code": "NOT_FOUND",
            "error_message": "Redemption not found"
        })
    );
}

#[tokio::test]
async fn test_list_redemptions_paginates() {
    let app = TestApp::new();
    let p = app.seed(project(), vec![rule_with(|_| {})]);
    let other = app.seed(project(), vec![rule_with(|_| {})]);

    for code in ["79927398713", "12345678903", "98765432103"] {
        let (status, _) = send(&app, post_validate(json!({ "code": code, "project_id": p.id }))).await;
        assert_eq!(status, StatusCode::OK, "{}", code);
    }
    let (status, _) = send(
        &app,
        post_validate(json!({ "code": LUHN_CODE, "project_id": other.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        get(&format!("/api/v1/codes?project_id={}&page=1&limit=2", p.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(
        body["pagination"],
        json!({ "page": 1, "limit": 2, "total": 3, "totalPages": 2 })
    );
    let first = &body["data"][0];
    assert!(first["code_rule_id"].is_string());
    assert!(first["code_rule_name"].is_string());

    let (_, body) = send(&app, get("/api/v1/codes")).await;
    assert_eq!(body["pagination"]["total"], 4);
    assert_eq!(body["pagination"]["limit"], 50);

    let (status, body) = send(&app, get("/api/v1/codes?limit=500")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        get(&format!("/api/v1/codes?page={}&limit=100", i64::MAX)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_project_stats() {
    let app = TestApp::new();
    let p = app.seed(project(), vec![rule_with(|r| r.name = "Spring".into())]);

    for (code, user) in [
        ("79927398713", Some("user-1")),
        ("12345678903", Some("user-1")),
        ("98765432103", None),
    ] {
        let (status, _) = send(
            &app,
            post_validate(json!({ "code": code, "project_id": p.id, "ow_user_id": user })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", code);
    }

    let (status, body) = send(&app, get(&format!("/api/v1/stats/{}", p.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["project_id"], p.id.to_string());
    assert_eq!(body["total_redemptions"], 3);
    assert_eq!(body["unique_users"], 1);
    assert_eq!(body["by_rule"][0]["rule_name"], "Spring");
    assert_eq!(body["by_rule"][0]["count"], 3);
    let by_day = body["by_day"].as_array().unwrap();
    assert!(!by_day.is_empty());
    assert_eq!(by_day[0]["date"].as_str().unwrap().len(), "2024-01-01".len());

    let unknown = Uuid::new_v4();
    let (status, body) = send(&app, get(&format!("/api/v1/stats/{}", unknown))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "project_id": unknown,
            "total_redemptions": 0,
            "unique_users": 0,
            "by_rule": [],
            "by_day": []
        })
    );
}

#[tokio::test]
async fn test_cache_invalidation_routes() {
    let app = TestApp::new();
    let rule = rule_with(|_| {});
    let p = app.seed(project(), vec![rule.clone()]);
    let uri = format!("/api/v1/validate/check?code={}&project_id={}", LUHN_CODE, p.id);

    let (status, _) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);

    app.store.update_rule(rule.id, |r| r.is_active = false);
    let (status, _) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, delete(&format!("/api/v1/cache/projects/{}", p.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invalidated"], 1);

    let (status, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "NO_MATCHING_RULE");

    let (status, body) = send(&app, delete("/api/v1/cache/projects")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invalidated"], 1);
    assert!(app.cache.is_empty());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
}
