//! End-to-end tests for the REST surface.
//!
//! Each test builds the full router over in-memory storage and drives it
//! with `tower::ServiceExt::oneshot`, so middleware ordering, extractors
//! and error mapping are exercised exactly as in production.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, StatusCode};
use notes_api::password::hash_password;
use notes_api::{generate_jwt_token, ApiConfig};
use notes_core::{NewUser, Role};
use notes_test_utils::{arb_new_note, arb_username, seed_notes, seed_user, FailingKv};
use proptest::prelude::*;
use serde_json::json;

#[path = "support/app.rs"]
mod test_app_support;
use test_app_support::{json_request, test_config, TestApp};

// ============================================================================
// USERS
// ============================================================================

#[tokio::test]
async fn test_register_returns_public_user() {
    let app = TestApp::new(test_config());

    let response = app.register("alice", "password123").await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["username"], "alice");
    assert_eq!(response.body["role"], "user");
    assert!(response.body["id"].is_i64());
    assert!(response.body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_username_is_rejected() {
    let app = TestApp::new(test_config());
    app.register("alice", "password123").await;

    let response = app.register("alice", "another-password").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Username already registered");
}

#[tokio::test]
async fn test_register_validates_lengths() {
    let app = TestApp::new(test_config());

    let short_name = app.register("al", "password123").await;
    assert_eq!(short_name.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(short_name.body["details"]["field"], "username");

    let short_password = app.register("alice", "short").await;
    assert_eq!(short_password.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(short_password.body["details"]["field"], "password");
}

#[tokio::test]
async fn test_login_issues_bearer_token() {
    let app = TestApp::new(test_config());
    app.register("alice", "password123").await;

    let response = app.login("alice", "password123").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["token_type"], "bearer");
    assert!(response.body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn test_login_failures_share_one_message() {
    let app = TestApp::new(test_config());
    app.register("alice", "password123").await;

    let wrong_password = app.login("alice", "password124").await;
    let unknown_user = app.login("bob", "password123").await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body["message"], "Incorrect username or password");
    assert_eq!(wrong_password.body, unknown_user.body);
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = TestApp::new(test_config());

    let missing = app.get("/users/me", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.header("www-authenticate"), Some("Bearer"));

    let garbage = app.get("/users/me", Some("not-a-jwt")).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_caller() {
    let app = TestApp::new(test_config());
    let token = app.token_for("alice").await;

    let response = app.get("/users/me", Some(&token)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["username"], "alice");
}

#[tokio::test]
async fn test_admin_route_requires_admin_role() {
    let app = TestApp::new(test_config());
    let token = app.token_for("alice").await;

    let response = app.get("/users/admin", Some(&token)).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_route_welcomes_admin() {
    let app = TestApp::new(test_config());
    let password_hash = hash_password("admin-password").expect("hash");
    app.state
        .storage
        .user_insert(&NewUser {
            username: "root".to_string(),
            password_hash,
            role: Role::Admin,
        })
        .await
        .expect("insert admin");
    let login = app.login("root", "admin-password").await;
    let token = login.body["access_token"].as_str().expect("token");

    let response = app.get("/users/admin", Some(token)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["username"], "root");
    assert_eq!(response.body["role"], "admin");
    assert!(response.body["id"].is_i64());
}

// ============================================================================
// NOTES
// ============================================================================

#[tokio::test]
async fn test_note_crud_cycle() {
    let app = TestApp::new(test_config());
    let token = app.token_for("alice").await;

    let created = app.create_note(&token, "Groceries", "milk, eggs").await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["id"].as_i64().expect("note id");
    assert_eq!(created.body["title"], "Groceries");

    let fetched = app.get(&format!("/notes/{}", id), Some(&token)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, created.body);

    let updated = app
        .send(json_request(
            Method::PUT,
            &format!("/notes/{}", id),
            Some(&token),
            Some(json!({ "content": "milk, eggs, bread" })),
        ))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["title"], "Groceries");
    assert_eq!(updated.body["content"], "milk, eggs, bread");

    let deleted = app
        .send(json_request(Method::DELETE, &format!("/notes/{}", id), Some(&token), None))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body, json!({ "detail": "Note deleted" }));

    let gone = app.get(&format!("/notes/{}", id), Some(&token)).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notes_require_token() {
    let app = TestApp::new(test_config());

    let response = app.get("/notes", None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_note_validates_bounds() {
    let app = TestApp::new(test_config());
    let token = app.token_for("alice").await;

    let empty_title = app.create_note(&token, "", "content").await;
    assert_eq!(empty_title.status, StatusCode::UNPROCESSABLE_ENTITY);

    let long_content = app.create_note(&token, "title", &"x".repeat(1001)).await;
    assert_eq!(long_content.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_other_users_notes_look_missing() {
    let app = TestApp::new(test_config());
    let alice = app.token_for("alice").await;
    let bob = app.token_for("bob").await;
    let created = app.create_note(&alice, "Private", "alice only").await;
    let uri = format!("/notes/{}", created.body["id"]);

    let read = app.get(&uri, Some(&bob)).await;
    assert_eq!(read.status, StatusCode::NOT_FOUND);
    assert_eq!(read.body["message"], "Note not found or access denied");

    let update = app
        .send(json_request(Method::PUT, &uri, Some(&bob), Some(json!({ "title": "Mine" }))))
        .await;
    assert_eq!(update.status, StatusCode::NOT_FOUND);

    let delete = app.send(json_request(Method::DELETE, &uri, Some(&bob), None)).await;
    assert_eq!(delete.status, StatusCode::NOT_FOUND);

    let bobs_list = app.get("/notes", Some(&bob)).await;
    assert_eq!(bobs_list.body, json!([]));

    let still_there = app.get(&uri, Some(&alice)).await;
    assert_eq!(still_there.body["title"], "Private");
}

#[tokio::test]
async fn test_list_pagination_and_search() {
    let app = TestApp::new(test_config());
    let alice = seed_user(app.state.storage.as_ref(), "alice", Role::User)
        .await
        .expect("seed user");
    seed_notes(app.state.storage.as_ref(), alice.id, 5)
        .await
        .expect("seed notes");
    let token = generate_jwt_token(&app.state.auth, "alice").expect("token");
    app.create_note(&token, "Shopping", "Buy COFFEE beans").await;

    let page = app.get("/notes?skip=1&limit=2", Some(&token)).await;
    assert_eq!(page.status, StatusCode::OK);
    let titles: Vec<&str> = page
        .body
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|n| n["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["note 1", "note 2"]);

    let default_page = app.get("/notes", Some(&token)).await;
    assert_eq!(default_page.body.as_array().map(Vec::len), Some(6));

    let search = app.get("/notes?search=coffee", Some(&token)).await;
    assert_eq!(search.body.as_array().map(Vec::len), Some(1));
    assert_eq!(search.body[0]["title"], "Shopping");
}

#[tokio::test]
async fn test_list_rejects_out_of_range_paging() {
    let app = TestApp::new(test_config());
    let token = app.token_for("alice").await;

    for uri in ["/notes?limit=0", "/notes?limit=101", "/notes?skip=-1"] {
        let response = app.get(uri, Some(&token)).await;
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
    }
}

#[tokio::test]
async fn test_malformed_input_is_json_422() {
    let app = TestApp::new(test_config());
    let token = app.token_for("alice").await;

    let bad_query = app.get("/notes?limit=abc", Some(&token)).await;
    let bad_path = app.get("/notes/abc", Some(&token)).await;
    let missing_field = app
        .send(json_request(
            Method::POST,
            "/notes",
            Some(&token),
            Some(json!({ "title": "t" })),
        ))
        .await;
    let not_json = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/users/register")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .expect("valid request"),
        )
        .await;

    for (name, response) in [
        ("query", &bad_query),
        ("path", &bad_path),
        ("body", &missing_field),
        ("body", &not_json),
    ] {
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY, "{}", name);
        assert_eq!(response.body["code"], "VALIDATION_FAILED", "{}", name);
        assert_eq!(response.body["details"]["source"], name);
        assert!(response.body["message"].is_string());
    }
}

#[tokio::test]
async fn test_writes_invalidate_cached_reads() {
    let app = TestApp::new(test_config());
    let token = app.token_for("alice").await;

    let first = app.create_note(&token, "One", "first").await;
    let id = first.body["id"].as_i64().expect("id");
    let uri = format!("/notes/{}", id);

    // Populate both cached reads.
    assert_eq!(app.get("/notes", Some(&token)).await.body.as_array().map(Vec::len), Some(1));
    assert_eq!(app.get(&uri, Some(&token)).await.body["content"], "first");

    app.create_note(&token, "Two", "second").await;
    assert_eq!(app.get("/notes", Some(&token)).await.body.as_array().map(Vec::len), Some(2));

    app.send(json_request(Method::PUT, &uri, Some(&token), Some(json!({ "content": "edited" }))))
        .await;
    assert_eq!(app.get(&uri, Some(&token)).await.body["content"], "edited");

    app.send(json_request(Method::DELETE, &uri, Some(&token), None)).await;
    assert_eq!(app.get(&uri, Some(&token)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/notes", Some(&token)).await.body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_notes_work_without_kv_store() {
    let app = TestApp::with_kv(test_config(), Arc::new(FailingKv));
    let token = app.token_for("alice").await;

    let created = app.create_note(&token, "Resilient", "no cache").await;
    assert_eq!(created.status, StatusCode::CREATED);

    let listed = app.get("/notes", Some(&token)).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body[0]["title"], "Resilient");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_created_note_reads_back_for_owner_only(username in arb_username(), note in arb_new_note()) {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))?;
        runtime.block_on(async {
            let app = TestApp::new(test_config());
            let storage = app.state.storage.as_ref();
            seed_user(storage, &username, Role::User)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            seed_user(storage, "Outsider", Role::User)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let owner = generate_jwt_token(&app.state.auth, &username)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let outsider = generate_jwt_token(&app.state.auth, "Outsider")
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            let created = app.create_note(&owner, &note.title, &note.content).await;
            prop_assert_eq!(created.status, StatusCode::CREATED);
            let uri = format!("/notes/{}", created.body["id"]);

            let fetched = app.get(&uri, Some(&owner)).await;
            prop_assert_eq!(&fetched.body["title"], &json!(note.title));
            prop_assert_eq!(&fetched.body["content"], &json!(note.content));
            prop_assert_eq!(app.get(&uri, Some(&outsider)).await.status, StatusCode::NOT_FOUND);
            Ok(())
        })?;
    }
}

// ============================================================================
// RATE LIMITING
// ============================================================================

fn limited_config(requests: u64) -> ApiConfig {
    ApiConfig {
        rate_limit_enabled: true,
        rate_limit_requests: requests,
        rate_limit_window: Duration::from_secs(60),
        ..test_config()
    }
}

#[tokio::test]
async fn test_rate_limit_rejects_after_threshold() {
    let app = TestApp::new(limited_config(3));

    for remaining in ["2", "1", "0"] {
        let response = app.get("/health", None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header("x-ratelimit-limit"), Some("3"));
        assert_eq!(response.header("x-ratelimit-remaining"), Some(remaining));
    }

    let limited = app.get("/health", None).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["code"], "RATE_LIMITED");
    assert_eq!(limited.header("retry-after"), Some("60"));
}

fn health_from(peer: [u8; 4], forwarded_for: Option<&str>) -> Request<Body> {
    let mut request = json_request(Method::GET, "/health", None, None);
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
    if let Some(ip) = forwarded_for {
        request
            .headers_mut()
            .insert("x-forwarded-for", ip.parse().expect("header value"));
    }
    request
}

#[tokio::test]
async fn test_rate_limit_ignores_client_forwarded_headers() {
    let app = TestApp::new(limited_config(1));

    assert_eq!(
        app.send(health_from([198, 51, 100, 7], Some("10.0.0.0"))).await.status,
        StatusCode::OK
    );
    for i in 1..50 {
        let spoofed = format!("10.0.0.{}", i);
        let response = app.send(health_from([198, 51, 100, 7], Some(&spoofed))).await;
        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS, "{}", spoofed);
    }

    // Another peer has its own bucket.
    assert_eq!(
        app.send(health_from([198, 51, 100, 8], None)).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_rate_limit_buckets_by_forwarded_ip_behind_trusted_proxy() {
    let app = TestApp::new(ApiConfig {
        trust_proxy_headers: true,
        ..limited_config(1)
    });
    let proxy = [10, 1, 1, 1];

    assert_eq!(app.send(health_from(proxy, Some("10.0.0.1"))).await.status, StatusCode::OK);
    assert_eq!(
        app.send(health_from(proxy, Some("10.0.0.1"))).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        app.send(health_from(proxy, Some("10.0.0.2, 10.0.0.1"))).await.status,
        StatusCode::OK
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_window_resets() {
    let app = TestApp::new(limited_config(1));

    assert_eq!(app.get("/health", None).await.status, StatusCode::OK);
    assert_eq!(app.get("/health", None).await.status, StatusCode::TOO_MANY_REQUESTS);

    tokio::time::advance(Duration::from_secs(61)).await;

    assert_eq!(app.get("/health", None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_fails_open_without_kv_store() {
    let app = TestApp::with_kv(limited_config(1), Arc::new(FailingKv));

    for _ in 0..3 {
        let response = app.get("/health", None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.header("x-ratelimit-remaining").is_none());
    }
}

// ============================================================================
// OPERATIONAL ENDPOINTS
// ============================================================================

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new(test_config());

    let health = app.get("/health", None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "ok");

    let ready = app.get("/health/ready", None).await;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.body["status"], "healthy");
}

#[tokio::test]
async fn test_readiness_degraded_without_kv_store() {
    let app = TestApp::with_kv(test_config(), Arc::new(FailingKv));

    let ready = app.get("/health/ready", None).await;

    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.body["status"], "degraded");
    assert_eq!(ready.body["kv"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_exposition() {
    let app = TestApp::new(test_config());
    app.get("/health", None).await;

    let metrics = app.get("/metrics", None).await;

    assert_eq!(metrics.status, StatusCode::OK);
    assert!(metrics
        .header("content-type")
        .is_some_and(|ct| ct.starts_with("text/plain")));
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let app = TestApp::new(test_config());

    let doc = app.get("/openapi.json", None).await;

    assert_eq!(doc.status, StatusCode::OK);
    assert!(doc.body["paths"]["/notes"].is_object());
    assert!(doc.body["paths"]["/users/login"].is_object());
}
