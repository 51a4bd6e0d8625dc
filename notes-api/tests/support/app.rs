//! In-process application builder for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use notes_api::{create_api_router, ApiConfig, AppState, AuthConfig, StorageBackend};
use notes_storage::{InMemoryStorage, KvStore, MemoryKv};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Memory-backed config with rate limiting off unless a test opts in.
pub fn test_config() -> ApiConfig {
    ApiConfig {
        environment: "test".to_string(),
        storage_backend: StorageBackend::Memory,
        rate_limit_enabled: false,
        ..ApiConfig::default()
    }
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig::with_secret(TEST_JWT_SECRET).expect("test secret is non-empty")
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_kv(config, Arc::new(MemoryKv::new()))
    }

    pub fn with_kv(config: ApiConfig, kv: Arc<dyn KvStore>) -> Self {
        let state = AppState::new(
            Arc::new(InMemoryStorage::new()),
            kv,
            test_auth_config(),
            config,
        );
        let router = create_api_router(state.clone()).expect("router builds");
        Self { state, router }
    }

    /// Send one request through the full middleware stack.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn register(&self, username: &str, password: &str) -> TestResponse {
        self.send(json_request(
            Method::POST,
            "/users/register",
            None,
            Some(serde_json::json!({ "username": username, "password": password })),
        ))
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.send(json_request(
            Method::POST,
            "/users/login",
            None,
            Some(serde_json::json!({ "username": username, "password": password })),
        ))
        .await
    }

    /// Register then log in, returning the access token.
    pub async fn token_for(&self, username: &str) -> String {
        let password = "correct-horse-battery";
        let registered = self.register(username, password).await;
        assert_eq!(registered.status, StatusCode::CREATED, "{:?}", registered.body);
        let login = self.login(username, password).await;
        assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);
        login.body["access_token"]
            .as_str()
            .expect("token in login response")
            .to_string()
    }

    pub async fn create_note(&self, token: &str, title: &str, content: &str) -> TestResponse {
        self.send(json_request(
            Method::POST,
            "/notes",
            Some(token),
            Some(serde_json::json!({ "title": title, "content": content })),
        ))
        .await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(json_request(Method::GET, uri, token, None)).await
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// `Null` when the body is not JSON.
    pub body: Value,
    pub text: String,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid request")
}
