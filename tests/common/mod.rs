//! Shared helpers for HTTP boundary tests

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use brpay_gateway::api::{self, AppState};
use brpay_gateway::config::Config;
use serde_json::Value;
use std::collections::HashMap;
use tower::ServiceExt;

/// Configuration with every gateway simulated and no artificial latency
pub fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("SIMULATED_LATENCY_MS".to_string(), "0".to_string());
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).expect("valid test config")
}

pub fn test_app(extra: &[(&str, &str)]) -> (Router, AppState) {
    let state = AppState::from_config(test_config(extra)).expect("state builds");
    (api::router(state.clone()), state)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, ResponseMeta, Value) {
    let response = app.clone().oneshot(request).await.expect("router responds");
    let status = response.status();
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, ResponseMeta { request_id }, body)
}

pub struct ResponseMeta {
    pub request_id: Option<String>,
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

pub fn post_raw(uri: &str, body: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).expect("request builds")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}
