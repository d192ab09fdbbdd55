#![allow(dead_code)]

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::{Executor, PgPool};
use tower::ServiceExt;

use cms_admin_bridge::database::DatabaseManager;
use cms_admin_bridge::storage::StorageClient;
use cms_admin_bridge::{app, AppContext};

const SCHEMA: &str = include_str!("../fixtures/schema.sql");

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Router over a pool that never connects; only for routes that fail or answer
/// before touching the database
pub fn offline_app() -> Router {
    let config = cms_admin_bridge::config::config();
    let pool = DatabaseManager::connect_lazy_url("postgres://bridge@127.0.0.1:1/offline", &config.database)
        .expect("static test url is valid");
    app(AppContext::new(pool, StorageClient::from_config()))
}

/// Router over the database named by `DATABASE_URL`, with the fixture schema
/// applied. `None` when no database is configured.
pub async fn database_app() -> Option<(Router, PgPool)> {
    let _ = dotenvy::dotenv();
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = cms_admin_bridge::config::config();
    let pool = DatabaseManager::connect_lazy_url(&url, &config.database).expect("DATABASE_URL is valid");
    pool.execute(SCHEMA).await.expect("fixture schema applies");
    let router = app(AppContext::new(pool.clone(), StorageClient::from_config()));
    Some((router, pool))
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).expect("request builds"))
        .await
        .expect("router is infallible");

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    TestResponse { status, headers, body }
}
