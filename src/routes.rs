use std::time::Duration;

use axum::{
    extract::Extension,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::context::AppContext;
use crate::database::DatabaseManager;
use crate::handlers::content;
use crate::middleware::security_headers;

/// The full HTTP surface with its middleware stack
pub fn app(ctx: AppContext) -> Router {
    let config = crate::config::config();

    let router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Admin content-manager overrides
        .merge(content_routes())
        // Global middleware
        .layer(Extension(ctx))
        .layer(RequestBodyLimitLayer::new(config.api.max_upload_size_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.api.request_timeout_secs)))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http());

    security_headers(router, config)
}

fn content_routes() -> Router {
    Router::new()
        // Collection-level operations
        .route(
            "/content-manager/collection-types/:uid",
            get(content::find).post(content::create),
        )
        // Entry-level operations
        .route(
            "/content-manager/collection-types/:uid/:id",
            get(content::find_one).put(content::update).delete(content::delete),
        )
        .route(
            "/content-manager/collection-types/:uid/:id/actions/countDraftRelations",
            get(content::count_draft_relations),
        )
        // Relation pickers
        .route("/content-manager/relations/:uid/:field", get(content::relation_options))
        .route("/content-manager/relations/:uid/:id/:field", get(content::related))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.security.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::permissive().allow_origin(AllowOrigin::list(origins))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "CMS Admin Bridge",
            "version": version,
            "description": "Admin content-manager routes backed by PostgreSQL",
            "endpoints": {
                "home": "/",
                "health": "/health",
                "collections": "/content-manager/collection-types/:uid[/:id]",
                "relations": "/content-manager/relations/:uid[/:id]/:field",
            }
        }
    }))
}

async fn health(Extension(ctx): Extension<AppContext>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&ctx.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
