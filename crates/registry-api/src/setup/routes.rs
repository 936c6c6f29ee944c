//! Route configuration and setup

use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use registry_core::Config;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::api_doc::ApiDoc;
use crate::auth::auth_middleware;
use crate::handlers;
use crate::state::AppState;

/// Forms and batch bodies are small; this is generous.
const MAX_BODY_BYTES: usize = 1024 * 1024;
const HTTP_CONCURRENCY_LIMIT: usize = 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let protected = protected_routes().layer(axum::middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));

    let app = public_routes()
        .merge(protected)
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::liveness_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(<ApiDoc as utoipa::OpenApi>::openapi()) }),
        )
}

fn protected_routes() -> Router<Arc<AppState>> {
    use handlers::{admin, deletions, generic_files, intellectual_objects, work_items};

    Router::new()
        .route("/files/{id}/delete", post(generic_files::request_file_deletion))
        .route("/files/{id}/restore", post(generic_files::request_file_restoration))
        .route(
            "/objects/{id}/delete",
            post(intellectual_objects::request_object_deletion),
        )
        .route(
            "/objects/{id}/restore",
            post(intellectual_objects::request_object_restoration),
        )
        .route("/deletions/review/{id}", get(deletions::review))
        .route("/deletions/approve/{id}", post(deletions::approve))
        .route("/deletions/cancel/{id}", post(deletions::cancel))
        .route("/deletions/show/{id}", get(deletions::show))
        .route("/work_items/show/{id}", get(work_items::show))
        .route(
            "/work_items/requeue/{id}",
            get(work_items::requeue_options)
                .put(work_items::requeue)
                .post(work_items::requeue),
        )
        .route("/admin/deletions/batch", post(admin::batch_delete))
        .route(
            "/admin/files/{id}/prepare_delete",
            post(admin::prepare_file_delete),
        )
        .route(
            "/admin/objects/{id}/prepare_delete",
            post(admin::prepare_object_delete),
        )
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        if config.is_production() {
            tracing::warn!("CORS configured to allow all origins - not recommended for production");
        }
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
