use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::TokenIssuer;
use crate::extractor::Extractor;
use crate::store::ResultStore;

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;

pub use error::ApiError;

/// Shared handles every request works with.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResultStore>,
    pub extractor: Arc<Extractor>,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ResultStore>,
        extractor: Arc<Extractor>,
        tokens: Arc<TokenIssuer>,
    ) -> Self {
        Self {
            store,
            extractor,
            tokens,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/api/results", get(handlers::list_results))
        .route("/api/extract", post(handlers::trigger_extraction))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::require_bearer,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/info", get(handlers::api_info))
        .route("/api/auth/token", post(handlers::issue_token))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
