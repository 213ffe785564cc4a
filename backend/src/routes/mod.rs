//! Route definitions for Kua AgroApp

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Auth routes
        .nest("/auth", auth_routes(state.clone()))
        // Protected routes - ledger documents
        .nest("/documents", document_routes(state))
}

/// Authentication routes; only session creation is public
fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::login))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
        .route("/anonymous", post(handlers::issue_anonymous))
}

/// Ledger document routes (protected)
fn document_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/:identity",
            get(handlers::get_document).put(handlers::put_document),
        )
        .route("/:identity/stream", get(handlers::stream_document))
        .route("/:identity/export", get(handlers::export_document))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
