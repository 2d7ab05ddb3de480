use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Sign-up and sign-in are the entry points of
/// the auth flow.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Load balancer health check.
        .route("/health", get(|| async { "ok" }))
        .route("/auth/sign_up", post(handlers::sign_up))
        .route("/auth/sign_in", post(handlers::sign_in))
}
