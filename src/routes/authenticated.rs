use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Read routes for any signed-in user. The router is wrapped in `auth_middleware`, so
/// every handler here runs with a verified `AuthUser` in the request extensions.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /films_get_list?sort_by=
        .route("/films_get_list", get(handlers::get_films))
        // GET /films/search?actor=&movie=
        .route("/films/search", get(handlers::search_film))
}
