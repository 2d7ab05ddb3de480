use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin Router Module
///
/// Every catalog mutation plus the full actor/film listing. The router is wrapped in
/// `admin_middleware`, which answers 401 without a valid token and 403 for any role
/// other than admin.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Actors ---
        .route("/actor_create", post(handlers::create_actor))
        .route("/actor_update", put(handlers::update_actor))
        .route("/actor_delete/{id}", delete(handlers::delete_actor))
        // --- Films ---
        // POST /film_create
        // Creates the film and its missing actors in a single transaction.
        .route("/film_create", post(handlers::create_film))
        .route("/film_update", put(handlers::update_film))
        .route("/film_delete/{id}", delete(handlers::delete_film))
        // --- Association ---
        .route("/get_list_actors_films", get(handlers::get_actors_with_films))
}
