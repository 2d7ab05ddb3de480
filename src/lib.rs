use axum::{
    Json, Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
    routing::get,
};
use utoipa::OpenApi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod aggregate;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod services;
pub mod validation;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use services::{AuthService, Services};

/// ApiDoc
///
/// The OpenAPI document for every handler annotated with `#[utoipa::path]`, served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::sign_up, handlers::sign_in,
        handlers::create_actor, handlers::update_actor, handlers::delete_actor,
        handlers::create_film, handlers::update_film, handlers::delete_film,
        handlers::get_films, handlers::search_film, handlers::get_actors_with_films
    ),
    components(
        schemas(
            models::Actor, models::Film, models::ActorWithFilms,
            models::SignUpRequest, models::SignInRequest, models::SignUpResponse,
            models::AuthResponse, models::UserResponse, models::MessageResponse,
        )
    ),
    tags(
        (name = "film-catalog", description = "Film Catalog API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single container shared by every request: the services (each holding the same
/// repository) and the immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the services over `repo` using the token and hashing settings of `config`.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            services: Services::new(repo, &config),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for AuthService {
    fn from_ref(app_state: &AppState) -> AuthService {
        app_state.services.auth.clone()
    }
}

/// create_router
///
/// Assembles the routing structure, applies the access layers per tier plus the global
/// observability layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(public::public_routes())
        // route_layer keeps 405 for a wrong method ahead of the token check.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::auth_middleware,
            )),
        )
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::admin_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the `http_request` span for `TraceLayer`, tagged with the generated
/// `x-request-id` so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
