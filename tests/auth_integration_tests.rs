use axum::{
    Router,
    body::Body,
    extract::{FromRef, FromRequestParts},
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use chrono::Utc;
use film_catalog::{
    AppState, InMemoryRepository,
    auth::{AuthUser, Claims},
    config::AppConfig,
    create_router,
    error::ApiError,
    models::{AuthResponse, MessageResponse, Role, SignUpResponse},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn create_app_state() -> AppState {
    let config = AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };
    AppState::new(Arc::new(InMemoryRepository::new()), config)
}

fn create_token(role: Role, exp_offset: i64, secret: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        user_id: 1,
        username: "tester".to_string(),
        role,
        iat: now,
        exp: now + exp_offset,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(bearer: Option<&str>) -> Parts {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri(Uri::from_static("/films_get_list"));
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap().into_parts().0
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn sign_up(router: &Router, username: &str, role: i32) -> String {
    let (status, body) = send(
        router,
        json_request(
            Method::POST,
            "/auth/sign_up",
            None,
            json!({"username": username, "password": "p", "role": role}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let response: SignUpResponse = serde_json::from_value(body).unwrap();
    response.token
}

// --- Extractor Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let state = create_app_state();
    let token = create_token(Role::Admin, 3600, TEST_JWT_SECRET);
    let mut parts = get_request_parts(Some(&token));

    let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();

    assert_eq!(user.id, 1);
    assert_eq!(user.username, "tester");
    assert_eq!(user.role, Role::Admin);
}

#[tokio::test]
async fn test_auth_failure_missing_header() {
    let state = create_app_state();
    let mut parts = get_request_parts(None);

    let result = AuthUser::from_request_parts(&mut parts, &state).await;

    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn test_auth_failure_expired_token() {
    let state = create_app_state();
    let token = create_token(Role::User, -3600, TEST_JWT_SECRET);
    let mut parts = get_request_parts(Some(&token));

    let result = AuthUser::from_request_parts(&mut parts, &state).await;

    assert_eq!(result, Err(ApiError::Unauthorized("invalid token".to_string())));
}

#[tokio::test]
async fn test_auth_failure_bad_signature() {
    let state = create_app_state();
    let token = create_token(Role::Admin, 3600, "a-different-secret");
    let mut parts = get_request_parts(Some(&token));

    let result = AuthUser::from_request_parts(&mut parts, &state).await;

    assert!(result.is_err());
}

#[test]
fn test_config_is_reachable_from_state() {
    let state = create_app_state();
    let config = AppConfig::from_ref(&state);
    assert_eq!(config.jwt_secret, TEST_JWT_SECRET);
}

// --- Router Tests ---

#[tokio::test]
async fn test_sign_up_and_sign_in_flow() {
    let router = create_router(create_app_state());
    let token = sign_up(&router, "neo", 1).await;
    assert!(!token.is_empty());

    let (status, body) = send(
        &router,
        json_request(
            Method::POST,
            "/auth/sign_in",
            None,
            json!({"username": "neo", "password": "p"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let auth: AuthResponse = serde_json::from_value(body.clone()).unwrap();
    assert!(!auth.access_token.is_empty());
    assert_eq!(auth.user.username, "neo");
    assert_eq!(auth.user.role, Role::User);
    assert_eq!(body["user"]["role"], json!(1));
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn test_sign_in_wrong_password_is_401() {
    let router = create_router(create_app_state());
    sign_up(&router, "neo", 1).await;

    let (status, body) = send(
        &router,
        json_request(
            Method::POST,
            "/auth/sign_in",
            None,
            json!({"username": "neo", "password": "wrong"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid credentials");

    let (status, _) = send(
        &router,
        json_request(
            Method::POST,
            "/auth/sign_in",
            None,
            json!({"username": "nobody", "password": "p"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sign_up_duplicate_username_is_409() {
    let router = create_router(create_app_state());
    sign_up(&router, "taken", 1).await;

    let (status, _) = send(
        &router,
        json_request(
            Method::POST,
            "/auth/sign_up",
            None,
            json!({"username": "taken", "password": "p", "role": 1}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let router = create_router(create_app_state());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/sign_up")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid request body");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let router = create_router(create_app_state());

    let (status, body) = send(&router, get_request("/films_get_list", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let message: MessageResponse = serde_json::from_value(body).unwrap();
    assert!(!message.message.is_empty());

    let (status, _) = send(&router, get_request("/get_list_actors_films", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_admin_gets_403_on_admin_routes() {
    let router = create_router(create_app_state());
    let token = sign_up(&router, "viewer", 1).await;

    let (status, _) = send(&router, get_request("/films_get_list", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &router,
        json_request(
            Method::POST,
            "/actor_create",
            Some(&token),
            json!({"name": "A", "gender": "male", "date_of_birth": "1980-01-01"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "admin access required");
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let router = create_router(create_app_state());
    let token = sign_up(&router, "boss", 2).await;

    let (status, _) = send(&router, get_request("/actor_create", Some(&token))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_sort_validation_message() {
    let router = create_router(create_app_state());
    let token = sign_up(&router, "viewer", 1).await;

    let (status, body) = send(
        &router,
        get_request("/films_get_list?sort_by=bogus", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Некорректная сортировка");
}

#[tokio::test]
async fn test_unparsable_query_is_json_400() {
    let router = create_router(create_app_state());
    let token = sign_up(&router, "viewer", 1).await;

    let (status, body) = send(
        &router,
        get_request("/films_get_list?sort_by=a&sort_by=b", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid query parameters");

    let (status, body) = send(
        &router,
        get_request("/films/search?movie=a&movie=b", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid query parameters");
}

#[tokio::test]
async fn test_invalid_path_id_is_400() {
    let router = create_router(create_app_state());
    let token = sign_up(&router, "boss", 2).await;

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/actor_delete/abc")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid actor ID");
}

#[tokio::test]
async fn test_public_endpoints() {
    let router = create_router(create_app_state());

    let response = router
        .clone()
        .oneshot(get_request("/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let (status, body) = send(&router, get_request("/api-docs/openapi.json", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/films_get_list").is_some());
}
