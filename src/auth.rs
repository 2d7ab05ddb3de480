use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, models::Role, services::AuthService};

/// Claims
///
/// The payload signed into every bearer token. The role is captured at issuance, so a
/// role change only takes effect once the user signs in again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
    /// Issued At, seconds since the epoch.
    pub iat: i64,
    /// Expiration Time, seconds since the epoch.
    pub exp: i64,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers take it as an argument
/// instead of reading untyped values from request state.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.user_id,
            username: claims.username,
            role: claims.role,
        }
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("invalid authorization header".to_string()))
}

/// AuthUser Extractor Implementation
///
/// Resolution order:
/// 1. An `AuthUser` already attached by `auth_middleware` / `admin_middleware`.
/// 2. The bearer token, verified (signature and expiry) by the `AuthService`.
///
/// Rejection: 401 with a `{"message"}` body on any failure. The role is taken from the
/// token claims; there is no database lookup.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = bearer_token(&parts.headers)?;
        let claims = AuthService::from_ref(state)
            .verify_token(token)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected bearer token");
                ApiError::Unauthorized("invalid token".to_string())
            })?;

        Ok(AuthUser::from(claims))
    }
}

/// auth_middleware
///
/// Guards the authenticated routes. A request without a valid token never reaches the
/// handler; a valid one continues with its `AuthUser` attached to the request extensions.
pub async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// admin_middleware
///
/// Guards the admin routes: 401 without a valid token, 403 for a valid token whose role
/// is not admin.
pub async fn admin_middleware(
    auth_user: AuthUser,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !auth_user.role.is_admin() {
        tracing::info!(user_id = auth_user.id, "non-admin request to admin route");
        return Err(ApiError::Forbidden("admin access required".to_string()));
    }
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}
