use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use secrecy::SecretString;
use serde::Serialize;

use crate::app::AppState;
use crate::auth::{validate_jwt, Claims, ROOT_ACCESS};
use crate::client::ClientFactory;
use crate::error::ApiError;

/// Authenticated caller extracted from the bearer JWT
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub tenant_id: String,
    pub user_id: String,
    pub access: String,
}

impl AuthUser {
    pub fn is_root(&self) -> bool {
        self.access == ROOT_ACCESS
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            tenant_id: claims.tenant,
            user_id: claims.sub,
            access: claims.access,
        }
    }
}

/// Validate the bearer token in `headers` against `secret`.
pub fn authenticate(headers: &HeaderMap, secret: &SecretString) -> Result<AuthUser, ApiError> {
    let token = extract_jwt_from_headers(headers).map_err(ApiError::unauthorized)?;

    let claims = validate_jwt(&token, secret).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        ApiError::unauthorized("Invalid or expired token")
    })?;

    if claims.tenant.trim().is_empty() {
        return Err(ApiError::unauthorized("Token carries no tenant"));
    }

    Ok(AuthUser::from(claims))
}

/// JWT authentication middleware that validates tokens and extracts user context
pub async fn jwt_auth_middleware<F: ClientFactory>(
    State(state): State<AppState<F>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = authenticate(request.headers(), &state.jwt_secret)?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Must run after `jwt_auth_middleware`.
pub async fn require_root_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !auth_user.is_root() {
        tracing::warn!(user_id = %auth_user.user_id, tenant_id = %auth_user.tenant_id, "Non-root caller on root route");
        return Err(ApiError::forbidden("Root access required"));
    }

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
