use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use super::auth::{authenticate, AuthUser};
use crate::app::AppState;
use crate::client::ClientFactory;
use crate::error::ApiError;
use crate::router::TenantScope;

/// Everything a route handler needs to touch the caller's tenant data.
pub struct TenantContext<C> {
    pub client: Arc<C>,
    /// Identifier the tenant's rows carry in its data source.
    pub data_source_tenant_id: String,
    pub calling_user: AuthUser,
    pub scope: TenantScope,
}

impl<C> Clone for TenantContext<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            data_source_tenant_id: self.data_source_tenant_id.clone(),
            calling_user: self.calling_user.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<C> fmt::Debug for TenantContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantContext")
            .field("data_source_tenant_id", &self.data_source_tenant_id)
            .field("calling_user", &self.calling_user)
            .finish_non_exhaustive()
    }
}

/// Authenticate the request and resolve the caller's tenant.
///
/// Reuses an `AuthUser` already placed in the extensions by an earlier layer.
/// Authentication failures are 401; every resolution failure is the same 503.
pub async fn get_tenant_context<F: ClientFactory>(
    state: &AppState<F>,
    parts: &Parts,
) -> Result<TenantContext<F::Client>, ApiError> {
    let calling_user = match parts.extensions.get::<AuthUser>() {
        Some(user) => user.clone(),
        None => authenticate(&parts.headers, &state.jwt_secret)?,
    };

    let connection = state
        .resolver
        .get_client_for_tenant(&calling_user.tenant_id, false)
        .await
        .map_err(|err| {
            tracing::info!(
                tenant_id = %calling_user.tenant_id,
                user_id = %calling_user.user_id,
                kind = err.kind(),
                "Tenant context unavailable"
            );
            ApiError::from(err)
        })?;

    let scope = connection.scope();
    Ok(TenantContext {
        client: connection.client,
        data_source_tenant_id: connection.data_source_tenant_id,
        calling_user,
        scope,
    })
}

/// Inserts `TenantContext<F::Client>` and the `AuthUser` into request extensions.
pub async fn tenant_context_middleware<F: ClientFactory>(
    State(state): State<AppState<F>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let context = get_tenant_context(&state, &parts).await?;

    tracing::debug!(
        tenant_id = %context.calling_user.tenant_id,
        data_source_tenant_id = %context.data_source_tenant_id,
        "Tenant context attached"
    );

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(context.calling_user.clone());
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}
