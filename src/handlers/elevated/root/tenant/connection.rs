// handlers/elevated/root/tenant/connection.rs - GET /api/root/tenant/:id/connection handler

use axum::extract::{Path, State};

use crate::app::AppState;
use crate::client::ClientFactory;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::router::{ConnectionInfo, ResolveError};

/// Operators see "no usable data source" as a 404; other failures keep the
/// generic 503.
pub async fn tenant_connection<F: ClientFactory>(
    State(state): State<AppState<F>>,
    Path(tenant_id): Path<String>,
) -> ApiResult<ConnectionInfo> {
    match state.diagnostics.get_connection_info(&tenant_id).await {
        Ok(info) => Ok(ApiResponse::success(info)),
        Err(ResolveError::NotConfigured) => Err(ApiError::not_found(format!(
            "Tenant '{tenant_id}' has no usable data source"
        ))),
        Err(err) => Err(err.into()),
    }
}
