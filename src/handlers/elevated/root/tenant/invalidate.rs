// handlers/elevated/root/tenant/invalidate.rs - POST /api/root/tenant/:id/invalidate handler

use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Serialize;

use crate::app::AppState;
use crate::client::ClientFactory;
use crate::middleware::{ApiResponse, AuthUser};

#[derive(Debug, Serialize)]
pub struct InvalidateResult {
    pub tenant_id: String,
    /// False when nothing was cached for the tenant.
    pub evicted: bool,
}

pub async fn tenant_invalidate<F: ClientFactory>(
    State(state): State<AppState<F>>,
    Extension(operator): Extension<AuthUser>,
    Path(tenant_id): Path<String>,
) -> ApiResponse<InvalidateResult> {
    let evicted = state.resolver.invalidate(&tenant_id);
    tracing::info!(tenant_id = %tenant_id, operator = %operator.user_id, evicted, "Operator invalidated tenant cache");

    ApiResponse::success(InvalidateResult { tenant_id, evicted })
}
