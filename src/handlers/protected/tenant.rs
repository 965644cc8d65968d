// handlers/protected/tenant.rs - GET /api/tenant/context handler

use axum::Extension;
use serde::Serialize;

use crate::client::ClientFactory;
use crate::middleware::{ApiResponse, AuthUser, TenantContext};

#[derive(Debug, Serialize)]
pub struct ContextView {
    pub calling_user: AuthUser,
    pub data_source_tenant_id: String,
    pub scope_column: &'static str,
    pub scope_predicate: String,
}

/// Echo the resolved context so clients can confirm which data-source
/// identifier their requests will be scoped to.
pub async fn context_get<F: ClientFactory>(
    Extension(context): Extension<TenantContext<F::Client>>,
) -> ApiResponse<ContextView> {
    ApiResponse::success(ContextView {
        scope_column: context.scope.column(),
        scope_predicate: context.scope.predicate(1),
        calling_user: context.calling_user,
        data_source_tenant_id: context.data_source_tenant_id,
    })
}
