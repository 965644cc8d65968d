// handlers/elevated/root/tenant/test.rs - POST /api/root/tenant/:id/test handler

use axum::extract::{Path, State};

use crate::app::AppState;
use crate::client::ClientFactory;
use crate::middleware::ApiResponse;
use crate::router::ConnectionTestReport;

/// Always 200: the report itself carries success and the precise error kind.
pub async fn tenant_test<F: ClientFactory>(
    State(state): State<AppState<F>>,
    Path(tenant_id): Path<String>,
) -> ApiResponse<ConnectionTestReport> {
    let report = state.diagnostics.test_connection(&tenant_id).await;
    tracing::info!(
        tenant_id = %tenant_id,
        success = report.success,
        response_time_ms = report.response_time_ms,
        "Tenant connection test"
    );
    ApiResponse::success(report)
}
