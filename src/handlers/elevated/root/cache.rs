// handlers/elevated/root/cache.rs - GET /api/root/cache handler

use axum::extract::State;

use crate::app::AppState;
use crate::client::ClientFactory;
use crate::middleware::ApiResponse;
use crate::router::CacheStats;

pub async fn cache_stats<F: ClientFactory>(State(state): State<AppState<F>>) -> ApiResponse<CacheStats> {
    ApiResponse::success(state.diagnostics.cache_stats())
}
