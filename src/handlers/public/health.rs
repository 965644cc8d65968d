// handlers/public/health.rs - GET /health handler

use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::AppState;
use crate::client::ClientFactory;
use crate::middleware::ApiResponse;
use crate::router::CacheStats;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub registry: &'static str,
    pub cache: CacheStats,
}

/// Liveness plus a registry round trip. Degraded registry answers 503 without
/// echoing the underlying error.
pub async fn health<F: ClientFactory>(State(state): State<AppState<F>>) -> ApiResponse<HealthReport> {
    let registry = state.resolver.registry().ping().await;
    let cache = state.diagnostics.cache_stats();
    let timestamp = Utc::now();

    match registry {
        Ok(()) => ApiResponse::success(HealthReport {
            status: "ok",
            timestamp,
            registry: "ok",
            cache,
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Health check: registry unavailable");
            ApiResponse::with_status(
                HealthReport {
                    status: "degraded",
                    timestamp,
                    registry: "unavailable",
                    cache,
                },
                StatusCode::SERVICE_UNAVAILABLE,
            )
        }
    }
}
