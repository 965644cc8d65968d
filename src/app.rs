use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use secrecy::SecretString;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::client::ClientFactory;
use crate::handlers;
use crate::middleware::{jwt_auth_middleware, require_root_middleware, tenant_context_middleware};
use crate::router::{ConnectionResolver, Diagnostics};

/// Shared state handed to every handler and middleware.
pub struct AppState<F: ClientFactory> {
    pub resolver: ConnectionResolver<F>,
    pub diagnostics: Diagnostics<F>,
    pub jwt_secret: Arc<SecretString>,
    /// Wrap the router in `TraceLayer`. On by default.
    pub request_logging: bool,
}

impl<F: ClientFactory> AppState<F> {
    pub fn new(resolver: ConnectionResolver<F>, jwt_secret: SecretString) -> Self {
        Self {
            diagnostics: Diagnostics::new(resolver.clone()),
            resolver,
            jwt_secret: Arc::new(jwt_secret),
            request_logging: true,
        }
    }

    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }
}

impl<F: ClientFactory> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            diagnostics: self.diagnostics.clone(),
            jwt_secret: Arc::clone(&self.jwt_secret),
            request_logging: self.request_logging,
        }
    }
}

pub fn app<F: ClientFactory>(state: AppState<F>) -> Router {
    let request_logging = state.request_logging;

    let router = Router::new()
        // Public
        .route("/health", get(handlers::public::health::<F>))
        // Tenant-scoped (JWT + resolved tenant context)
        .merge(tenant_routes(state.clone()))
        // Operator diagnostics (root JWT)
        .merge(root_routes(state.clone()))
        .with_state(state)
        // Global middleware
        .layer(CorsLayer::permissive());

    if request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn tenant_routes<F: ClientFactory>(state: AppState<F>) -> Router<AppState<F>> {
    use handlers::protected::tenant;

    Router::new()
        .route("/api/tenant/context", get(tenant::context_get::<F>))
        .route_layer(from_fn_with_state(state, tenant_context_middleware::<F>))
}

fn root_routes<F: ClientFactory>(state: AppState<F>) -> Router<AppState<F>> {
    use handlers::elevated::root;

    // Layers run bottom-up: authenticate first, then require root.
    Router::new()
        .route("/api/root/cache", get(root::cache_stats::<F>))
        .route("/api/root/tenant/:id/connection", get(root::tenant_connection::<F>))
        .route("/api/root/tenant/:id/test", post(root::tenant_test::<F>))
        .route("/api/root/tenant/:id/invalidate", post(root::tenant_invalidate::<F>))
        .route_layer(from_fn(require_root_middleware))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware::<F>))
}
