pub mod auth;
pub mod response;
pub mod tenant_context;

pub use auth::{authenticate, jwt_auth_middleware, require_root_middleware, AuthUser};
pub use response::{ApiResponse, ApiResult};
pub use tenant_context::{get_tenant_context, tenant_context_middleware, TenantContext};
