//! Tenant data-source routing: registry lookup, credential decryption,
//! identifier mapping and the two-tier connection cache.

pub mod cache;
pub mod diagnostics;
pub mod error;
pub mod mapper;
pub mod resolved;
pub mod resolver;

pub use cache::{TierStats, TtlCache};
pub use diagnostics::{ConnectionInfo, ConnectionTestReport, Diagnostics, TestDiagnostics};
pub use error::ResolveError;
pub use mapper::{map_to_data_source_id, TenantScope, TENANT_SCOPE_COLUMN};
pub use resolved::ResolvedConfig;
pub use resolver::{CacheStats, ConnectionResolver, ResolverSettings, TenantConnection, MAX_CLIENT_TTL_MULTIPLIER};
