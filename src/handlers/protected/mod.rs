// handlers/protected/mod.rs - Protected handlers (JWT + tenant context)
//
// Every route here sits behind `tenant_context_middleware`, so handlers can
// extract `TenantContext` without resolving anything themselves.

pub mod tenant; // GET /api/tenant/context
