// handlers/elevated/root/tenant/mod.rs - Per-tenant operator handlers

pub mod connection; // GET  /api/root/tenant/:id/connection
pub mod invalidate; // POST /api/root/tenant/:id/invalidate
pub mod test; // POST /api/root/tenant/:id/test

pub use connection::tenant_connection;
pub use invalidate::tenant_invalidate;
pub use test::tenant_test;
