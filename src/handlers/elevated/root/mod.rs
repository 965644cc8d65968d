// handlers/elevated/root/mod.rs - Root operator handlers

pub mod cache; // GET /api/root/cache
pub mod tenant; // /api/root/tenant/:id/*

pub use cache::cache_stats;
pub use tenant::{tenant_connection, tenant_invalidate, tenant_test};
