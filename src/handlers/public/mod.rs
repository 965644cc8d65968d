// handlers/public/mod.rs - Public handlers (no authentication required)

pub mod health; // GET /health

pub use health::health;
