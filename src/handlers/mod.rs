// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) → Protected (JWT + tenant context) → Elevated (root JWT)
pub mod public; // Tier 1: No authentication required (/health)
pub mod protected; // Tier 2: JWT + resolved tenant context (/api/tenant/*)
pub mod elevated; // Tier 3: Root JWT required (/api/root/*)
