// handlers/elevated/mod.rs - Elevated handlers (root JWT required)
//
// Route Prefix: /api/root/*
// Middleware: jwt_auth_middleware → require_root_middleware

pub mod root;
