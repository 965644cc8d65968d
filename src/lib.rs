pub mod app;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod registry;
pub mod router;
pub mod secrets;

#[cfg(test)]
pub mod testing;
