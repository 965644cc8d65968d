pub mod cache;
pub mod seal;
pub mod server;
pub mod tenant;
