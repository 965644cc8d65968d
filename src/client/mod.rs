pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::router::ResolvedConfig;

pub use postgres::{PgClientFactory, PgDataClient};

/// The resolved data endpoint could not be reached or rejected the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ConnectError(pub String);

/// A reusable connector to one tenant data database.
///
/// Handles are owned by the resolver's cache and shared through `Arc`; route
/// handlers only borrow them.
#[async_trait]
pub trait DataClient: Send + Sync + 'static {
    /// One lightweight round trip against the data source.
    async fn ping(&self) -> Result<(), ConnectError>;
}

/// Builds connectors from a resolved configuration.
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    type Client: DataClient;

    /// Establish a connector bound to `config.endpoint` and
    /// `config.connector_credential()`. Must fail rather than hand back a
    /// connector that cannot reach the endpoint.
    async fn connect(&self, config: &ResolvedConfig) -> Result<Self::Client, ConnectError>;
}
