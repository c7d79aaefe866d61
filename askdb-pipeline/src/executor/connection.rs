//! Connection providers.
//!
//! The executor asks for a connection per execution attempt and drops it
//! before returning, on every path. What "drop" means is up to the provider:
//! a direct connection closes, a pooled one goes back to its pool.

use super::DbConfig;
use askdb_core::{AskError, AskResult, QueryError};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use std::ops::Deref;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

/// A live connection, usable as a [`tokio_postgres::Client`].
pub enum PgConnection {
    Direct(Client),
    Pooled(deadpool_postgres::Object),
}

impl Deref for PgConnection {
    type Target = Client;

    fn deref(&self) -> &Client {
        match self {
            PgConnection::Direct(client) => client,
            PgConnection::Pooled(object) => object,
        }
    }
}

pub(crate) fn connectivity(reason: impl std::fmt::Display) -> AskError {
    QueryError::Connectivity {
        reason: reason.to_string(),
    }
    .into()
}

/// Supplies ready connections on demand.
///
/// Failures must be reported as [`QueryError::Connectivity`]; the
/// self-correction loop never retries those.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn connect(&self) -> AskResult<PgConnection>;
}

/// Opens a fresh connection for every request.
#[derive(Clone)]
pub struct DirectConnector {
    config: tokio_postgres::Config,
}

impl DirectConnector {
    pub fn new(db: &DbConfig) -> Self {
        Self {
            config: db.pg_config(),
        }
    }
}

impl std::fmt::Debug for DirectConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectConnector")
            .field("dbname", &self.config.get_dbname())
            .finish()
    }
}

#[async_trait]
impl ConnectionProvider for DirectConnector {
    async fn connect(&self) -> AskResult<PgConnection> {
        let (client, connection) = self.config.connect(NoTls).await.map_err(connectivity)?;
        // The connection future resolves once the client is dropped.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "database connection closed with error");
            }
        });
        debug!("opened direct database connection");
        Ok(PgConnection::Direct(client))
    }
}

/// Borrows connections from a `deadpool-postgres` pool.
#[derive(Clone)]
pub struct PooledConnector {
    pool: Pool,
}

impl PooledConnector {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(db: &DbConfig) -> AskResult<Self> {
        Ok(Self::new(db.create_pool()?))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl std::fmt::Debug for PooledConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("PooledConnector")
            .field("size", &status.size)
            .field("max_size", &status.max_size)
            .finish()
    }
}

#[async_trait]
impl ConnectionProvider for PooledConnector {
    async fn connect(&self) -> AskResult<PgConnection> {
        let object = self.pool.get().await.map_err(connectivity)?;
        Ok(PgConnection::Pooled(object))
    }
}
