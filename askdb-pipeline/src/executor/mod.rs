//! SQL Executor.
//!
//! [`SqlExecutor`] is the seam between the self-correction loop and the
//! database. [`PostgresExecutor`] is the real implementation;
//! [`MockExecutor`] replays scripted outcomes for tests.

mod config;
mod connection;
mod introspect;
mod mock;
mod postgres;

pub use config::DbConfig;
pub use connection::{ConnectionProvider, DirectConnector, PgConnection, PooledConnector};
pub use introspect::introspect_catalog;
pub use mock::{scalar_result, MockExecutor};
pub use postgres::PostgresExecutor;

use askdb_core::{AskResult, QueryResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs one statement and returns its rows.
///
/// Errors are [`askdb_core::QueryError`]s: `Execution`/`Timeout`/`EmptyStatement`
/// for problems with the statement, `Connectivity` when no connection could
/// be obtained.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> AskResult<QueryResult>;
}

#[async_trait]
impl<T: SqlExecutor + ?Sized> SqlExecutor for Arc<T> {
    async fn execute(&self, sql: &str) -> AskResult<QueryResult> {
        (**self).execute(sql).await
    }
}
