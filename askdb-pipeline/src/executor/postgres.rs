use super::connection::{connectivity, ConnectionProvider, PgConnection};
use super::SqlExecutor;
use askdb_core::{AskError, AskResult, CellValue, QueryError, QueryResult, Row};
use askdb_sql::is_select_statement;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_postgres::types::Type;
use tokio_postgres::SimpleQueryMessage;
use tracing::{debug, info, warn};

/// Map a driver error. Server-reported errors (including a statement
/// timeout) are execution errors the loop may correct; a dead connection is
/// connectivity.
fn query_error(error: tokio_postgres::Error) -> AskError {
    if let Some(db) = error.as_db_error() {
        return QueryError::Execution {
            message: db.message().to_string(),
            sqlstate: Some(db.code().code().to_string()),
        }
        .into();
    }
    if error.is_closed() {
        return connectivity(error);
    }
    QueryError::Execution {
        message: error.to_string(),
        sqlstate: None,
    }
    .into()
}

/// Typed cell from the text protocol, using the column's declared type.
/// Values that fail to parse, and every other type, stay text.
pub(crate) fn decode_cell(ty: &Type, text: Option<&str>) -> CellValue {
    let Some(text) = text else {
        return CellValue::Null;
    };
    let typed = if [Type::INT2, Type::INT4, Type::INT8, Type::OID].contains(ty) {
        text.parse().ok().map(CellValue::Int)
    } else if [Type::FLOAT4, Type::FLOAT8, Type::NUMERIC].contains(ty) {
        text.parse().ok().map(CellValue::Float)
    } else if *ty == Type::BOOL {
        match text {
            "t" | "true" => Some(CellValue::Bool(true)),
            "f" | "false" => Some(CellValue::Bool(false)),
            _ => None,
        }
    } else {
        None
    };
    typed.unwrap_or_else(|| CellValue::text(text))
}

/// Executes statements against PostgreSQL, one connection per call.
#[derive(Clone)]
pub struct PostgresExecutor {
    provider: Arc<dyn ConnectionProvider>,
    connect_timeout: Option<Duration>,
    query_timeout: Option<Duration>,
}

impl PostgresExecutor {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            connect_timeout: None,
            query_timeout: None,
        }
    }

    /// Deadline for acquiring a connection. Expiry is a connectivity error.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Client-side deadline for running the statement. Also bounds
    /// connection acquisition when no connect timeout is set.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    async fn connect(&self) -> AskResult<PgConnection> {
        let Some(limit) = self.connect_timeout.or(self.query_timeout) else {
            return self.provider.connect().await;
        };
        match tokio::time::timeout(limit, self.provider.connect()).await {
            Ok(conn) => conn,
            Err(_) => Err(connectivity(format!(
                "no connection available within {}ms",
                limit.as_millis()
            ))),
        }
    }

    async fn run(&self, conn: &PgConnection, sql: &str) -> AskResult<(Vec<String>, Vec<Row>)> {
        let statement = conn.prepare(sql).await.map_err(query_error)?;

        if statement.columns().is_empty() {
            let affected = conn.execute(&statement, &[]).await.map_err(query_error)?;
            return Ok((
                vec!["result".to_string()],
                vec![vec![CellValue::text(format!("{} rows affected", affected))]],
            ));
        }

        let columns = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let types: Vec<Type> = statement.columns().iter().map(|c| c.type_().clone()).collect();

        // Text protocol keeps every column renderable; known scalar types are typed back.
        let messages = conn.simple_query(sql).await.map_err(query_error)?;
        let rows = messages
            .iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(
                    (0..row.len())
                        .map(|i| match types.get(i) {
                            Some(ty) => decode_cell(ty, row.get(i)),
                            None => CellValue::from_optional_text(row.get(i)),
                        })
                        .collect::<Row>(),
                ),
                _ => None,
            })
            .collect();

        Ok((columns, rows))
    }
}

impl std::fmt::Debug for PostgresExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresExecutor")
            .field("connect_timeout", &self.connect_timeout)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

#[async_trait]
impl SqlExecutor for PostgresExecutor {
    async fn execute(&self, sql: &str) -> AskResult<QueryResult> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(QueryError::EmptyStatement.into());
        }
        if !is_select_statement(sql) {
            warn!(sql = %sql, "executing a non-SELECT statement");
        }

        let conn = self.connect().await?;
        let start = Instant::now();
        let outcome = match self.query_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run(&conn, sql)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(QueryError::Timeout {
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    }
                    .into())
                }
            },
            None => self.run(&conn, sql).await,
        };
        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            Ok((columns, rows)) => {
                info!(rows = rows.len(), elapsed_secs = elapsed, "query executed");
                Ok(QueryResult::new(columns, rows, elapsed))
            }
            Err(e) => {
                debug!(error = %e, elapsed_secs = elapsed, "query failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::SelfCorrectionLoop;
    use crate::prompts::PromptSet;
    use askdb_llm::MockTextGenerator;

    struct RefusingProvider;

    #[async_trait]
    impl ConnectionProvider for RefusingProvider {
        async fn connect(&self) -> AskResult<PgConnection> {
            Err(connectivity("connection refused"))
        }
    }

    struct StalledProvider;

    #[async_trait]
    impl ConnectionProvider for StalledProvider {
        async fn connect(&self) -> AskResult<PgConnection> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(connectivity("unreachable"))
        }
    }

    #[tokio::test]
    async fn test_empty_statement() {
        let executor = PostgresExecutor::new(Arc::new(RefusingProvider));
        let err = executor.execute("   ").await.unwrap_err();
        assert_eq!(err, AskError::Query(QueryError::EmptyStatement));
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces_connectivity() {
        let executor = PostgresExecutor::new(Arc::new(RefusingProvider));
        let err = executor.execute("SELECT 1;").await.unwrap_err();
        assert_eq!(
            err,
            AskError::Query(QueryError::Connectivity {
                reason: "connection refused".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_stalled_connect_is_connectivity() {
        let executor = PostgresExecutor::new(Arc::new(StalledProvider))
            .with_query_timeout(Duration::from_millis(20));
        let err = executor.execute("SELECT pg_sleep(60);").await.unwrap_err();
        assert!(matches!(err, AskError::Query(QueryError::Connectivity { .. })));
    }

    #[tokio::test]
    async fn test_connect_timeout_preferred_over_query_timeout() {
        let executor = PostgresExecutor::new(Arc::new(StalledProvider))
            .with_connect_timeout(Duration::from_millis(10))
            .with_query_timeout(Duration::from_secs(60));
        let err = executor.execute("SELECT 1;").await.unwrap_err();
        match err {
            AskError::Query(QueryError::Connectivity { reason }) => assert!(reason.contains("10ms")),
            other => panic!("Expected connectivity error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stalled_connect_skips_correction() {
        let llm = Arc::new(MockTextGenerator::with_default("SELECT 2;"));
        let correction = SelfCorrectionLoop::new(llm.clone(), Arc::new(PromptSet::default()), 2);
        let executor = PostgresExecutor::new(Arc::new(StalledProvider))
            .with_query_timeout(Duration::from_millis(20));

        let failure = correction
            .run(&executor, "SELECT 1;", "q", "")
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            AskError::Query(QueryError::Connectivity { .. })
        ));
        assert!(failure.attempts.is_empty());
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn test_decode_cell_types() {
        assert_eq!(decode_cell(&Type::INT8, Some("42")), CellValue::Int(42));
        assert_eq!(decode_cell(&Type::INT4, Some("-7")), CellValue::Int(-7));
        assert_eq!(decode_cell(&Type::FLOAT8, Some("2.5")), CellValue::Float(2.5));
        assert_eq!(decode_cell(&Type::NUMERIC, Some("10.25")), CellValue::Float(10.25));
        assert_eq!(decode_cell(&Type::BOOL, Some("t")), CellValue::Bool(true));
        assert_eq!(decode_cell(&Type::BOOL, Some("f")), CellValue::Bool(false));
        assert_eq!(decode_cell(&Type::TEXT, Some("42")), CellValue::text("42"));
        assert_eq!(decode_cell(&Type::INT4, None), CellValue::Null);
        assert_eq!(decode_cell(&Type::INT8, Some("n/a")), CellValue::text("n/a"));
    }

    #[test]
    fn test_decoded_count_renders_unquoted() {
        let row = vec![decode_cell(&Type::INT8, Some("42"))];
        assert_eq!(askdb_core::format_row(&row), "(42)");
    }
}
