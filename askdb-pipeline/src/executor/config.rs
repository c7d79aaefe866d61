//! Database connection settings.

use askdb_core::{AskResult, QueryError};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::fmt;
use std::time::Duration;
use tokio_postgres::NoTls;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// PostgreSQL connection configuration.
#[derive(Clone, PartialEq)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size, only used by [`DbConfig::create_pool`]
    pub pool_size: usize,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// Server-side `statement_timeout`; `None` leaves the server default
    pub statement_timeout: Option<Duration>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "postgres".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            pool_size: 8,
            connect_timeout: Duration::from_secs(10),
            statement_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("pool_size", &self.pool_size)
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

impl DbConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Reads `ASKDB_DB_HOST`, `ASKDB_DB_PORT`, `ASKDB_DB_NAME`,
    /// `ASKDB_DB_USER`, `ASKDB_DB_PASSWORD`, `ASKDB_DB_POOL_SIZE`,
    /// `ASKDB_DB_CONNECT_TIMEOUT_SECS` and `ASKDB_DB_STATEMENT_TIMEOUT_SECS`
    /// (0 disables the statement timeout).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let statement_secs = env_or(
            "ASKDB_DB_STATEMENT_TIMEOUT_SECS",
            defaults.statement_timeout.map(|d| d.as_secs()).unwrap_or(0),
        );

        Self {
            host: std::env::var("ASKDB_DB_HOST").unwrap_or(defaults.host),
            port: env_or("ASKDB_DB_PORT", defaults.port),
            dbname: std::env::var("ASKDB_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("ASKDB_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("ASKDB_DB_PASSWORD").unwrap_or_default(),
            pool_size: env_or("ASKDB_DB_POOL_SIZE", defaults.pool_size),
            connect_timeout: Duration::from_secs(env_or(
                "ASKDB_DB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )),
            statement_timeout: (statement_secs > 0).then(|| Duration::from_secs(statement_secs)),
        }
    }

    /// Startup options carrying the statement timeout, e.g. `-c statement_timeout=30000`.
    fn options(&self) -> Option<String> {
        self.statement_timeout
            .map(|t| format!("-c statement_timeout={}", t.as_millis()))
    }

    /// Settings for a single, unpooled connection.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .password(&self.password)
            .application_name("askdb")
            .connect_timeout(self.connect_timeout);
        if let Some(options) = self.options() {
            config.options(&options);
        }
        config
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> AskResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.application_name = Some("askdb".to_string());
        cfg.connect_timeout = Some(self.connect_timeout);
        cfg.options = self.options();

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(self.pool_size.max(1)));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| QueryError::Connectivity {
                reason: format!("Failed to create pool: {}", e),
            })?;

        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let config = DbConfig {
            password: "hunter2".to_string(),
            ..DbConfig::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_statement_timeout_option() {
        let config = DbConfig::default();
        assert_eq!(config.options().as_deref(), Some("-c statement_timeout=30000"));

        let disabled = DbConfig {
            statement_timeout: None,
            ..DbConfig::default()
        };
        assert_eq!(disabled.options(), None);
    }

    #[test]
    fn test_pg_config_carries_settings() {
        let config = DbConfig {
            host: "db.internal".to_string(),
            port: 6543,
            dbname: "crm".to_string(),
            ..DbConfig::default()
        };
        let pg = config.pg_config();
        assert_eq!(pg.get_dbname(), Some("crm"));
        assert_eq!(pg.get_ports(), &[6543]);
        assert_eq!(pg.get_connect_timeout(), Some(&Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_pool_creation_is_lazy() {
        let pool = DbConfig::default().create_pool().unwrap();
        assert_eq!(pool.status().max_size, 8);
    }
}
