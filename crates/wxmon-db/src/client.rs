//! Database client and connection management

use crate::schema::SCHEMA;
use crate::{DbError, DbResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Database client wrapping an sqlx SQLite pool
#[derive(Clone)]
pub struct DbClient {
    pool: SqlitePool,
}

impl DbClient {
    /// Connect to `database_url` and make sure the schema exists
    ///
    /// Accepts `sqlite://path/to/file.db` or `sqlite::memory:`.
    pub async fn new(database_url: &str) -> DbResult<Self> {
        DbConnectionBuilder::from_url(database_url)?.connect().await
    }

    /// Private in-memory database, mostly for tests
    pub async fn in_memory() -> DbResult<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Get reference to underlying pool for direct queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> DbResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Schema verified");
        Ok(())
    }

    /// Test the database connection
    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Build SQLite pool options from a URL
pub struct DbConnectionBuilder {
    options: SqliteConnectOptions,
    in_memory: bool,
    max_connections: u32,
    busy_timeout: Duration,
}

impl DbConnectionBuilder {
    pub fn from_url(database_url: &str) -> DbResult<Self> {
        if database_url.trim().is_empty() {
            return Err(DbError::Config("empty database url".to_string()));
        }
        let options = SqliteConnectOptions::from_str(database_url)?;
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        Ok(Self {
            options,
            in_memory,
            max_connections: 5,
            busy_timeout: Duration::from_secs(30),
        })
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    pub fn build(self) -> (SqliteConnectOptions, SqlitePoolOptions) {
        let mut options = self
            .options
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout);

        // An in-memory database lives only as long as its connection.
        let pool_options = if self.in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options = options.journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new().max_connections(self.max_connections)
        };

        (
            options,
            pool_options.acquire_timeout(Duration::from_secs(30)),
        )
    }

    pub async fn connect(self) -> DbResult<DbClient> {
        let (options, pool_options) = self.build();
        let pool = pool_options.connect_with(options).await?;
        let client = DbClient { pool };
        client.ensure_schema().await?;
        Ok(client)
    }
}
