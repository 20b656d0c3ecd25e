use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Sqlite,
};
use std::str::FromStr;
use tokio::time::Duration;
use tracing::{info, instrument};

use crate::TARGET_DB;

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Get access to the database pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    #[instrument(target = "db_query", level = "info")]
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        info!(target: TARGET_DB, "Creating database pool for: {}", database_path);

        let connect_options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", database_path))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(5))
                .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        info!(target: TARGET_DB, "Database pool created");

        let db = Database { pool };
        db.initialize_schema().await?;

        Ok(db)
    }

    /// An in-memory database, used by tests. A single connection keeps every
    /// query on the same memory store.
    pub async fn open_in_memory() -> Result<Self, sqlx::Error> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await?;
        let db = Database { pool };
        db.initialize_schema().await?;
        Ok(db)
    }

    /// Counts of explicitly rated articles: (relevant, not_relevant).
    pub async fn count_ratings(&self) -> Result<(usize, usize), sqlx::Error> {
        let relevant: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE relevance = 'relevant'")
                .fetch_one(self.pool())
                .await?;
        let not_relevant: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE relevance = 'not_relevant'")
                .fetch_one(self.pool())
                .await?;
        Ok((relevant as usize, not_relevant as usize))
    }
}
