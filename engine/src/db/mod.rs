/// Database module for SQLite persistence
///
/// Both memory tiers live in their own SQLite file. This module owns the
/// shared plumbing: opening a pool in WAL mode, applying idempotent
/// migrations, checkpointing the WAL and closing on shutdown.
///
/// WAL mode lets several processes share the recency log: SQLite serializes
/// writers at the file level while readers proceed concurrently.
use anyhow::{Context, Result};
use sdk::errors::EngineError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// A named, idempotent schema script
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Schema of the recency log
pub const RECENCY_MIGRATIONS: &[Migration] = &[Migration {
    name: "001_sessions.sql",
    sql: include_str!("../../migrations/001_sessions.sql"),
}];

/// Schema of the similarity index
pub const INSIGHT_MIGRATIONS: &[Migration] = &[Migration {
    name: "001_insights.sql",
    sql: include_str!("../../migrations/001_insights.sql"),
}];

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at `db_path` and apply `migrations`
    ///
    /// This will:
    /// 1. Create the parent directory and database file if missing
    /// 2. Enable WAL mode with a busy timeout for concurrent writers
    /// 3. Run every migration; they use `IF NOT EXISTS` and are safe to rerun
    ///
    /// SQLite replays a leftover WAL on open, so an unclean shutdown needs no
    /// extra recovery code.
    pub async fn new(db_path: &Path, migrations: &[Migration]) -> Result<Self> {
        info!("Opening database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                EngineError::Database(format!(
                    "Failed to connect to {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        debug!("Database connection established");

        let db = Self { pool };
        db.run_migrations(migrations).await?;

        Ok(db)
    }

    async fn run_migrations(&self, migrations: &[Migration]) -> Result<()> {
        for migration in migrations {
            sqlx::raw_sql(migration.sql)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    EngineError::Database(format!(
                        "Failed to execute migration {}: {}",
                        migration.name, e
                    ))
                })?;
            debug!("Applied migration {}", migration.name);
        }
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Flush the WAL into the main database file
    pub async fn flush_wal(&self) -> Result<()> {
        debug!("Flushing WAL to disk");

        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::Database(format!("Failed to flush WAL: {}", e)))?;

        Ok(())
    }

    /// Flush the WAL and close all connections in the pool
    pub async fn close(&self) -> Result<()> {
        if self.pool.is_closed() {
            return Ok(());
        }

        self.flush_wal().await?;
        self.pool.close().await;

        info!("Database connection closed");
        Ok(())
    }
}
