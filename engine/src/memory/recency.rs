//! Recency log backed by the `sessions` table

use super::RecencyLog;
use crate::db::{Database, RECENCY_MIGRATIONS};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sdk::types::{Role, Turn};
use sqlx::Row;
use std::path::Path;

pub struct SqliteRecencyLog {
    db: Database,
}

impl SqliteRecencyLog {
    /// Open (or create) the recency log at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        let db = Database::new(path, RECENCY_MIGRATIONS)
            .await
            .context("Failed to open recency log")?;
        Ok(Self { db })
    }

    /// Number of turns stored for `session_id`
    pub async fn count(&self, session_id: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE session_uuid = ?")
            .bind(session_id)
            .fetch_one(self.db.pool())
            .await
            .context("Failed to count session turns")?;
        Ok(count as usize)
    }
}

#[async_trait]
impl RecencyLog for SqliteRecencyLog {
    async fn append_exchange(
        &self,
        session_id: &str,
        timestamp: &str,
        user_text: &str,
        agent_text: &str,
    ) -> Result<()> {
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .context("Failed to begin transaction")?;

        for (role, text) in [(Role::User, user_text), (Role::Agent, agent_text)] {
            sqlx::query(
                r#"
                INSERT INTO sessions (session_uuid, timestamp, role, content)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(session_id)
            .bind(timestamp)
            .bind(role.as_str())
            .bind(text)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert {} turn", role))?;
        }

        tx.commit().await.context("Failed to commit exchange")?;

        tracing::debug!("Appended exchange to session {}", session_id);
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>> {
        // Newest first so LIMIT keeps the tail, then flip to chronological
        let rows = sqlx::query(
            r#"
            SELECT id, session_uuid, timestamp, role, content
            FROM sessions
            WHERE session_uuid = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await
        .context("Failed to fetch recent turns")?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows.into_iter().rev() {
            let role: String = row.get("role");
            turns.push(Turn {
                id: row.get("id"),
                session_id: row.get("session_uuid"),
                timestamp: row.get("timestamp"),
                role: role.parse().map_err(anyhow::Error::msg)?,
                text: row.get("content"),
            });
        }

        Ok(turns)
    }

    async fn close(&self) -> Result<()> {
        self.db.close().await
    }
}
