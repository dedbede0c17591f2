// ABOUTME: SQLite persistence for user -> support channel -> ticket mappings
// ABOUTME: One row per Discord user; shared by the Discord handler and the webhook

use crate::error::Result;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite};
use std::path::Path;
use tracing::debug;

/// A user's support channel and the Zendesk ticket behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketMapping {
    pub user_id: u64,
    pub channel_id: u64,
    pub ticket_id: u64,
}

#[derive(FromRow)]
struct MappingRow {
    user_id: i64,
    channel_id: i64,
    ticket_id: i64,
}

impl From<MappingRow> for TicketMapping {
    fn from(row: MappingRow) -> Self {
        TicketMapping {
            user_id: row.user_id as u64,
            channel_id: row.channel_id as u64,
            ticket_id: row.ticket_id as u64,
        }
    }
}

/// Mapping store backed by SQLite
#[derive(Clone)]
pub struct MappingStore {
    pool: Pool<Sqlite>,
}

impl MappingStore {
    /// Open or create the store at the given path
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        // WAL lets webhook lookups proceed while the Discord side writes
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                user_id INTEGER PRIMARY KEY,
                channel_id INTEGER,
                ticket_id INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or replace the mapping for `user_id`.
    ///
    /// The row is committed before this returns.
    pub async fn upsert(&self, user_id: u64, channel_id: u64, ticket_id: u64) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO tickets (user_id, channel_id, ticket_id) VALUES (?, ?, ?)")
            .bind(user_id as i64)
            .bind(channel_id as i64)
            .bind(ticket_id as i64)
            .execute(&self.pool)
            .await?;

        debug!(user_id, channel_id, ticket_id, "Stored ticket mapping");
        Ok(())
    }

    /// Ticket id for a support channel.
    ///
    /// Rows are never deleted, so the most recently written match wins.
    pub async fn find_by_channel(&self, channel_id: u64) -> Result<Option<u64>> {
        let ticket_id: Option<i64> = sqlx::query_scalar(
            "SELECT ticket_id FROM tickets WHERE channel_id = ? ORDER BY rowid DESC LIMIT 1",
        )
        .bind(channel_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket_id.map(|id| id as u64))
    }

    /// Support channel id for a ticket, most recently written match first.
    pub async fn find_by_ticket(&self, ticket_id: u64) -> Result<Option<u64>> {
        let channel_id: Option<i64> = sqlx::query_scalar(
            "SELECT channel_id FROM tickets WHERE ticket_id = ? ORDER BY rowid DESC LIMIT 1",
        )
        .bind(ticket_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(channel_id.map(|id| id as u64))
    }

    /// Mapping currently held for a user.
    ///
    /// Not used by routing, which only needs the two lookups above; kept for
    /// inspecting state from tests and tooling.
    pub async fn get(&self, user_id: u64) -> Result<Option<TicketMapping>> {
        let row = sqlx::query_as::<_, MappingRow>(
            "SELECT user_id, channel_id, ticket_id FROM tickets WHERE user_id = ?",
        )
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Number of stored mappings, logged at startup.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, MappingStore) {
        let dir = TempDir::new().unwrap();
        let store = MappingStore::open(&dir.path().join("tickets.db"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_upsert_and_lookup() {
        let (_dir, store) = open_temp().await;
        store.upsert(555, 1001, 789).await.unwrap();

        assert_eq!(store.find_by_channel(1001).await.unwrap(), Some(789));
        assert_eq!(store.find_by_ticket(789).await.unwrap(), Some(1001));
        assert_eq!(
            store.get(555).await.unwrap(),
            Some(TicketMapping {
                user_id: 555,
                channel_id: 1001,
                ticket_id: 789
            })
        );
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let (_dir, store) = open_temp().await;
        assert!(store.find_by_channel(42).await.unwrap().is_none());
        assert!(store.find_by_ticket(42).await.unwrap().is_none());
        assert!(store.get(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_user() {
        let (_dir, store) = open_temp().await;
        store.upsert(555, 1001, 789).await.unwrap();
        store.upsert(555, 1002, 790).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.find_by_channel(1002).await.unwrap(), Some(790));
        assert!(store.find_by_channel(1001).await.unwrap().is_none());
        assert!(store.find_by_ticket(789).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_ticket_prefers_latest_row() {
        let (_dir, store) = open_temp().await;
        store.upsert(1, 1001, 789).await.unwrap();
        store.upsert(2, 2002, 789).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.find_by_ticket(789).await.unwrap(), Some(2002));
    }

    #[tokio::test]
    async fn test_large_snowflakes_round_trip() {
        let (_dir, store) = open_temp().await;
        let user = 1_234_567_890_123_456_789u64;
        let channel = 1_111_111_111_111_111_111u64;
        store.upsert(user, channel, 42).await.unwrap();
        assert_eq!(store.find_by_ticket(42).await.unwrap(), Some(channel));
    }

    #[tokio::test]
    async fn test_reopen_preserves_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tickets.db");
        {
            let store = MappingStore::open(&path).await.unwrap();
            store.upsert(7, 70, 700).await.unwrap();
        }
        let store = MappingStore::open(&path).await.unwrap();
        assert_eq!(store.find_by_channel(70).await.unwrap(), Some(700));
    }
}
