//! SQLite message repository implementation.
//!
//! Implements `MessageRepository` from `rendezvous-core` using sqlx with split
//! read/write pools. Timestamps are stored as fixed-width RFC 3339 strings so
//! the `(room_id, timestamp DESC)` index orders rows chronologically.

use chrono::{DateTime, Utc};
use rendezvous_core::repository::message::MessageRepository;
use rendezvous_types::error::RepositoryError;
use rendezvous_types::message::{Message, MessageType, format_timestamp};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `MessageRepository`.
pub struct SqliteMessageRepository {
    pool: DatabasePool,
}

impl SqliteMessageRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct MessageRow {
    id: String,
    room_id: String,
    sender: String,
    kind: String,
    data: String,
    timestamp: String,
    is_system_message: bool,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            room_id: row.try_get("room_id")?,
            sender: row.try_get("sender")?,
            kind: row.try_get("kind")?,
            data: row.try_get("data")?,
            timestamp: row.try_get("timestamp")?,
            is_system_message: row.try_get("is_system_message")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let id = self
            .id
            .parse::<Uuid>()
            .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))?;
        let kind = self
            .kind
            .parse::<MessageType>()
            .map_err(RepositoryError::Query)?;
        let data: serde_json::Value = serde_json::from_str(&self.data)
            .map_err(|e| RepositoryError::Query(format!("invalid message data JSON: {e}")))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))?;

        Ok(Message {
            id,
            room_id: self.room_id,
            sender: self.sender,
            kind,
            data,
            timestamp,
            is_system_message: self.is_system_message,
        })
    }
}

fn rows_to_messages(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Message>, RepositoryError> {
    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        let r = MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        messages.push(r.into_message()?);
    }
    Ok(messages)
}

// ---------------------------------------------------------------------------
// MessageRepository impl
// ---------------------------------------------------------------------------

impl MessageRepository for SqliteMessageRepository {
    async fn create(&self, message: &Message) -> Result<Message, RepositoryError> {
        let data_json = serde_json::to_string(&message.data)
            .map_err(|e| RepositoryError::Query(format!("serialize data: {e}")))?;

        sqlx::query(
            r#"INSERT INTO messages
               (id, room_id, sender, kind, data, timestamp, is_system_message)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(&message.room_id)
        .bind(&message.sender)
        .bind(message.kind.as_str())
        .bind(&data_json)
        .bind(format_timestamp(&message.timestamp))
        .bind(message.is_system_message)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(message.clone())
    }

    async fn find_by_room_id(
        &self,
        room_id: &str,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM messages
               WHERE room_id = ?
               ORDER BY timestamp DESC, id DESC
               LIMIT ?"#,
        )
        .bind(room_id)
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_messages(&rows)
    }

    async fn find_by_room_id_paginated(
        &self,
        room_id: &str,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM messages
               WHERE room_id = ?1 AND (?2 IS NULL OR timestamp < ?2)
               ORDER BY timestamp DESC, id DESC
               LIMIT ?3"#,
        )
        .bind(room_id)
        .bind(before.as_ref().map(format_timestamp))
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_messages(&rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SubsecRound};
    use serde_json::json;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    /// Five text messages in room M1, one second apart, oldest first.
    async fn seed(repo: &SqliteMessageRepository) -> Vec<Message> {
        let base = (Utc::now() - Duration::minutes(5)).trunc_subsecs(0);
        let mut seeded = Vec::new();
        for i in 1..=5 {
            let mut msg = Message::new("M1", "alice", MessageType::Text, json!(format!("m{i}")));
            msg.timestamp = base + Duration::seconds(i);
            seeded.push(repo.create(&msg).await.unwrap());
        }
        seeded
    }

    #[tokio::test]
    async fn test_create_round_trips_fields() {
        let repo = SqliteMessageRepository::new(test_pool().await);
        let msg = Message::new("M1", "alice", MessageType::Call, json!({"duration": 42}));
        repo.create(&msg).await.unwrap();

        let system = Message::system("M1", json!("alice joined"));
        repo.create(&system).await.unwrap();

        let stored = repo.find_by_room_id("M1", 10).await.unwrap();
        assert_eq!(stored.len(), 2);
        let call = stored.iter().find(|m| m.id == msg.id).unwrap();
        assert_eq!(call, &msg);
        let sys = stored.iter().find(|m| m.id == system.id).unwrap();
        assert!(sys.is_system_message);
        assert_eq!(sys.sender, "system");
    }

    #[tokio::test]
    async fn test_pages_walk_newest_first() {
        let repo = SqliteMessageRepository::new(test_pool().await);
        let seeded = seed(&repo).await;
        let ts: Vec<_> = seeded.iter().map(|m| m.timestamp).collect();

        let page = repo.find_by_room_id_paginated("M1", None, 2).await.unwrap();
        assert_eq!(
            page.iter().map(|m| m.timestamp).collect::<Vec<_>>(),
            vec![ts[4], ts[3]]
        );

        let page = repo
            .find_by_room_id_paginated("M1", Some(ts[3]), 2)
            .await
            .unwrap();
        assert_eq!(
            page.iter().map(|m| m.timestamp).collect::<Vec<_>>(),
            vec![ts[2], ts[1]]
        );

        let page = repo
            .find_by_room_id_paginated("M1", Some(ts[1]), 2)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].data, json!("m1"));
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let repo = SqliteMessageRepository::new(test_pool().await);
        seed(&repo).await;
        repo.create(&Message::new("M2", "bob", MessageType::Text, json!("other")))
            .await
            .unwrap();

        assert_eq!(repo.find_by_room_id("M2", 10).await.unwrap().len(), 1);
        assert_eq!(repo.find_by_room_id("M1", 3).await.unwrap().len(), 3);
        assert!(repo.find_by_room_id("M3", 10).await.unwrap().is_empty());
    }
}
