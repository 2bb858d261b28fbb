//! SQLite room repository implementation.
//!
//! Implements `RoomRepository` from `rendezvous-core`. Members live in their
//! own table keyed by `(meeting_id, user_id)`, which rules out duplicate
//! members. Capacity is enforced by a conditional insert that counts the
//! current members in the same statement, so it holds even when several
//! processes share the database.

use chrono::{DateTime, Utc};
use rendezvous_core::repository::room::RoomRepository;
use rendezvous_types::error::RepositoryError;
use rendezvous_types::message::format_timestamp;
use rendezvous_types::room::{GeoPoint, Member, Room};
use sqlx::Row;
use sqlx::sqlite::SqlitePool;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `RoomRepository`.
pub struct SqliteRoomRepository {
    pool: DatabasePool,
}

impl SqliteRoomRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct RoomRow {
    meeting_id: String,
    room_id: String,
    common_point: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RoomRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            meeting_id: row.try_get("meeting_id")?,
            room_id: row.try_get("room_id")?,
            common_point: row.try_get("common_point")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_room(self, members: Vec<Member>) -> Result<Room, RepositoryError> {
        let common_point = self
            .common_point
            .as_deref()
            .map(|json| {
                serde_json::from_str::<GeoPoint>(json)
                    .map_err(|e| RepositoryError::Query(format!("invalid common_point JSON: {e}")))
            })
            .transpose()?;

        Ok(Room {
            meeting_id: self.meeting_id,
            room_id: self.room_id,
            members,
            common_point,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

async fn load_room(pool: &SqlitePool, meeting_id: &str) -> Result<Option<Room>, RepositoryError> {
    let row = sqlx::query(
        "SELECT meeting_id, room_id, common_point, created_at, updated_at FROM rooms WHERE meeting_id = ?",
    )
    .bind(meeting_id)
    .fetch_optional(pool)
    .await
    .map_err(query_error)?;

    let Some(row) = row else {
        return Ok(None);
    };
    let room_row = RoomRow::from_row(&row).map_err(query_error)?;

    let member_rows = sqlx::query(
        "SELECT user_id, joined_at FROM room_members WHERE meeting_id = ? ORDER BY joined_at, rowid",
    )
    .bind(meeting_id)
    .fetch_all(pool)
    .await
    .map_err(query_error)?;

    let mut members = Vec::with_capacity(member_rows.len());
    for row in &member_rows {
        let user_id: String = row.try_get("user_id").map_err(query_error)?;
        let joined_at: String = row.try_get("joined_at").map_err(query_error)?;
        members.push(Member {
            user_id,
            joined_at: parse_datetime(&joined_at)?,
        });
    }

    room_row.into_room(members).map(Some)
}

// ---------------------------------------------------------------------------
// RoomRepository impl
// ---------------------------------------------------------------------------

impl RoomRepository for SqliteRoomRepository {
    async fn find_by_meeting_id(&self, meeting_id: &str) -> Result<Option<Room>, RepositoryError> {
        load_room(&self.pool.reader, meeting_id).await
    }

    async fn create(&self, room: &Room) -> Result<Room, RepositoryError> {
        let common_point = room
            .common_point
            .map(|p| serde_json::to_string(&p))
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("serialize common_point: {e}")))?;

        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        sqlx::query(
            r#"INSERT INTO rooms (meeting_id, room_id, common_point, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(&room.meeting_id)
        .bind(&room.room_id)
        .bind(&common_point)
        .bind(format_timestamp(&room.created_at))
        .bind(format_timestamp(&room.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("room '{}' already exists", room.meeting_id))
            }
            other => query_error(other),
        })?;

        for member in &room.members {
            sqlx::query(
                "INSERT INTO room_members (meeting_id, user_id, joined_at) VALUES (?, ?, ?)",
            )
            .bind(&room.meeting_id)
            .bind(&member.user_id)
            .bind(format_timestamp(&member.joined_at))
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        }

        tx.commit().await.map_err(query_error)?;

        load_room(&self.pool.writer, &room.meeting_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn add_member(
        &self,
        meeting_id: &str,
        member: &Member,
        capacity: usize,
    ) -> Result<Room, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM rooms WHERE meeting_id = ?")
            .bind(meeting_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error)?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let inserted = sqlx::query(
            r#"INSERT OR IGNORE INTO room_members (meeting_id, user_id, joined_at)
               SELECT ?1, ?2, ?3
               WHERE (SELECT COUNT(*) FROM room_members WHERE meeting_id = ?1) < ?4"#,
        )
        .bind(meeting_id)
        .bind(&member.user_id)
        .bind(format_timestamp(&member.joined_at))
        .bind(capacity as i64)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?
        .rows_affected();

        if inserted == 0 {
            let present: Option<(i64,)> = sqlx::query_as(
                "SELECT 1 FROM room_members WHERE meeting_id = ? AND user_id = ?",
            )
            .bind(meeting_id)
            .bind(&member.user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error)?;
            if present.is_none() {
                return Err(RepositoryError::Conflict(format!(
                    "room '{meeting_id}' is at capacity"
                )));
            }
        } else {
            sqlx::query("UPDATE rooms SET updated_at = ? WHERE meeting_id = ?")
                .bind(format_timestamp(&Utc::now()))
                .bind(meeting_id)
                .execute(&mut *tx)
                .await
                .map_err(query_error)?;
        }

        tx.commit().await.map_err(query_error)?;

        load_room(&self.pool.writer, meeting_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn remove_member(
        &self,
        meeting_id: &str,
        user_id: &str,
    ) -> Result<Option<Room>, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let updated = sqlx::query("UPDATE rooms SET updated_at = ? WHERE meeting_id = ?")
            .bind(format_timestamp(&Utc::now()))
            .bind(meeting_id)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?
            .rows_affected();
        if updated == 0 {
            return Ok(None);
        }

        sqlx::query("DELETE FROM room_members WHERE meeting_id = ? AND user_id = ?")
            .bind(meeting_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;

        load_room(&self.pool.writer, meeting_id).await
    }

    async fn update_common_point(
        &self,
        meeting_id: &str,
        point: GeoPoint,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Room>, RepositoryError> {
        let point_json = serde_json::to_string(&point)
            .map_err(|e| RepositoryError::Query(format!("serialize common_point: {e}")))?;

        let updated = sqlx::query(
            "UPDATE rooms SET common_point = ?, updated_at = ? WHERE meeting_id = ?",
        )
        .bind(&point_json)
        .bind(format_timestamp(&updated_at))
        .bind(meeting_id)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        load_room(&self.pool.writer, meeting_id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn repo_with_room(meeting_id: &str, user_id: &str) -> SqliteRoomRepository {
        let repo = SqliteRoomRepository::new(test_pool().await);
        repo.create(&Room::with_first_member(meeting_id, Member::new(user_id)))
            .await
            .unwrap();
        repo
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = repo_with_room("M1", "alice").await;

        let room = repo.find_by_meeting_id("M1").await.unwrap().unwrap();
        assert_eq!(room.room_id, "room-M1");
        assert_eq!(room.member_ids(), vec!["alice"]);
        assert!(room.common_point.is_none());

        assert!(repo.find_by_meeting_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_is_conflict() {
        let repo = repo_with_room("M1", "alice").await;
        let err = repo
            .create(&Room::with_first_member("M1", Member::new("bob")))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_add_member_respects_capacity() {
        let repo = repo_with_room("M1", "alice").await;

        let room = repo.add_member("M1", &Member::new("bob"), 2).await.unwrap();
        assert_eq!(room.member_ids(), vec!["alice", "bob"]);

        let err = repo
            .add_member("M1", &Member::new("carol"), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        // Existing member is a no-op even when full.
        let room = repo.add_member("M1", &Member::new("bob"), 2).await.unwrap();
        assert_eq!(room.members.len(), 2);
    }

    #[tokio::test]
    async fn test_add_member_to_missing_room() {
        let repo = SqliteRoomRepository::new(test_pool().await);
        let err = repo
            .add_member("M1", &Member::new("bob"), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_concurrent_add_member_never_exceeds_capacity() {
        let repo = Arc::new(repo_with_room("M1", "alice").await);
        let mut handles = Vec::new();
        for i in 0..6 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.add_member("M1", &Member::new(format!("user-{i}")), 2).await
            }));
        }
        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        let room = repo.find_by_meeting_id("M1").await.unwrap().unwrap();
        assert_eq!(room.members.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_member() {
        let repo = repo_with_room("M1", "alice").await;
        repo.add_member("M1", &Member::new("bob"), 2).await.unwrap();

        let room = repo.remove_member("M1", "alice").await.unwrap().unwrap();
        assert_eq!(room.member_ids(), vec!["bob"]);

        // Removing a non-member leaves the room unchanged.
        let room = repo.remove_member("M1", "alice").await.unwrap().unwrap();
        assert_eq!(room.member_ids(), vec!["bob"]);

        assert!(repo.remove_member("missing", "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_common_point() {
        let repo = repo_with_room("M1", "alice").await;

        let room = repo
            .update_common_point("M1", GeoPoint::new(12.5, 77.5), Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(room.common_point, Some(GeoPoint::new(12.5, 77.5)));

        let reloaded = repo.find_by_meeting_id("M1").await.unwrap().unwrap();
        assert_eq!(reloaded.common_point, Some(GeoPoint::new(12.5, 77.5)));

        assert!(
            repo.update_common_point("missing", GeoPoint::new(0.0, 0.0), Utc::now())
                .await
                .unwrap()
                .is_none()
        );
    }
}
