//! Room repository trait definition.

use chrono::{DateTime, Utc};
use rendezvous_types::error::RepositoryError;
use rendezvous_types::room::{GeoPoint, Member, Room};

/// Repository trait for room persistence.
///
/// Implementations live in rendezvous-infra (e.g., SqliteRoomRepository).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait RoomRepository: Send + Sync {
    /// Look up a room by its meeting id.
    fn find_by_meeting_id(
        &self,
        meeting_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Room>, RepositoryError>> + Send;

    /// Create a room with its initial members. Returns `Conflict` if the
    /// meeting already has a room.
    fn create(
        &self,
        room: &Room,
    ) -> impl std::future::Future<Output = Result<Room, RepositoryError>> + Send;

    /// Append a member, but only while the room holds fewer than `capacity`
    /// members. The count check and the insert are one atomic step.
    ///
    /// Returns `NotFound` if the room does not exist and `Conflict` if it is
    /// already at capacity. Adding an existing member returns the room
    /// unchanged.
    fn add_member(
        &self,
        meeting_id: &str,
        member: &Member,
        capacity: usize,
    ) -> impl std::future::Future<Output = Result<Room, RepositoryError>> + Send;

    /// Remove a member. Returns `None` if the room does not exist.
    fn remove_member(
        &self,
        meeting_id: &str,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Room>, RepositoryError>> + Send;

    /// Overwrite the computed meetup point. Returns `None` if the room does
    /// not exist.
    fn update_common_point(
        &self,
        meeting_id: &str,
        point: GeoPoint,
        updated_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<Room>, RepositoryError>> + Send;
}
