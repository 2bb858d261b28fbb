//! Room coordinator: admission control and membership transitions.
//!
//! Every membership change for a meeting runs inside a critical section keyed
//! by `meeting_id`, so the read of the member list and the write that follows
//! cannot interleave with another admission or eviction for the same meeting.
//! Different meetings never contend. The store's own conditional insert
//! (`RoomRepository::add_member`) backs this up across processes.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use rendezvous_types::error::{MeetupError, RepositoryError};
use rendezvous_types::room::{GeoPoint, Member, ROOM_CAPACITY, Room};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::repository::room::RoomRepository;

/// Owns admission, capacity enforcement and membership transitions.
///
/// Generic over the room repository so the coordinator stays independent of
/// any storage technology.
pub struct RoomCoordinator<R: RoomRepository> {
    repo: R,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held for the duration of a membership change. Dropping it releases the
/// meeting's mutex and discards the entry once nobody else is waiting on it.
struct MeetingGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    meeting_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for MeetingGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.meeting_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl<R: RoomRepository> RoomCoordinator<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            locks: DashMap::new(),
        }
    }

    /// Access the room repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    async fn lock(&self, meeting_id: &str) -> MeetingGuard<'_> {
        let mutex = self
            .locks
            .entry(meeting_id.to_string())
            .or_default()
            .clone();
        let guard = mutex.lock_owned().await;
        MeetingGuard {
            locks: &self.locks,
            meeting_id: meeting_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Admit `user_id` into the meeting, creating the room on first use.
    ///
    /// Re-admitting a present member returns the room unchanged. A distinct
    /// user arriving at a full room gets `RoomFull` and the room is untouched.
    pub async fn admit(&self, meeting_id: &str, user_id: &str) -> Result<Room, MeetupError> {
        require("meetingId", meeting_id)?;
        require("userId", user_id)?;

        let _guard = self.lock(meeting_id).await;

        let room = match self.repo.find_by_meeting_id(meeting_id).await? {
            Some(room) => room,
            None => {
                let room = Room::with_first_member(meeting_id, Member::new(user_id));
                match self.repo.create(&room).await {
                    Ok(created) => {
                        info!(meeting_id, user_id, "created room");
                        return Ok(created);
                    }
                    // Another process created it first; join the existing room.
                    Err(RepositoryError::Conflict(_)) => self
                        .repo
                        .find_by_meeting_id(meeting_id)
                        .await?
                        .ok_or(MeetupError::RoomNotFound)?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        if room.has_member(user_id) {
            info!(meeting_id, user_id, "user already in room, nothing to do");
            return Ok(room);
        }
        if room.members.len() >= ROOM_CAPACITY {
            warn!(meeting_id, user_id, "room is full, admission refused");
            return Err(MeetupError::RoomFull);
        }

        let room = self
            .repo
            .add_member(meeting_id, &Member::new(user_id), ROOM_CAPACITY)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => MeetupError::RoomFull,
                RepositoryError::NotFound => MeetupError::RoomNotFound,
                other => MeetupError::Storage(other),
            })?;
        info!(meeting_id, user_id, members = room.members.len(), "user joined room");
        Ok(room)
    }

    /// Remove `user_id` from the meeting. Evicting a non-member is a no-op.
    pub async fn evict(&self, meeting_id: &str, user_id: &str) -> Result<Room, MeetupError> {
        require("meetingId", meeting_id)?;
        require("userId", user_id)?;

        let _guard = self.lock(meeting_id).await;

        let room = self
            .repo
            .find_by_meeting_id(meeting_id)
            .await?
            .ok_or(MeetupError::RoomNotFound)?;
        if !room.has_member(user_id) {
            debug!(meeting_id, user_id, "user not in room, nothing to evict");
            return Ok(room);
        }

        let room = self
            .repo
            .remove_member(meeting_id, user_id)
            .await?
            .ok_or(MeetupError::RoomNotFound)?;
        info!(meeting_id, user_id, members = room.members.len(), "user left room");
        Ok(room)
    }

    /// Store the computed meetup point, replacing any previous value.
    pub async fn set_common_point(
        &self,
        meeting_id: &str,
        point: GeoPoint,
    ) -> Result<Room, MeetupError> {
        require("meetingId", meeting_id)?;
        if !point.is_valid() {
            return Err(MeetupError::invalid("coordinates out of range"));
        }

        let room = self
            .repo
            .update_common_point(meeting_id, point, Utc::now())
            .await?
            .ok_or(MeetupError::RoomNotFound)?;
        info!(
            meeting_id,
            latitude = point.latitude,
            longitude = point.longitude,
            "updated common point"
        );
        Ok(room)
    }

    pub async fn find(&self, meeting_id: &str) -> Result<Option<Room>, MeetupError> {
        require("meetingId", meeting_id)?;
        Ok(self.repo.find_by_meeting_id(meeting_id).await?)
    }
}

fn require(field: &str, value: &str) -> Result<(), MeetupError> {
    if value.trim().is_empty() {
        return Err(MeetupError::invalid(format!("{field} is required")));
    }
    Ok(())
}
