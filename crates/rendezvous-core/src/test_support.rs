//! In-memory repository fakes shared by the unit tests of this crate.
//!
//! `MemoryRoomRepository::add_member` is a plain read-modify-write with a
//! yield in the middle, so any capacity guarantee observed in tests comes from
//! the caller's serialization and not from the store.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use rendezvous_types::error::RepositoryError;
use rendezvous_types::message::Message;
use rendezvous_types::room::{GeoPoint, Member, Room};

use crate::repository::message::MessageRepository;
use crate::repository::room::RoomRepository;
use crate::resilience::client::{HttpTransport, UpstreamError, UpstreamRequest};

#[derive(Default)]
pub struct MemoryRoomRepository {
    rooms: Mutex<HashMap<String, Room>>,
    failing: AtomicBool,
}

impl MemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a connection error.
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self, meeting_id: &str) -> Option<Room> {
        self.rooms.lock().unwrap().get(meeting_id).cloned()
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        Ok(())
    }
}

impl RoomRepository for MemoryRoomRepository {
    async fn find_by_meeting_id(&self, meeting_id: &str) -> Result<Option<Room>, RepositoryError> {
        self.check()?;
        let room = self.snapshot(meeting_id);
        tokio::task::yield_now().await;
        Ok(room)
    }

    async fn create(&self, room: &Room) -> Result<Room, RepositoryError> {
        self.check()?;
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.contains_key(&room.meeting_id) {
            return Err(RepositoryError::Conflict(room.meeting_id.clone()));
        }
        rooms.insert(room.meeting_id.clone(), room.clone());
        Ok(room.clone())
    }

    async fn add_member(
        &self,
        meeting_id: &str,
        member: &Member,
        capacity: usize,
    ) -> Result<Room, RepositoryError> {
        self.check()?;
        let mut room = self.snapshot(meeting_id).ok_or(RepositoryError::NotFound)?;
        tokio::task::yield_now().await;
        if room.has_member(&member.user_id) {
            return Ok(room);
        }
        if room.members.len() >= capacity {
            return Err(RepositoryError::Conflict("room is full".into()));
        }
        room.members.push(member.clone());
        room.updated_at = Utc::now();
        self.rooms
            .lock()
            .unwrap()
            .insert(meeting_id.to_string(), room.clone());
        Ok(room)
    }

    async fn remove_member(
        &self,
        meeting_id: &str,
        user_id: &str,
    ) -> Result<Option<Room>, RepositoryError> {
        self.check()?;
        let mut rooms = self.rooms.lock().unwrap();
        Ok(rooms.get_mut(meeting_id).map(|room| {
            room.members.retain(|m| m.user_id != user_id);
            room.updated_at = Utc::now();
            room.clone()
        }))
    }

    async fn update_common_point(
        &self,
        meeting_id: &str,
        point: GeoPoint,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Room>, RepositoryError> {
        self.check()?;
        let mut rooms = self.rooms.lock().unwrap();
        Ok(rooms.get_mut(meeting_id).map(|room| {
            room.common_point = Some(point);
            room.updated_at = updated_at;
            room.clone()
        }))
    }
}

#[derive(Default)]
pub struct MemoryMessageRepository {
    messages: Mutex<Vec<Message>>,
    failing: AtomicBool,
}

impl MemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn stored(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    fn newest_first(&self, room_id: &str, before: Option<DateTime<Utc>>) -> Vec<Message> {
        let mut rows: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.room_id == room_id)
            .filter(|m| before.is_none_or(|b| m.timestamp < b))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows
    }
}

impl MessageRepository for MemoryMessageRepository {
    async fn create(&self, message: &Message) -> Result<Message, RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("disk I/O error".into()));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(message.clone())
    }

    async fn find_by_room_id(
        &self,
        room_id: &str,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let mut rows = self.newest_first(room_id, None);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn find_by_room_id_paginated(
        &self,
        room_id: &str,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let mut rows = self.newest_first(room_id, before);
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

/// Scripted transport: pops one outcome per call, `None` means "hang".
#[derive(Default)]
pub struct ScriptedTransport {
    pub outcomes: Mutex<VecDeque<Option<Result<serde_json::Value, UpstreamError>>>>,
    pub requests: Mutex<Vec<UpstreamRequest>>,
    pub calls: AtomicU32,
}

impl ScriptedTransport {
    pub fn with(outcomes: Vec<Option<Result<serde_json::Value, UpstreamError>>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            ..Default::default()
        }
    }

    pub fn push(&self, outcome: Option<Result<serde_json::Value, UpstreamError>>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }
}

impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: UpstreamRequest) -> Result<serde_json::Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let next = self.outcomes.lock().unwrap().pop_front();
        match next {
            Some(Some(outcome)) => outcome,
            Some(None) => std::future::pending().await,
            None => Err(UpstreamError {
                status: None,
                message: "no scripted response".into(),
            }),
        }
    }
}

pub fn status(code: u16) -> Option<Result<serde_json::Value, UpstreamError>> {
    Some(Err(UpstreamError {
        status: Some(code),
        message: format!("upstream answered {code}"),
    }))
}
