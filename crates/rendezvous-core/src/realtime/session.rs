//! Connection session manager.
//!
//! Binds each live connection to one (meeting, user) pair and routes its
//! inbound events. Per connection the transport guarantees
//! `connect -> {message | location}* -> disconnect`, with disconnect called
//! at most once. Handlers for different connections run concurrently; the
//! only cross-connection critical section is room membership, which the
//! `RoomCoordinator` serializes per meeting.
//!
//! A user may hold several live connections to the same meeting (a client
//! reconnecting before its old socket is torn down). The user stays a room
//! member until the last of those connections disconnects.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rendezvous_types::error::MeetupError;
use rendezvous_types::event::{ChatPayload, LocationPayload, OutboundEvent};
use rendezvous_types::message::Message;
use rendezvous_types::room::{GeoPoint, Room};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use super::hub::{Broadcaster, ConnectionId};
use crate::location::map::MapService;
use crate::location::service::LocationService;
use crate::message::service::MessageService;
use crate::repository::message::MessageRepository;
use crate::repository::room::RoomRepository;
use crate::room::coordinator::RoomCoordinator;

/// In-memory binding of one admitted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub meeting_id: String,
    pub user_id: String,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    pub fn group_id(&self) -> String {
        Room::group_id(&self.meeting_id)
    }
}

/// Serves every live connection of the process.
pub struct SessionManager<R, M, S, B>
where
    R: RoomRepository,
    M: MessageRepository,
    S: MapService,
    B: Broadcaster,
{
    rooms: Arc<RoomCoordinator<R>>,
    messages: Arc<MessageService<M>>,
    locations: Arc<LocationService<R, S>>,
    hub: Arc<B>,
    sessions: DashMap<ConnectionId, Session>,
    /// Live admitted connections per (meeting, user).
    attachments: DashMap<MemberKey, Arc<Mutex<usize>>>,
    shutting_down: AtomicBool,
}

type MemberKey = (String, String);

/// Serializes admission and teardown for one (meeting, user) pair and
/// exposes its live-connection count. Dropping it discards the entry once
/// the count is zero and nobody else holds it.
struct AttachmentGuard<'a> {
    attachments: &'a DashMap<MemberKey, Arc<Mutex<usize>>>,
    key: MemberKey,
    count: OwnedMutexGuard<usize>,
}

impl Drop for AttachmentGuard<'_> {
    fn drop(&mut self) {
        if *self.count == 0 {
            // One reference in the map, one held by this guard.
            self.attachments
                .remove_if(&self.key, |_, count| Arc::strong_count(count) == 2);
        }
    }
}

impl<R, M, S, B> SessionManager<R, M, S, B>
where
    R: RoomRepository,
    M: MessageRepository,
    S: MapService,
    B: Broadcaster,
{
    pub fn new(
        rooms: Arc<RoomCoordinator<R>>,
        messages: Arc<MessageService<M>>,
        locations: Arc<LocationService<R, S>>,
        hub: Arc<B>,
    ) -> Self {
        Self {
            rooms,
            messages,
            locations,
            hub,
            sessions: DashMap::new(),
            attachments: DashMap::new(),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn session(&self, connection_id: ConnectionId) -> Option<Session> {
        self.sessions.get(&connection_id).map(|s| s.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Number of live admitted connections held by a user in a meeting.
    pub async fn live_connections(&self, meeting_id: &str, user_id: &str) -> usize {
        let count = self
            .attachments
            .get(&(meeting_id.to_string(), user_id.to_string()))
            .map(|count| Arc::clone(&count));
        match count {
            Some(count) => *count.lock().await,
            None => 0,
        }
    }

    async fn attach_lock(&self, meeting_id: &str, user_id: &str) -> AttachmentGuard<'_> {
        let key = (meeting_id.to_string(), user_id.to_string());
        let mutex = self.attachments.entry(key.clone()).or_default().clone();
        let count = mutex.lock_owned().await;
        AttachmentGuard {
            attachments: &self.attachments,
            key,
            count,
        }
    }

    /// Admit a new connection into its meeting.
    ///
    /// On any failure the connection is asked to close. `RoomFull` is the
    /// only failure reported to the client, as an `error` event queued ahead
    /// of the close.
    pub async fn on_connect(
        &self,
        connection_id: ConnectionId,
        meeting_id: &str,
        user_id: &str,
    ) -> Result<Room, MeetupError> {
        if meeting_id.trim().is_empty() || user_id.trim().is_empty() {
            error!(connection_id = %connection_id, "missing meetId or userId, closing connection");
            self.hub.close(connection_id);
            return Err(MeetupError::invalid("meetId and userId are required"));
        }
        if self.is_shutting_down() {
            self.hub.close(connection_id);
            return Err(MeetupError::ServiceUnavailable);
        }

        let mut attachment = self.attach_lock(meeting_id, user_id).await;
        let room = match self.rooms.admit(meeting_id, user_id).await {
            Ok(room) => room,
            Err(e) => {
                if matches!(e, MeetupError::RoomFull) {
                    self.hub.emit_to(connection_id, OutboundEvent::from_error(&e));
                }
                warn!(
                    connection_id = %connection_id,
                    meeting_id,
                    user_id,
                    error = %e,
                    "admission failed, closing connection"
                );
                self.hub.close(connection_id);
                return Err(e);
            }
        };

        *attachment.count += 1;
        self.hub.join_group(connection_id, &room.room_id);
        self.sessions.insert(
            connection_id,
            Session {
                connection_id,
                meeting_id: meeting_id.to_string(),
                user_id: user_id.to_string(),
                connected_at: Utc::now(),
            },
        );
        self.hub.broadcast_except(
            &room.room_id,
            connection_id,
            OutboundEvent::UserJoined {
                user_id: user_id.to_string(),
            },
        );
        info!(connection_id = %connection_id, meeting_id, user_id, "user joined");
        Ok(room)
    }

    /// Persist a chat message and relay it to the other member.
    pub async fn on_message(&self, connection_id: ConnectionId, payload: ChatPayload) {
        if let Err(e) = self.relay_message(connection_id, payload).await {
            self.report(connection_id, "message", &e);
        }
    }

    async fn relay_message(
        &self,
        connection_id: ConnectionId,
        payload: ChatPayload,
    ) -> Result<Message, MeetupError> {
        let session = self.bound_session(connection_id)?;
        let (Some(room_id), Some(user_id), Some(data)) =
            (payload.room_id, payload.user_id, payload.data)
        else {
            return Err(MeetupError::invalid("Missing required message parameters"));
        };
        check_binding(&session, &room_id, &user_id)?;

        let message = self
            .messages
            .save(&room_id, &user_id, data, payload.kind.as_deref().unwrap_or_default())
            .await?;
        self.hub.broadcast_except(
            &session.group_id(),
            connection_id,
            OutboundEvent::Message {
                user_id,
                message: message.clone(),
            },
        );
        Ok(message)
    }

    /// Relay an ephemeral position update to the other member.
    pub async fn on_location(&self, connection_id: ConnectionId, payload: LocationPayload) {
        if let Err(e) = self.relay_location(connection_id, payload) {
            self.report(connection_id, "location", &e);
        }
    }

    fn relay_location(
        &self,
        connection_id: ConnectionId,
        payload: LocationPayload,
    ) -> Result<(), MeetupError> {
        let session = self.bound_session(connection_id)?;
        let (Some(latitude), Some(longitude), Some(room_id), Some(user_id)) = (
            payload.latitude,
            payload.longitude,
            payload.room_id,
            payload.user_id,
        ) else {
            return Err(MeetupError::invalid("Missing required location parameters"));
        };
        check_binding(&session, &room_id, &user_id)?;

        let point = GeoPoint::new(latitude, longitude);
        if !point.is_valid() {
            return Err(MeetupError::invalid("coordinates out of range"));
        }
        self.locations
            .record_position(&session.meeting_id, &session.user_id, point);
        self.hub.broadcast_except(
            &session.group_id(),
            connection_id,
            OutboundEvent::Location {
                user_id,
                latitude,
                longitude,
                timestamp: Utc::now().timestamp_millis(),
            },
        );
        Ok(())
    }

    /// Report an inbound frame that could not be decoded.
    pub fn on_invalid_frame(&self, connection_id: ConnectionId, detail: &str) {
        let e = MeetupError::invalid(format!("malformed event: {detail}"));
        self.report(connection_id, "frame", &e);
    }

    /// Tear down a connection: release its resources, then evict the user
    /// unless another of their connections is still live.
    ///
    /// Eviction failures are logged and swallowed.
    pub async fn on_disconnect(&self, connection_id: ConnectionId) {
        let session = self.sessions.remove(&connection_id).map(|(_, s)| s);
        self.hub.release(connection_id);

        let Some(session) = session else {
            return;
        };

        let mut attachment = self.attach_lock(&session.meeting_id, &session.user_id).await;
        let remaining = attachment.count.saturating_sub(1);
        *attachment.count = remaining;
        if remaining > 0 {
            debug!(
                connection_id = %connection_id,
                meeting_id = %session.meeting_id,
                user_id = %session.user_id,
                remaining,
                "user still connected elsewhere, keeping membership"
            );
            return;
        }

        self.locations
            .forget(&session.meeting_id, &session.user_id);

        match self.rooms.evict(&session.meeting_id, &session.user_id).await {
            Ok(_) => {
                self.hub.broadcast_except(
                    &session.group_id(),
                    connection_id,
                    OutboundEvent::UserLeft {
                        user_id: session.user_id.clone(),
                    },
                );
                info!(
                    connection_id = %connection_id,
                    meeting_id = %session.meeting_id,
                    user_id = %session.user_id,
                    "user left"
                );
            }
            Err(e) => error!(
                connection_id = %connection_id,
                meeting_id = %session.meeting_id,
                user_id = %session.user_id,
                error = %e,
                "eviction failed during disconnect"
            ),
        }
    }

    /// Close every live connection. Runs once; later calls return 0.
    pub fn shutdown(&self) -> usize {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let ids = self.hub.connection_ids();
        for id in &ids {
            self.hub.close(*id);
        }
        info!(connections = ids.len(), "closing live connections for shutdown");
        ids.len()
    }

    fn bound_session(&self, connection_id: ConnectionId) -> Result<Session, MeetupError> {
        self.session(connection_id)
            .ok_or_else(|| MeetupError::invalid("connection has not joined a room"))
    }

    fn report(&self, connection_id: ConnectionId, event: &str, e: &MeetupError) {
        if e.is_operational() {
            warn!(connection_id = %connection_id, event, error = %e, "event rejected");
        } else {
            error!(connection_id = %connection_id, event, error = ?e, "event failed");
        }
        self.hub.emit_to(connection_id, OutboundEvent::from_error(e));
    }
}

fn check_binding(session: &Session, room_id: &str, user_id: &str) -> Result<(), MeetupError> {
    if room_id != session.meeting_id || user_id != session.user_id {
        return Err(MeetupError::invalid(
            "roomId and userId must match the connection",
        ));
    }
    Ok(())
}
