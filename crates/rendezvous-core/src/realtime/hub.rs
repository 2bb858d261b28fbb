//! In-process broadcast hub for live connections.
//!
//! Each registered connection owns a bounded queue of outbound events and a
//! cancellation token. Groups map a broadcast group id to the connections
//! subscribed to it. Delivery is best-effort: when a connection's queue is
//! full the event is dropped for that connection and never retried.

use std::collections::HashSet;

use dashmap::DashMap;
use rendezvous_types::event::OutboundEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifier of one live connection.
pub type ConnectionId = Uuid;

/// Group fan-out primitive used by the session manager.
///
/// All operations are synchronous and never wait on a slow receiver.
pub trait Broadcaster: Send + Sync {
    fn join_group(&self, connection_id: ConnectionId, group_id: &str);

    fn leave_group(&self, connection_id: ConnectionId, group_id: &str);

    /// Send an event to one connection.
    fn emit_to(&self, connection_id: ConnectionId, event: OutboundEvent);

    /// Send an event to every connection in a group.
    fn broadcast(&self, group_id: &str, event: OutboundEvent);

    /// Send an event to every connection in a group except `exclude`.
    fn broadcast_except(&self, group_id: &str, exclude: ConnectionId, event: OutboundEvent);

    /// Ask a connection to terminate once its queued events are written.
    fn close(&self, connection_id: ConnectionId);

    /// Drop every trace of a connection: group subscriptions and its queue.
    fn release(&self, connection_id: ConnectionId);

    fn connection_ids(&self) -> Vec<ConnectionId>;
}

struct ConnectionHandle {
    tx: mpsc::Sender<OutboundEvent>,
    closed: CancellationToken,
}

/// Receiving end of a registered connection, owned by its socket task.
pub struct Connection {
    pub id: ConnectionId,
    events: mpsc::Receiver<OutboundEvent>,
    closed: CancellationToken,
}

impl Connection {
    /// Next event to write, or `None` once the connection should terminate.
    ///
    /// Events queued before a close request are still returned first.
    pub async fn next_event(&mut self) -> Option<OutboundEvent> {
        tokio::select! {
            biased;
            event = self.events.recv() => event,
            _ = self.closed.cancelled() => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Non-blocking read of an already queued event.
    pub fn try_next_event(&mut self) -> Option<OutboundEvent> {
        self.events.try_recv().ok()
    }
}

/// Registry of live connections and their broadcast groups.
pub struct ConnectionHub {
    buffer: usize,
    connections: DashMap<ConnectionId, ConnectionHandle>,
    groups: DashMap<String, HashSet<ConnectionId>>,
    memberships: DashMap<ConnectionId, HashSet<String>>,
}

impl ConnectionHub {
    /// Create a hub whose connections queue up to `buffer` events each.
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            connections: DashMap::new(),
            groups: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    /// Register a new connection and hand back its receiving end.
    pub fn register(&self) -> Connection {
        let id = Uuid::now_v7();
        let (tx, events) = mpsc::channel(self.buffer);
        let closed = CancellationToken::new();
        self.connections.insert(
            id,
            ConnectionHandle {
                tx,
                closed: closed.clone(),
            },
        );
        debug!(connection_id = %id, "registered connection");
        Connection { id, events, closed }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn group_members(&self, group_id: &str) -> Vec<ConnectionId> {
        self.groups
            .get(group_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    fn deliver(&self, connection_id: ConnectionId, event: OutboundEvent) {
        let Some(handle) = self.connections.get(&connection_id) else {
            debug!(connection_id = %connection_id, event = event.name(), "connection gone, event dropped");
            return;
        };
        match handle.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(connection_id = %connection_id, event = event.name(), "outbound queue full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

impl Broadcaster for ConnectionHub {
    fn join_group(&self, connection_id: ConnectionId, group_id: &str) {
        if !self.connections.contains_key(&connection_id) {
            return;
        }
        self.groups
            .entry(group_id.to_string())
            .or_default()
            .insert(connection_id);
        self.memberships
            .entry(connection_id)
            .or_default()
            .insert(group_id.to_string());
    }

    fn leave_group(&self, connection_id: ConnectionId, group_id: &str) {
        if let Some(mut members) = self.groups.get_mut(group_id) {
            members.remove(&connection_id);
        }
        self.groups.remove_if(group_id, |_, members| members.is_empty());
        if let Some(mut groups) = self.memberships.get_mut(&connection_id) {
            groups.remove(group_id);
        }
        self.memberships
            .remove_if(&connection_id, |_, groups| groups.is_empty());
    }

    fn emit_to(&self, connection_id: ConnectionId, event: OutboundEvent) {
        self.deliver(connection_id, event);
    }

    fn broadcast(&self, group_id: &str, event: OutboundEvent) {
        for id in self.group_members(group_id) {
            self.deliver(id, event.clone());
        }
    }

    fn broadcast_except(&self, group_id: &str, exclude: ConnectionId, event: OutboundEvent) {
        for id in self.group_members(group_id) {
            if id != exclude {
                self.deliver(id, event.clone());
            }
        }
    }

    fn close(&self, connection_id: ConnectionId) {
        if let Some(handle) = self.connections.get(&connection_id) {
            handle.closed.cancel();
        }
    }

    fn release(&self, connection_id: ConnectionId) {
        if let Some((_, groups)) = self.memberships.remove(&connection_id) {
            for group_id in groups {
                if let Some(mut members) = self.groups.get_mut(&group_id) {
                    members.remove(&connection_id);
                }
                self.groups
                    .remove_if(&group_id, |_, members| members.is_empty());
            }
        }
        if let Some((_, handle)) = self.connections.remove(&connection_id) {
            handle.closed.cancel();
            debug!(connection_id = %connection_id, "released connection");
        }
    }

    fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }
}
