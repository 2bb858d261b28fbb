//! Real-time event types exchanged over a meeting connection.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}` in
//! both directions. Inbound payload fields are optional so that missing
//! fields can be reported as `INVALID_PARAMETERS` instead of a parse error.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, MeetupError};
use crate::message::Message;

/// Chat message sent by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub room_id: Option<String>,
    pub user_id: Option<String>,
    pub data: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Position update sent by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPayload {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub room_id: Option<String>,
    pub user_id: Option<String>,
}

/// Events a client may send after the connection is established.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum InboundEvent {
    Message(ChatPayload),
    Location(LocationPayload),
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum OutboundEvent {
    /// Another participant joined the room.
    UserJoined { user_id: String },

    /// A participant left the room.
    UserLeft { user_id: String },

    /// A chat message relayed from the other participant.
    Message { user_id: String, message: Message },

    /// Ephemeral position of the other participant.
    Location {
        user_id: String,
        latitude: f64,
        longitude: f64,
        /// Milliseconds since the Unix epoch.
        timestamp: i64,
    },

    /// Failure addressed to the originating connection only.
    Error { code: ErrorCode, message: String },

    /// Places around the computed meetup point.
    PointsOfInterest {
        places_of_interest: Vec<serde_json::Value>,
    },
}

impl OutboundEvent {
    /// Build the `error` event for a failure, hiding non-public detail.
    pub fn from_error(err: &MeetupError) -> Self {
        OutboundEvent::Error {
            code: err.code(),
            message: err.public_message(),
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::UserJoined { .. } => "userJoined",
            OutboundEvent::UserLeft { .. } => "userLeft",
            OutboundEvent::Message { .. } => "message",
            OutboundEvent::Location { .. } => "location",
            OutboundEvent::Error { .. } => "error",
            OutboundEvent::PointsOfInterest { .. } => "pointsOfInterest",
        }
    }
}
