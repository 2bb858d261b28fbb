//! Meeting room domain types.
//!
//! A `Room` is the persisted admission record for one meeting. It holds at
//! most two members, unique by `user_id`, and optionally the meetup point
//! computed for the pair.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of participants admitted to a meeting.
pub const ROOM_CAPACITY: usize = 2;

/// A participant admitted to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            joined_at: Utc::now(),
        }
    }
}

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// `"lat,lng"` form used by the map service.
    pub fn to_query_string(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

impl FromStr for GeoPoint {
    type Err = String;

    /// Parse the `"lat,lng"` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| format!("expected 'lat,lng', got '{s}'"))?;
        let point = GeoPoint::new(
            lat.trim().parse().map_err(|_| format!("invalid latitude: '{lat}'"))?,
            lng.trim().parse().map_err(|_| format!("invalid longitude: '{lng}'"))?,
        );
        if !point.is_valid() {
            return Err(format!("coordinates out of range: '{s}'"));
        }
        Ok(point)
    }
}

/// Occupancy of a room, derived from its member count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy {
    Empty,
    OneMember,
    Full,
}

/// The persisted membership record for a meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub meeting_id: String,
    /// Broadcast group identifier, always `room-{meeting_id}`.
    pub room_id: String,
    pub members: Vec<Member>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_point: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    /// Build a fresh room with its first member.
    pub fn with_first_member(meeting_id: impl Into<String>, member: Member) -> Self {
        let meeting_id = meeting_id.into();
        let now = Utc::now();
        Self {
            room_id: Self::group_id(&meeting_id),
            meeting_id,
            members: vec![member],
            common_point: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Broadcast group identifier for a meeting.
    pub fn group_id(meeting_id: &str) -> String {
        format!("room-{meeting_id}")
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= ROOM_CAPACITY
    }

    pub fn occupancy(&self) -> Occupancy {
        match self.members.len() {
            0 => Occupancy::Empty,
            1 => Occupancy::OneMember,
            _ => Occupancy::Full,
        }
    }

    pub fn member_ids(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.user_id.as_str()).collect()
    }
}
