//! Location service: last-known positions, meetup point and nearby places.
//!
//! Positions reported over the realtime channel are kept in memory only. They
//! feed the meetup point computation and are dropped when the member leaves.

use std::sync::Arc;

use dashmap::DashMap;
use rendezvous_types::error::MeetupError;
use rendezvous_types::room::{GeoPoint, ROOM_CAPACITY};
use serde_json::Value;
use tracing::{debug, info};

use super::map::MapService;
use crate::repository::room::RoomRepository;
use crate::room::coordinator::RoomCoordinator;

pub struct LocationService<R: RoomRepository, S: MapService> {
    rooms: Arc<RoomCoordinator<R>>,
    map: S,
    positions: DashMap<(String, String), GeoPoint>,
}

impl<R: RoomRepository, S: MapService> LocationService<R, S> {
    pub fn new(rooms: Arc<RoomCoordinator<R>>, map: S) -> Self {
        Self {
            rooms,
            map,
            positions: DashMap::new(),
        }
    }

    pub fn map(&self) -> &S {
        &self.map
    }

    /// Remember the latest position of a member.
    pub fn record_position(&self, meeting_id: &str, user_id: &str, point: GeoPoint) {
        self.positions
            .insert((meeting_id.to_string(), user_id.to_string()), point);
    }

    pub fn position(&self, meeting_id: &str, user_id: &str) -> Option<GeoPoint> {
        self.positions
            .get(&(meeting_id.to_string(), user_id.to_string()))
            .map(|p| *p)
    }

    pub fn forget(&self, meeting_id: &str, user_id: &str) {
        self.positions
            .remove(&(meeting_id.to_string(), user_id.to_string()));
    }

    /// Meetup point for a meeting, computing and storing it on first use.
    ///
    /// Returns `None` until the room holds two members whose positions are
    /// both known.
    pub async fn compute_meetup_point(
        &self,
        meeting_id: &str,
    ) -> Result<Option<GeoPoint>, MeetupError> {
        let room = self
            .rooms
            .find(meeting_id)
            .await?
            .ok_or(MeetupError::RoomNotFound)?;

        if room.members.len() != ROOM_CAPACITY {
            info!(
                meeting_id,
                members = room.members.len(),
                "cannot compute meetup point, need exactly two members"
            );
            return Ok(None);
        }
        if let Some(point) = room.common_point {
            return Ok(Some(point));
        }

        let (Some(a), Some(b)) = (
            self.position(meeting_id, &room.members[0].user_id),
            self.position(meeting_id, &room.members[1].user_id),
        ) else {
            debug!(meeting_id, "positions not known for both members yet");
            return Ok(None);
        };

        let Some(point) = self.map.compute_meetup_point(a, b).await? else {
            return Ok(None);
        };
        self.rooms.set_common_point(meeting_id, point).await?;
        info!(
            meeting_id,
            latitude = point.latitude,
            longitude = point.longitude,
            "computed meetup point"
        );
        Ok(Some(point))
    }

    pub async fn points_of_interest(
        &self,
        center: GeoPoint,
        radius: f64,
    ) -> Result<Vec<Value>, MeetupError> {
        validate_radius(radius)?;
        let places = self.map.points_of_interest(center, radius).await?;
        info!(
            count = places.len(),
            coordinates = %center.to_query_string(),
            "retrieved points of interest"
        );
        Ok(places)
    }

    /// Places around the meeting's meetup point, or `None` if there is no
    /// meetup point yet.
    pub async fn places_for_meeting(
        &self,
        meeting_id: &str,
        radius: f64,
    ) -> Result<Option<Vec<Value>>, MeetupError> {
        validate_radius(radius)?;
        match self.compute_meetup_point(meeting_id).await? {
            Some(point) => Ok(Some(self.points_of_interest(point, radius).await?)),
            None => Ok(None),
        }
    }
}

fn validate_radius(radius: f64) -> Result<(), MeetupError> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(MeetupError::invalid("radius must be a positive number"));
    }
    Ok(())
}
