//! Points-of-interest handler.
//!
//! Endpoint:
//! - POST /api/location/points-of-interest - Compute the meetup point and
//!   broadcast nearby places to the room

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rendezvous_core::realtime::hub::Broadcaster;
use rendezvous_types::event::OutboundEvent;
use rendezvous_types::room::Room;

use crate::http::error::AppError;
use crate::state::AppState;

/// Request body. `radius` is kept loose so strings and numbers can be
/// told apart from a missing field.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsOfInterestRequest {
    pub meet_id: Option<String>,
    pub radius: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsOfInterestResponse {
    pub success: bool,
    pub message: String,
    pub places_of_interest: Vec<Value>,
}

fn parse_radius(raw: Option<&Value>) -> Result<f64, AppError> {
    let radius = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match radius {
        Some(r) if r.is_finite() && r > 0.0 => Ok(r),
        _ => Err(AppError::invalid("radius must be a positive number")),
    }
}

/// POST /api/location/points-of-interest
pub async fn points_of_interest(
    State(state): State<AppState>,
    body: Result<Json<PointsOfInterestRequest>, JsonRejection>,
) -> Result<Json<PointsOfInterestResponse>, AppError> {
    let Json(body) = body?;
    let meet_id = body
        .meet_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::invalid("meetId is required"))?;
    let radius = parse_radius(body.radius.as_ref())?;

    let Some(places) = state.locations.places_for_meeting(&meet_id, radius).await? else {
        return Ok(Json(PointsOfInterestResponse {
            success: true,
            message: "Cannot compute meetup point yet".to_string(),
            places_of_interest: Vec::new(),
        }));
    };

    state.hub.broadcast(
        &Room::group_id(&meet_id),
        OutboundEvent::PointsOfInterest {
            places_of_interest: places.clone(),
        },
    );
    tracing::info!(meeting_id = %meet_id, count = places.len(), "points of interest broadcast");

    Ok(Json(PointsOfInterestResponse {
        success: true,
        message: "Points of interest broadcast sent".to_string(),
        places_of_interest: places,
    }))
}
