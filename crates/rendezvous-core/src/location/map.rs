//! Map service port and its implementation over the resilient client.

use rendezvous_types::error::MeetupError;
use rendezvous_types::room::GeoPoint;
use serde_json::{Value, json};

use crate::resilience::client::{HttpTransport, ResilientClient};

const COMPUTE_MEETUP_POINT_PATH: &str = "/api/computeMeetupPoint";
const POINTS_OF_INTEREST_PATH: &str = "/api/getPOI";

/// Geolocation capabilities provided by the external map service.
pub trait MapService: Send + Sync {
    /// Meeting point between two positions, or `None` if the service could
    /// not produce one.
    fn compute_meetup_point(
        &self,
        a: GeoPoint,
        b: GeoPoint,
    ) -> impl std::future::Future<Output = Result<Option<GeoPoint>, MeetupError>> + Send;

    /// Places of interest within `radius` of `center`, passed through as
    /// returned by the service.
    fn points_of_interest(
        &self,
        center: GeoPoint,
        radius: f64,
    ) -> impl std::future::Future<Output = Result<Vec<Value>, MeetupError>> + Send;
}

impl<T: HttpTransport> MapService for ResilientClient<T> {
    async fn compute_meetup_point(
        &self,
        a: GeoPoint,
        b: GeoPoint,
    ) -> Result<Option<GeoPoint>, MeetupError> {
        let body = json!({
            "userA": { "coordinates": a.to_query_string() },
            "userB": { "coordinates": b.to_query_string() },
        });
        let response = self.post(COMPUTE_MEETUP_POINT_PATH, body).await?;
        parse_coordinates(response.get("coordinates"))
    }

    async fn points_of_interest(
        &self,
        center: GeoPoint,
        radius: f64,
    ) -> Result<Vec<Value>, MeetupError> {
        let query = vec![
            ("coordinates".to_string(), center.to_query_string()),
            ("radius".to_string(), radius.to_string()),
        ];
        match self.get(POINTS_OF_INTEREST_PATH, query).await? {
            Value::Array(places) => Ok(places),
            Value::Null => Ok(Vec::new()),
            other => Err(unexpected_response(&other)),
        }
    }
}

/// Accepts either `"lat,lng"` or `{"latitude": .., "longitude": ..}`.
fn parse_coordinates(value: Option<&Value>) -> Result<Option<GeoPoint>, MeetupError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s
            .parse::<GeoPoint>()
            .map(Some)
            .map_err(|e| MeetupError::ExternalService {
                status: 502,
                message: e,
            }),
        Some(other) => serde_json::from_value::<GeoPoint>(other.clone())
            .ok()
            .filter(GeoPoint::is_valid)
            .map(Some)
            .ok_or_else(|| unexpected_response(other)),
    }
}

fn unexpected_response(value: &Value) -> MeetupError {
    MeetupError::ExternalService {
        status: 502,
        message: format!("unexpected map service response: {value}"),
    }
}
