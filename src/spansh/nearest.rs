//! Finding the catalogued system closest to a point.
//!
//! Useful when the current system is unnamed in the plotter's database, or
//! to pick a real system near some coordinates as a route endpoint.

use serde::Deserialize;

use crate::model::Coordinates;

use super::decode::transport_failure;
use super::{PlotError, Transport};

/// A system and its distance from the queried point.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NearestSystem {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Light years from the queried point.
    #[serde(default)]
    pub distance: f64,
}

impl NearestSystem {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}

#[derive(Deserialize)]
struct NearestResponse {
    system: Option<NearestSystem>,
    error: Option<String>,
}

/// Query parameters for a lookup at `at`.
pub fn nearest_query(at: Coordinates) -> Vec<(String, String)> {
    vec![
        ("x".to_string(), at.x.to_string()),
        ("y".to_string(), at.y.to_string()),
        ("z".to_string(), at.z.to_string()),
    ]
}

/// Decode a `/nearest` response body.
pub fn decode_nearest(body: &str) -> Result<NearestSystem, PlotError> {
    let response: NearestResponse =
        serde_json::from_str(body).map_err(|_| PlotError::InvalidResponse)?;
    match (response.system, response.error) {
        (Some(system), _) => Ok(system),
        (None, Some(error)) => Err(PlotError::Service(error)),
        (None, None) => Err(PlotError::InvalidResponse),
    }
}

/// Ask the service for the system nearest to `at`.
///
/// A single request; there is no job to poll.
pub fn nearest_system<T: Transport>(
    transport: &T,
    api_url: &str,
    at: Coordinates,
) -> Result<NearestSystem, PlotError> {
    let url = format!("{}/nearest", api_url.trim_end_matches('/'));
    log::info!("looking up the system nearest to ({}, {}, {})", at.x, at.y, at.z);
    let body = transport
        .get(&url, &nearest_query(at))
        .map_err(transport_failure)?;
    decode_nearest(&body)
}
