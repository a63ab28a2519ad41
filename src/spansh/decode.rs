//! Decoding job responses and finished route payloads.

use serde::Deserialize;

use crate::model::{ExactWaypoint, NeutronWaypoint, Route, Waypoint, round_distance};

use super::{PlotError, PlotKind, TransportError};

/// Where a job stands after one response.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Still computing; poll `job` again later.
    Queued { job: String },

    /// Finished with a route.
    Complete(Route),
}

/// Every response shape the service uses, merged.
#[derive(Deserialize)]
struct JobResponse {
    status: Option<String>,
    job: Option<String>,
    result: Option<serde_json::Value>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct NeutronResult {
    system_jumps: Vec<NeutronJump>,
}

#[derive(Deserialize)]
struct NeutronJump {
    system: String,
    distance_jumped: f64,
    distance_left: f64,
    jumps: u32,
}

#[derive(Deserialize)]
struct ExactResult {
    jumps: Vec<ExactJump>,
}

#[derive(Deserialize)]
struct ExactJump {
    name: String,
    distance: f64,
    distance_to_destination: f64,
    must_refuel: Flag,
    has_neutron: Flag,
}

/// The service sends some booleans as `0`/`1` and others as `true`/`false`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl From<Flag> for bool {
    fn from(flag: Flag) -> Self {
        match flag {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

/// Decode a submit or poll response body.
pub fn job_status(body: &str, kind: PlotKind) -> Result<JobStatus, PlotError> {
    let response: JobResponse =
        serde_json::from_str(body).map_err(|_| PlotError::InvalidResponse)?;

    if let Some(job) = response.job.as_ref()
        && response.result.is_none()
        && response.status.as_deref().is_none_or(|s| s == "queued")
    {
        return Ok(JobStatus::Queued { job: job.clone() });
    }

    match response.result {
        Some(result) if !result.is_null() => decode_route(result, kind).map(JobStatus::Complete),
        _ => match response.error {
            Some(error) => Err(PlotError::Service(error)),
            None => Err(PlotError::InvalidResponse),
        },
    }
}

/// Decode a finished job's `result` object.
pub fn decode_route(result: serde_json::Value, kind: PlotKind) -> Result<Route, PlotError> {
    let route: Route = match kind {
        PlotKind::Neutron => {
            let result: NeutronResult = serde_json::from_value(result)?;
            result
                .system_jumps
                .into_iter()
                .map(|j| {
                    Waypoint::Neutron(NeutronWaypoint {
                        system: j.system,
                        distance_jumped: round_distance(j.distance_jumped),
                        distance_left: round_distance(j.distance_left),
                        jumps: j.jumps,
                    })
                })
                .collect()
        }
        PlotKind::Exact => {
            let result: ExactResult = serde_json::from_value(result)?;
            result
                .jumps
                .into_iter()
                .map(|j| {
                    Waypoint::Exact(ExactWaypoint {
                        system: j.name,
                        distance: round_distance(j.distance),
                        distance_left: round_distance(j.distance_to_destination),
                        refuel: j.must_refuel.into(),
                        neutron_star: j.has_neutron.into(),
                    })
                })
                .collect()
        }
    };

    if route.is_empty() {
        return Err(PlotError::InvalidResponse);
    }
    Ok(route)
}

/// Turn a transport failure into the most specific error available.
///
/// An error message from the service itself beats the generic transport text.
pub fn transport_failure(err: TransportError) -> PlotError {
    let service_error = err
        .body
        .as_deref()
        .and_then(|body| serde_json::from_str::<JobResponse>(body).ok())
        .and_then(|response| response.error);

    match service_error {
        Some(message) => PlotError::Service(message),
        None => PlotError::Network(err.message),
    }
}
