//! Waypoints: one system entry in a plotted route.
//!
//! The two plotters return differently shaped rows. Both share a small
//! contract: a mutable system name, case-insensitive name matching,
//! and the remaining distance to the destination.

use serde::{Deserialize, Serialize};

/// An ordered sequence of waypoints in flight order.
pub type Route = Vec<Waypoint>;

/// One system on a route, in either of the plotter shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Waypoint {
    /// A row from the neutron router.
    Neutron(NeutronWaypoint),

    /// A row from the exact (galaxy) plotter.
    Exact(ExactWaypoint),
}

/// A neutron router row: a system and how many jumps it takes to get there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeutronWaypoint {
    pub system: String,

    /// Light years covered by the leg ending at this system.
    pub distance_jumped: f64,

    /// Light years left to the destination.
    pub distance_left: f64,

    /// Jumps needed to reach this system from the previous one.
    pub jumps: u32,
}

/// An exact plotter row: one jump, with refuel and neutron markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactWaypoint {
    pub system: String,
    pub distance: f64,
    pub distance_left: f64,
    pub refuel: bool,
    pub neutron_star: bool,
}

impl Waypoint {
    /// The system name of this waypoint.
    pub fn system(&self) -> &str {
        match self {
            Self::Neutron(w) => &w.system,
            Self::Exact(w) => &w.system,
        }
    }

    /// Replace the system name, keeping every other field.
    pub fn set_system(&mut self, name: impl Into<String>) {
        let name = name.into();
        match self {
            Self::Neutron(w) => w.system = name,
            Self::Exact(w) => w.system = name,
        }
    }

    /// Whether `name` refers to this waypoint's system, ignoring case.
    pub fn matches(&self, name: &str) -> bool {
        same_system(self.system(), name)
    }

    pub fn distance_left(&self) -> f64 {
        match self {
            Self::Neutron(w) => w.distance_left,
            Self::Exact(w) => w.distance_left,
        }
    }

    /// Jumps to reach this waypoint. Only neutron routes record it.
    pub fn jumps(&self) -> Option<u32> {
        match self {
            Self::Neutron(w) => Some(w.jumps),
            Self::Exact(_) => None,
        }
    }
}

/// Case-insensitive system name comparison.
///
/// Journal and plotter capitalization drift apart (`SOL` vs `Sol`),
/// so names are compared after Unicode lowercasing.
pub fn same_system(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Round a distance to the two decimals routes are displayed and exchanged with.
pub fn round_distance(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
