//! Core data model: routes, their waypoints, and the ship flying them.

mod coordinates;
mod coriolis;
mod ship;
mod waypoint;

pub use coordinates::Coordinates;
pub use ship::{FrameShiftDrive, Ship, ShipError};
pub use waypoint::{
    ExactWaypoint, NeutronWaypoint, Route, Waypoint, round_distance, same_system,
};
