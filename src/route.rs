//! Route progress: where the player is on a plotted route.
//!
//! The tracker is a plain state machine with no I/O. The session feeds it
//! journal events and acts on the notices it returns.

mod rows;
mod tracker;

pub use rows::{RowError, load_route, read_route, save_route, write_route};
pub use tracker::{EditOutcome, RouteNotice, RouteTracker, TrackerError};
