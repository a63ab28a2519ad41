//! The route cursor and the rules for moving it.
//!
//! The tracker never looks backward: a jump into a system that was
//! already passed, or one not on the route at all, leaves the cursor
//! where it is. Players often backtrack through systems they already
//! visited, and that must not undo progress.

use crate::model::{Route, Waypoint};

/// Errors from external edits to the route or cursor.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("index {index} is out of bounds for a route of {len} waypoints")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Something the owner of the tracker should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteNotice {
    /// The cursor moved to a new waypoint.
    IndexChanged(usize),

    /// The cursor moved past the last waypoint.
    RouteComplete,

    /// The game shut down; carries what's needed to resume later.
    GameShutdown { route: Route, index: usize },
}

/// The result of editing a waypoint's system name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The edited waypoint is the current target; automation must be re-pushed.
    Retarget(String),

    /// Some other waypoint was edited.
    Unchanged,
}

/// Owns a route and the index of the next system to reach.
#[derive(Debug, Clone)]
pub struct RouteTracker {
    route: Route,
    index: usize,
}

impl RouteTracker {
    /// Start tracking `route` at `start_index`.
    ///
    /// `start_index` may equal the route length (an already finished route).
    pub fn new(route: Route, start_index: usize) -> Result<Self, TrackerError> {
        if start_index > route.len() {
            return Err(TrackerError::IndexOutOfBounds {
                index: start_index,
                len: route.len(),
            });
        }
        Ok(Self {
            route,
            index: start_index,
        })
    }

    /// The index to start a freshly plotted route at.
    ///
    /// The first waypoint is the departure system, so tracking begins at the
    /// second one, unless that's all the route has.
    pub fn default_start_index(len: usize) -> usize {
        usize::from(len > 1)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn into_route(self) -> Route {
        self.route
    }

    pub fn is_complete(&self) -> bool {
        self.index == self.route.len()
    }

    /// The waypoint the player is flying towards, or `None` once complete.
    pub fn current_target(&self) -> Option<&Waypoint> {
        self.route.get(self.index)
    }

    /// Whether the next leg is the final single jump of a neutron leg.
    ///
    /// The fuel alert is only meaningful right before that jump.
    pub fn next_jump_is_final_leg(&self) -> bool {
        self.current_target().and_then(Waypoint::jumps) == Some(1)
    }

    /// React to a completed hyperspace jump into `system_name`.
    ///
    /// Searches from the current index onward; the earliest match wins.
    pub fn on_jump(&mut self, system_name: &str) -> Option<RouteNotice> {
        if self.is_complete() {
            return None;
        }
        let offset = self.route[self.index..]
            .iter()
            .position(|w| w.matches(system_name))?;

        self.index += offset + 1;
        log::debug!("jumped to {system_name}, route index now {}", self.index);

        if self.is_complete() {
            Some(RouteNotice::RouteComplete)
        } else {
            Some(RouteNotice::IndexChanged(self.index))
        }
    }

    /// React to the game shutting down.
    pub fn on_shutdown(&self) -> RouteNotice {
        RouteNotice::GameShutdown {
            route: self.route.clone(),
            index: self.index,
        }
    }

    /// Rename the system at `index`.
    pub fn edit_system(
        &mut self,
        index: usize,
        name: impl Into<String>,
    ) -> Result<EditOutcome, TrackerError> {
        let len = self.route.len();
        let waypoint = self
            .route
            .get_mut(index)
            .ok_or(TrackerError::IndexOutOfBounds { index, len })?;

        let name = name.into();
        waypoint.set_system(name.clone());

        if index == self.index {
            Ok(EditOutcome::Retarget(name))
        } else {
            Ok(EditOutcome::Unchanged)
        }
    }

    /// Move the cursor to `index` regardless of the journal.
    ///
    /// For resuming a saved route or correcting the position by hand.
    pub fn jump_to_index(&mut self, index: usize) -> Result<RouteNotice, TrackerError> {
        if index >= self.route.len() {
            return Err(TrackerError::IndexOutOfBounds {
                index,
                len: self.route.len(),
            });
        }
        self.index = index;
        Ok(RouteNotice::IndexChanged(index))
    }
}
