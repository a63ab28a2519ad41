//! Local persistence for the last tracked route.
//!
//! The route and cursor are saved when the game shuts down or tracking is
//! quit, so the next session can pick up where this one left off:
//!
//! ```text
//! <root>/
//!   last_route.json   # { saved_at, index, route }
//! ```

use std::{fs, io, path::PathBuf};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::model::Route;

const LAST_ROUTE_FILE: &str = "last_route.json";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no saved route")]
    NoSavedRoute,

    #[error("saved route is empty")]
    EmptyRoute,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// A route and the index of the next system to reach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastRoute {
    pub saved_at: Timestamp,
    pub index: usize,
    pub route: Route,
}

impl LastRoute {
    pub fn new(route: Route, index: usize) -> Self {
        Self {
            saved_at: Timestamp::now(),
            index,
            route,
        }
    }
}

/// Local file-based storage.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Creates a new storage instance rooted at the given directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the default storage root: `~/.neutron-pilot/`.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".neutron-pilot"))
    }

    /// Overwrites the saved route.
    pub fn save_last_route(&self, last: &LastRoute) -> Result<()> {
        if last.route.is_empty() {
            return Err(StorageError::EmptyRoute);
        }
        let json = serde_json::to_string_pretty(last)?;
        // Write beside the target, then rename, so a crash never leaves half a file.
        let tmp = self.root.join(format!("{LAST_ROUTE_FILE}.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(tmp, self.last_route_path())?;
        log::info!(
            "saved route of {} waypoints at index {}",
            last.route.len(),
            last.index
        );
        Ok(())
    }

    /// Loads the saved route.
    ///
    /// An index past the end of the route is clamped to the end.
    pub fn load_last_route(&self) -> Result<LastRoute> {
        let path = self.last_route_path();
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NoSavedRoute);
            }
            Err(e) => return Err(e.into()),
        };
        let mut last: LastRoute = serde_json::from_str(&json)?;
        if last.route.is_empty() {
            return Err(StorageError::EmptyRoute);
        }
        last.index = last.index.min(last.route.len());
        Ok(last)
    }

    fn last_route_path(&self) -> PathBuf {
        self.root.join(LAST_ROUTE_FILE)
    }
}
