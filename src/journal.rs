//! The game journal: locating it, decoding its lines, and following it.
//!
//! The game writes one `Journal.<timestamp>.<part>.log` file per session
//! into its journal directory, plus a `Status.json` it rewrites in place.

mod event;
mod state;
mod tail;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub use event::{
    Engineering, Fuel, FuelCapacity, LogEvent, Loadout, Modifier, Module, StatusSnapshot, decode,
};
pub use state::{JournalState, scan};
pub use tail::{JOURNAL_POLL_INTERVAL, STATUS_POLL_INTERVAL, StopSignal, TailPolicy, Tailer};

/// Name of the status file the game keeps beside its journals.
pub const STATUS_FILE: &str = "Status.json";

/// List the journal files in `dir`, most recently modified first.
pub fn list_journals(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut journals: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with("Journal.") && name.ends_with(".log")) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        journals.push((modified, entry.path()));
    }

    // Newest first; ties broken by name so the order is deterministic.
    journals.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    Ok(journals.into_iter().map(|(_, path)| path).collect())
}

/// The most recently written journal in `dir`, if any.
pub fn latest_journal(dir: &Path) -> io::Result<Option<PathBuf>> {
    Ok(list_journals(dir)?.into_iter().next())
}
