//! Game state derived from a whole journal file.
//!
//! Used before tailing starts: the latest loadout, location and cargo give
//! the ship's current jump range, and a recorded shutdown means the journal
//! is finished and will never grow again.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::model::Coordinates;

use super::event::{self, LogEvent, Loadout};

/// What a full pass over a journal found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JournalState {
    /// The most recent loadout with a non-zero jump range.
    pub loadout: Option<Loadout>,

    /// The most recently reported system.
    pub location: Option<String>,

    /// Where that system is, when the event recorded it.
    pub position: Option<Coordinates>,

    /// The most recent cargo count for the ship (not SRV or fighter).
    pub cargo: Option<u32>,

    /// Whether the game shut down in this journal.
    pub shut_down: bool,

    /// Byte offset just past the last complete line scanned.
    ///
    /// Tailing from here sees every line the scan did not.
    pub end_offset: u64,
}

/// Scan a journal from the beginning.
///
/// Scanning stops at the first `Shutdown`; a journal never continues after one.
/// A trailing line without its newline is still being written and is left
/// for the tailer.
pub fn scan(path: &Path) -> io::Result<JournalState> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut state = JournalState::default();
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 || line.last() != Some(&b'\n') {
            break;
        }
        state.end_offset += read as u64;

        match event::decode(&String::from_utf8_lossy(&line)) {
            LogEvent::Loadout(loadout) if loadout.max_jump_range > 0.0 => {
                state.loadout = Some(loadout);
            }
            LogEvent::Location {
                system_name,
                star_pos,
            }
            | LogEvent::Jump {
                system_name,
                star_pos,
            } => {
                state.location = Some(system_name);
                state.position = star_pos;
            }
            LogEvent::Cargo { vessel, count } if vessel == "Ship" => {
                state.cargo = Some(count);
            }
            LogEvent::Shutdown => {
                state.shut_down = true;
                break;
            }
            _ => {}
        }
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempfile::TempDir;

    const LOADOUT: &str = r#"{ "event":"Loadout", "MaxJumpRange":48.2, "CargoCapacity":64, "UnladenMass":300.0, "FuelCapacity":{ "Main":16.0, "Reserve":0.5 }, "Modules":[] }"#;

    fn write_journal(lines: &[&str]) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Journal.2021-05-01T120000.01.log");
        fs::write(&path, lines.join("\n") + "\n").unwrap();
        (dir, path)
    }

    #[test]
    fn collects_latest_state() {
        let (_dir, path) = write_journal(&[
            r#"{ "event":"Location", "StarSystem":"Sol" }"#,
            LOADOUT,
            r#"{ "event":"Cargo", "Vessel":"Ship", "Count":4 }"#,
            r#"{ "event":"Cargo", "Vessel":"SRV", "Count":1 }"#,
            r#"{ "event":"FSDJump", "StarSystem":"Sirius" }"#,
        ]);

        let state = scan(&path).unwrap();
        assert_eq!(state.location.as_deref(), Some("Sirius"));
        assert_eq!(state.cargo, Some(4));
        assert!(state.loadout.is_some());
        assert!(!state.shut_down);
    }

    #[test]
    fn ignores_zero_range_loadouts() {
        let zero = LOADOUT.replace("48.2", "0");
        let (_dir, path) = write_journal(&[LOADOUT, &zero]);

        let state = scan(&path).unwrap();
        let loadout = state.loadout.unwrap();
        assert!((loadout.max_jump_range - 48.2).abs() < f64::EPSILON);
    }

    #[test]
    fn stops_at_shutdown() {
        let (_dir, path) = write_journal(&[
            r#"{ "event":"Location", "StarSystem":"Sol" }"#,
            r#"{ "event":"Shutdown" }"#,
            r#"{ "event":"FSDJump", "StarSystem":"Sirius" }"#,
        ]);

        let state = scan(&path).unwrap();
        assert!(state.shut_down);
        assert_eq!(state.location.as_deref(), Some("Sol"));
    }

    #[test]
    fn tracks_position_of_latest_system() {
        let (_dir, path) = write_journal(&[
            r#"{ "event":"Location", "StarSystem":"Sol", "StarPos":[0.0, 0.0, 0.0] }"#,
            r#"{ "event":"FSDJump", "StarSystem":"Sirius", "StarPos":[6.25, -1.28125, -5.75] }"#,
        ]);

        let state = scan(&path).unwrap();
        assert_eq!(state.location.as_deref(), Some("Sirius"));
        assert_eq!(
            state.position,
            Some(Coordinates {
                x: 6.25,
                y: -1.28125,
                z: -5.75,
            })
        );
    }

    #[test]
    fn end_offset_stops_before_unfinished_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Journal.2021-05-01T120000.01.log");
        let complete = "{ \"event\":\"Location\", \"StarSystem\":\"Sol\" }\n";
        fs::write(&path, format!("{complete}{{ \"event\":\"FSDJ")).unwrap();

        let state = scan(&path).unwrap();
        assert_eq!(state.end_offset, complete.len() as u64);
        assert_eq!(state.location.as_deref(), Some("Sol"));
    }

    #[test]
    fn skips_garbage_lines() {
        let (_dir, path) = write_journal(&[
            "garbage",
            "",
            r#"{ "event":"Location", "StarSystem":"Sol" }"#,
        ]);
        assert_eq!(scan(&path).unwrap().location.as_deref(), Some("Sol"));
    }
}
