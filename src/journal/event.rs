//! Decoding of single journal lines into the few events the pilot cares about.
//!
//! Every line is a JSON object with an `event` field. Anything that isn't one
//! of the recognized kinds, or that is malformed, decodes to [`LogEvent::Other`].

use serde::Deserialize;

use crate::model::Coordinates;

/// A decoded journal line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event")]
pub enum LogEvent {
    /// A hyperspace jump finished in `system_name`.
    #[serde(rename = "FSDJump")]
    Jump {
        #[serde(rename = "StarSystem")]
        system_name: String,
        #[serde(rename = "StarPos", default)]
        star_pos: Option<Coordinates>,
    },

    /// The game reported the current location (written on load).
    #[serde(rename = "Location")]
    Location {
        #[serde(rename = "StarSystem")]
        system_name: String,
        #[serde(rename = "StarPos", default)]
        star_pos: Option<Coordinates>,
    },

    /// The ship's loadout changed.
    #[serde(rename = "Loadout")]
    Loadout(Loadout),

    /// Cargo inventory changed.
    #[serde(rename = "Cargo")]
    Cargo {
        #[serde(rename = "Vessel")]
        vessel: String,
        #[serde(rename = "Count")]
        count: u32,
    },

    /// The game was shut down.
    #[serde(rename = "Shutdown")]
    Shutdown,

    /// A status file snapshot.
    #[serde(rename = "Status")]
    StatusSnapshot(StatusSnapshot),

    /// Any other event, or a line that couldn't be decoded.
    #[serde(other)]
    Other,
}

/// The subset of a `Loadout` event needed to model the frame shift drive.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Loadout {
    pub max_jump_range: f64,
    pub cargo_capacity: u32,
    pub unladen_mass: f64,
    pub fuel_capacity: FuelCapacity,
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FuelCapacity {
    pub main: f64,
    #[serde(default)]
    pub reserve: f64,
}

/// One fitted module.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Module {
    pub slot: String,
    pub item: String,
    #[serde(default)]
    pub engineering: Option<Engineering>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Engineering {
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

/// An engineered value override, e.g. `FSDOptimalMass`.
///
/// Some modifiers carry text (`ValueStr`, like a weapon's damage type)
/// instead of a number; those have no `value`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Modifier {
    pub label: String,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Fuel and flags from `Status.json`.
///
/// Snapshots written while docked or on foot lack `Fuel`;
/// those fail to decode and are skipped for the cycle.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusSnapshot {
    pub flags: u64,
    pub fuel: Fuel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Fuel {
    pub fuel_main: f64,
}

impl StatusSnapshot {
    pub fn fuel_main(&self) -> f64 {
        self.fuel.fuel_main
    }
}

/// Decode one journal line.
///
/// Never fails: malformed or unrecognized lines become [`LogEvent::Other`].
pub fn decode(line: &str) -> LogEvent {
    let line = line.trim();
    if line.is_empty() {
        return LogEvent::Other;
    }
    match serde_json::from_str(line) {
        Ok(event) => event,
        Err(e) => {
            log::trace!("ignoring undecodable journal line: {e}");
            LogEvent::Other
        }
    }
}
