//! Importing a ship from a Coriolis shipyard export.
//!
//! Coriolis identifies a module by size (`class`) and grade (`rating`, `A`
//! to `E`). Engineering is stored as relative modifications in hundredths of
//! a percent, so `"optmass": 5500` means +55% optimal mass.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::ship::{Ship, ShipError, booster_range, stock_drive};

const BOOSTER_GROUP: &str = "Guardian Frame Shift Drive Booster";

#[derive(Deserialize)]
struct Export {
    components: Components,
    stats: Stats,
}

#[derive(Deserialize)]
struct Components {
    standard: Standard,
    /// Empty slots are `null`.
    #[serde(default)]
    internal: Vec<Option<Component>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Standard {
    frame_shift_drive: Component,
}

#[derive(Deserialize)]
struct Component {
    class: u8,
    rating: String,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    modifications: Option<BTreeMap<String, serde_json::Value>>,
}

impl Component {
    /// A numeric modification as a factor, e.g. `1.55` for +55%.
    fn factor(&self, key: &str) -> Option<f64> {
        let value = self.modifications.as_ref()?.get(key)?.as_f64()?;
        Some(1.0 + value / 10_000.0)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Stats {
    unladen_mass: f64,
    fuel_capacity: f64,
    #[serde(default)]
    reserve_fuel_capacity: f64,
    #[serde(default)]
    cargo_capacity: u32,
}

/// Drive class index for a Coriolis rating letter, 1 (E) to 5 (A).
fn rating_class(rating: &str) -> Option<usize> {
    match rating {
        "E" => Some(1),
        "D" => Some(2),
        "C" => Some(3),
        "B" => Some(4),
        "A" => Some(5),
        _ => None,
    }
}

impl Ship {
    /// Build a ship from a Coriolis JSON export.
    ///
    /// For plotting with a ship other than the one currently flown.
    pub fn from_coriolis(json: &str) -> Result<Self, ShipError> {
        let export: Export = serde_json::from_str(json)?;
        let drive = &export.components.standard.frame_shift_drive;

        let mut fsd = rating_class(&drive.rating)
            .and_then(|class| stock_drive(usize::from(drive.class), class))
            .ok_or_else(|| {
                ShipError::UnknownDrive(format!("size {} rating {}", drive.class, drive.rating))
            })?;
        if let Some(factor) = drive.factor("optmass") {
            fsd.optimal_mass *= factor;
        }
        if let Some(factor) = drive.factor("maxfuel") {
            fsd.max_fuel_per_jump *= factor;
        }

        let jump_range_boost = export
            .components
            .internal
            .iter()
            .flatten()
            .filter(|c| c.group.as_deref() == Some(BOOSTER_GROUP))
            .find_map(|c| booster_range(c.class))
            .unwrap_or(0.0);

        Ok(Self {
            fsd,
            unladen_mass: export.stats.unladen_mass,
            tank_size: export.stats.fuel_capacity,
            reserve_size: export.stats.reserve_fuel_capacity,
            max_cargo: export.stats.cargo_capacity,
            jump_range_boost,
        })
    }
}
