//! Ship performance derived from a journal loadout or a Coriolis export.
//!
//! Jump range and the exact plotter's parameters depend only on the frame
//! shift drive constants, the hull mass, the fuel tank and an optional
//! Guardian FSD booster.

use serde::Serialize;

use crate::journal::{Loadout, Module};

/// Errors building a ship from a loadout.
#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    #[error("loadout has no frame shift drive")]
    NoFrameShiftDrive,

    #[error("unknown frame shift drive: {0}")]
    UnknownDrive(String),

    #[error("invalid Coriolis export: {0}")]
    Coriolis(#[from] serde_json::Error),
}

/// Frame shift drive constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameShiftDrive {
    pub optimal_mass: f64,
    pub max_fuel_per_jump: f64,
    /// The fuel power exponent, set by the drive class.
    pub size_const: f64,
    /// The fuel multiplier numerator, set by the drive rating.
    pub rating_const: f64,
}

/// The parts of a ship the plotters need.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    pub fsd: FrameShiftDrive,
    pub unladen_mass: f64,
    pub tank_size: f64,
    pub reserve_size: f64,
    pub max_cargo: u32,
    /// Flat range bonus from a Guardian FSD booster.
    pub jump_range_boost: f64,
}

impl Ship {
    /// Build a ship from the drive and booster modules in a loadout.
    ///
    /// Engineered `FSDOptimalMass` and `MaxFuelPerJump` values override the
    /// drive's stock constants.
    pub fn from_loadout(loadout: &Loadout) -> Result<Self, ShipError> {
        let drive = loadout
            .modules
            .iter()
            .find(|m| m.slot == "FrameShiftDrive")
            .ok_or(ShipError::NoFrameShiftDrive)?;

        let mut fsd = drive_constants(&drive.item)
            .ok_or_else(|| ShipError::UnknownDrive(drive.item.clone()))?;
        apply_engineering(&mut fsd, drive);

        let jump_range_boost = loadout
            .modules
            .iter()
            .find_map(|m| booster_bonus(&m.item))
            .unwrap_or(0.0);

        Ok(Self {
            fsd,
            unladen_mass: loadout.unladen_mass,
            tank_size: loadout.fuel_capacity.main,
            reserve_size: loadout.fuel_capacity.reserve,
            max_cargo: loadout.cargo_capacity,
            jump_range_boost,
        })
    }

    /// Maximum single-jump range with a full tank and `cargo_mass` tons aboard.
    pub fn jump_range(&self, cargo_mass: u32) -> f64 {
        let mass = self.unladen_mass + self.tank_size + f64::from(cargo_mass);
        let fuel_factor = (1000.0 * self.fsd.max_fuel_per_jump / self.fsd.rating_const)
            .powf(1.0 / self.fsd.size_const);
        self.jump_range_boost + self.fsd.optimal_mass * fuel_factor / mass
    }
}

fn apply_engineering(fsd: &mut FrameShiftDrive, drive: &Module) {
    let Some(engineering) = &drive.engineering else {
        return;
    };
    for modifier in &engineering.modifiers {
        let Some(value) = modifier.value else {
            continue;
        };
        match modifier.label.as_str() {
            "FSDOptimalMass" => fsd.optimal_mass = value,
            "MaxFuelPerJump" => fsd.max_fuel_per_jump = value,
            _ => {}
        }
    }
}

/// Stock constants for a drive item like `int_hyperdrive_size5_class5`.
fn drive_constants(item: &str) -> Option<FrameShiftDrive> {
    let item = item.to_lowercase();
    let rest = item.strip_prefix("int_hyperdrive_size")?;
    let (size, class) = rest.split_once("_class")?;
    stock_drive(size.parse().ok()?, class.parse().ok()?)
}

/// Stock constants for a drive of `size` and `class`.
///
/// `class` runs 1 (E rated) to 5 (A rated).
pub(super) fn stock_drive(size: usize, class: usize) -> Option<FrameShiftDrive> {
    if !(1..=5).contains(&class) {
        return None;
    }

    // Indexed by rating, E through A.
    let (optimal_mass, max_fuel): ([f64; 5], [f64; 5]) = match size {
        2 => ([48.0, 54.0, 60.0, 75.0, 90.0], [0.6, 0.6, 0.6, 0.8, 0.9]),
        3 => ([80.0, 90.0, 100.0, 125.0, 150.0], [1.2, 1.2, 1.2, 1.5, 1.8]),
        4 => ([280.0, 315.0, 350.0, 438.0, 525.0], [2.0, 2.0, 2.0, 2.5, 3.0]),
        5 => ([560.0, 630.0, 700.0, 875.0, 1050.0], [3.3, 3.3, 3.3, 4.1, 5.0]),
        6 => ([960.0, 1080.0, 1200.0, 1500.0, 1800.0], [5.3, 5.3, 5.3, 6.6, 8.0]),
        7 => ([1440.0, 1620.0, 1800.0, 2250.0, 2700.0], [8.5, 8.5, 8.5, 10.6, 12.8]),
        _ => return None,
    };
    let size_const = match size {
        2 => 2.00,
        3 => 2.15,
        4 => 2.30,
        5 => 2.45,
        6 => 2.60,
        _ => 2.75,
    };
    let rating_const = [11.0, 10.0, 8.0, 10.0, 12.0][class - 1];

    Some(FrameShiftDrive {
        optimal_mass: optimal_mass[class - 1],
        max_fuel_per_jump: max_fuel[class - 1],
        size_const,
        rating_const,
    })
}

/// Range bonus for a Guardian FSD booster item, if `item` is one.
fn booster_bonus(item: &str) -> Option<f64> {
    let item = item.to_lowercase();
    let size = item.strip_prefix("int_guardianfsdbooster_size")?;
    booster_range(size.parse().ok()?)
}

/// Range bonus of a Guardian FSD booster of `size`.
pub(super) fn booster_range(size: u8) -> Option<f64> {
    match size {
        1 => Some(4.00),
        2 => Some(6.00),
        3 => Some(7.75),
        4 => Some(9.25),
        5 => Some(10.50),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::journal::{Engineering, FuelCapacity, Modifier};

    fn loadout(modules: Vec<Module>) -> Loadout {
        Loadout {
            max_jump_range: 50.0,
            cargo_capacity: 32,
            unladen_mass: 400.0,
            fuel_capacity: FuelCapacity {
                main: 32.0,
                reserve: 0.63,
            },
            modules,
        }
    }

    fn module(slot: &str, item: &str) -> Module {
        Module {
            slot: slot.into(),
            item: item.into(),
            engineering: None,
        }
    }

    #[test]
    fn stock_a_rated_drive() {
        let ship = Ship::from_loadout(&loadout(vec![module(
            "FrameShiftDrive",
            "Int_Hyperdrive_Size5_Class5",
        )]))
        .unwrap();

        assert!((ship.fsd.optimal_mass - 1050.0).abs() < f64::EPSILON);
        assert!((ship.fsd.max_fuel_per_jump - 5.0).abs() < f64::EPSILON);
        assert!((ship.fsd.size_const - 2.45).abs() < f64::EPSILON);
        assert!((ship.fsd.rating_const - 12.0).abs() < f64::EPSILON);
        assert!((ship.reserve_size - 0.63).abs() < f64::EPSILON);
    }

    #[test]
    fn engineering_overrides_constants() {
        let mut drive = module("FrameShiftDrive", "int_hyperdrive_size5_class5");
        drive.engineering = Some(Engineering {
            modifiers: vec![
                Modifier {
                    label: "FSDOptimalMass".into(),
                    value: Some(1692.6),
                },
                Modifier {
                    label: "MaxFuelPerJump".into(),
                    value: Some(5.5),
                },
            ],
        });

        let ship = Ship::from_loadout(&loadout(vec![drive])).unwrap();
        assert!((ship.fsd.optimal_mass - 1692.6).abs() < f64::EPSILON);
        assert!((ship.fsd.max_fuel_per_jump - 5.5).abs() < f64::EPSILON);
    }

    #[test]
    fn weapon_text_modifiers_do_not_hide_drive_engineering() {
        let line = r#"{ "event":"Loadout", "MaxJumpRange":45.0, "CargoCapacity":16, "UnladenMass":400.0,
            "FuelCapacity":{ "Main":32.0, "Reserve":0.63 },
            "Modules":[
                { "Slot":"LargeHardpoint1", "Item":"hpt_multicannon_gimbal_large",
                  "Engineering":{ "Modifiers":[ { "Label":"DamageType", "ValueStr":"$Kinetic;" } ] } },
                { "Slot":"FrameShiftDrive", "Item":"int_hyperdrive_size5_class5",
                  "Engineering":{ "Modifiers":[
                      { "Label":"FSDOptimalMass", "Value":1692.6 },
                      { "Label":"MaxFuelPerJump", "Value":5.5 }
                  ] } }
            ] }"#;
        let crate::journal::LogEvent::Loadout(loadout) = crate::journal::decode(line) else {
            panic!("expected loadout");
        };

        let ship = Ship::from_loadout(&loadout).unwrap();
        assert!((ship.fsd.optimal_mass - 1692.6).abs() < f64::EPSILON);
        assert!((ship.fsd.max_fuel_per_jump - 5.5).abs() < f64::EPSILON);
        assert_eq!(ship.max_cargo, 16);
    }

    #[test]
    fn booster_adds_flat_range() {
        let plain = Ship::from_loadout(&loadout(vec![module(
            "FrameShiftDrive",
            "int_hyperdrive_size5_class5",
        )]))
        .unwrap();
        let boosted = Ship::from_loadout(&loadout(vec![
            module("FrameShiftDrive", "int_hyperdrive_size5_class5"),
            module("Slot03_Size5", "int_guardianfsdbooster_size5"),
        ]))
        .unwrap();

        let diff = boosted.jump_range(0) - plain.jump_range(0);
        assert!((diff - 10.5).abs() < 1e-9);
    }

    #[test]
    fn jump_range_matches_drive_formula() {
        let ship = Ship::from_loadout(&loadout(vec![module(
            "FrameShiftDrive",
            "int_hyperdrive_size5_class5",
        )]))
        .unwrap();

        // 1050 * (1000 * 5 / 12)^(1 / 2.45) / (400 + 32)
        let expected = 1050.0 * (5000.0_f64 / 12.0).powf(1.0 / 2.45) / 432.0;
        assert!((ship.jump_range(0) - expected).abs() < 1e-9);
        assert!(ship.jump_range(32) < ship.jump_range(0));
    }

    #[test]
    fn missing_drive_fails() {
        let err = Ship::from_loadout(&loadout(vec![])).unwrap_err();
        assert!(matches!(err, ShipError::NoFrameShiftDrive));
    }

    #[test]
    fn unknown_drive_fails() {
        let err = Ship::from_loadout(&loadout(vec![module(
            "FrameShiftDrive",
            "int_hyperdrive_overcharge_size5_class5",
        )]))
        .unwrap_err();
        assert!(matches!(err, ShipError::UnknownDrive(_)));
    }
}
