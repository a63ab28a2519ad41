//! Output formatting for CLI display.

use neutron_pilot::model::{Ship, Waypoint};
use neutron_pilot::session::SessionUpdate;
use neutron_pilot::spansh::NearestSystem;

/// One route row: index, system and what's left.
pub(super) fn format_waypoint(index: usize, waypoint: &Waypoint) -> String {
    match waypoint {
        Waypoint::Neutron(w) => format!(
            "{index:>4}  {:<32} {:>10.2} ly left  {} jump(s)",
            w.system, w.distance_left, w.jumps
        ),
        Waypoint::Exact(w) => {
            let mut flags = Vec::new();
            if w.refuel {
                flags.push("refuel");
            }
            if w.neutron_star {
                flags.push("neutron");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!("  [{}]", flags.join(", "))
            };
            format!(
                "{index:>4}  {:<32} {:>10.2} ly left{flags}",
                w.system, w.distance_left
            )
        }
    }
}

pub(super) fn format_update(update: &SessionUpdate) -> String {
    match update {
        SessionUpdate::IndexChanged { index, system } => format!("→ [{index}] {system}"),
        SessionUpdate::RouteComplete => "Route complete".to_string(),
        SessionUpdate::GameShutdown { index, .. } => {
            format!("Game shut down at route index {index}")
        }
        SessionUpdate::FuelAlert(alert) => format!(
            "LOW FUEL: {:.2}t left, below {:.2}t; scoop before the next jump",
            alert.fuel_main, alert.threshold
        ),
        SessionUpdate::Edited { index, system } => format!("Row {index} is now {system}"),
        SessionUpdate::AutomationFailed(err) => format!("Automation failed: {err}"),
        SessionUpdate::Rejected(reason) => format!("Rejected: {reason}"),
    }
}

pub(super) fn format_nearest(system: &NearestSystem) -> String {
    format!(
        "{} ({:.2} ly away) at {:.2} / {:.2} / {:.2}",
        system.name, system.distance, system.x, system.y, system.z
    )
}

pub(super) fn format_ship(ship: &Ship, cargo: u32) -> String {
    format!(
        "FSD: optimal mass {:.1}t, max fuel {:.2}t per jump\n\
         Mass: {:.1}t hull, {:.1}t tank ({:.2}t reserve), cargo {cargo}/{}t\n\
         Jump range: {:.2} ly laden, {:.2} ly empty",
        ship.fsd.optimal_mass,
        ship.fsd.max_fuel_per_jump,
        ship.unladen_mass,
        ship.tank_size,
        ship.reserve_size,
        ship.max_cargo,
        ship.jump_range(cargo),
        ship.jump_range(0),
    )
}
