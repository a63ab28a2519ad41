//! Route import and export as CSV rows.
//!
//! The layout matches the plotter's own CSV downloads, so routes exported
//! from the website load directly:
//!
//! ```text
//! neutron: System Name, Distance To Arrival, Distance Remaining, Neutron Star, Jumps
//! exact:   System Name, Distance, Distance Remaining, Fuel Left, Fuel Used, Refuel, Neutron Star
//! ```
//!
//! Columns this crate doesn't track are written empty and ignored on read.

use std::fs::File;
use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::model::{ExactWaypoint, NeutronWaypoint, Route, Waypoint, round_distance};

const NEUTRON_HEADER: [&str; 5] = [
    "System Name",
    "Distance To Arrival",
    "Distance Remaining",
    "Neutron Star",
    "Jumps",
];

const EXACT_HEADER: [&str; 7] = [
    "System Name",
    "Distance",
    "Distance Remaining",
    "Fuel Left",
    "Fuel Used",
    "Refuel",
    "Neutron Star",
];

/// Errors reading or writing route rows.
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("row {row}: expected 5 or 7 columns, found {found}")]
    ColumnCount { row: usize, found: usize },

    #[error("row {row}: invalid {field}: {value:?}")]
    InvalidField {
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("route has no waypoints")]
    Empty,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, RowError>;

impl Waypoint {
    /// Encode as a flat row in the plotter CSV layout.
    pub fn to_row(&self) -> Vec<String> {
        match self {
            Self::Neutron(w) => vec![
                w.system.clone(),
                w.distance_jumped.to_string(),
                w.distance_left.to_string(),
                String::new(),
                w.jumps.to_string(),
            ],
            Self::Exact(w) => vec![
                w.system.clone(),
                w.distance.to_string(),
                w.distance_left.to_string(),
                String::new(),
                String::new(),
                yes_no(w.refuel).to_string(),
                yes_no(w.neutron_star).to_string(),
            ],
        }
    }

    /// Decode a row; the column count selects the waypoint shape.
    ///
    /// `row` is only used for error messages.
    pub fn from_row(record: &StringRecord, row: usize) -> Result<Self> {
        let field = |i: usize| record.get(i).unwrap_or_default().trim();

        match record.len() {
            5 => Ok(Self::Neutron(NeutronWaypoint {
                system: field(0).to_string(),
                distance_jumped: parse_distance(field(1), row, "distance")?,
                distance_left: parse_distance(field(2), row, "remaining distance")?,
                jumps: field(4).parse().map_err(|_| RowError::InvalidField {
                    row,
                    field: "jumps",
                    value: field(4).to_string(),
                })?,
            })),
            7 => Ok(Self::Exact(ExactWaypoint {
                system: field(0).to_string(),
                distance: parse_distance(field(1), row, "distance")?,
                distance_left: parse_distance(field(2), row, "remaining distance")?,
                refuel: parse_flag(field(5)),
                neutron_star: parse_flag(field(6)),
            })),
            found => Err(RowError::ColumnCount { row, found }),
        }
    }
}

/// Read a route from CSV. A leading header row is skipped.
pub fn read_route(reader: impl io::Read) -> Result<Route> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut route = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        if i == 0 && record.get(0).is_some_and(|f| f.trim() == "System Name") {
            continue;
        }
        route.push(Waypoint::from_row(&record, i + 1)?);
    }

    if route.is_empty() {
        return Err(RowError::Empty);
    }
    Ok(route)
}

/// Write a route as CSV, with the header of its first waypoint's shape.
pub fn write_route(writer: impl io::Write, route: &Route) -> Result<()> {
    let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);

    match route.first() {
        Some(Waypoint::Neutron(_)) => writer.write_record(NEUTRON_HEADER)?,
        Some(Waypoint::Exact(_)) => writer.write_record(EXACT_HEADER)?,
        None => return Err(RowError::Empty),
    }
    for waypoint in route {
        writer.write_record(waypoint.to_row())?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a route from a CSV file.
pub fn load_route(path: &Path) -> Result<Route> {
    read_route(File::open(path)?)
}

/// Save a route to a CSV file, replacing it.
pub fn save_route(path: &Path, route: &Route) -> Result<()> {
    write_route(File::create(path)?, route)
}

fn parse_distance(value: &str, row: usize, field: &'static str) -> Result<f64> {
    value
        .parse::<f64>()
        .map(round_distance)
        .map_err(|_| RowError::InvalidField {
            row,
            field,
            value: value.to_string(),
        })
}

/// `Yes`/`No` columns; anything starting with `Y` counts as yes.
fn parse_flag(value: &str) -> bool {
    value.starts_with(['Y', 'y'])
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}
