//! CLI interface for the pilot.
//!
//! Commands split into two groups:
//!
//! - `neutron-pilot plot neutron|exact`, `nearest` and `ship` read the
//!   journal and talk to the plotting service, then exit (or hand over to
//!   tracking).
//! - `neutron-pilot track|resume` follow the journal and push each next
//!   system to automation until the route is done or the game shuts down.
//!
//! While tracking, stdin accepts `goto N`, `edit N NAME`,
//! `mode clipboard|hotkey`, `fuel PERCENT` and `quit`.

mod format;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::thread;

use clap::{Args, Parser, Subcommand};

use neutron_pilot::automation::{
    AutomationConfig, AutomationDispatcher, AutomationMode, CommandHost, SystemClipboard,
};
use neutron_pilot::config::Config;
use neutron_pilot::journal::{self, JournalState};
use neutron_pilot::model::{Coordinates, Route, Ship, round_distance};
use neutron_pilot::route::{self, RouteTracker};
use neutron_pilot::session::{EndReason, Session, SessionCommand, SessionControl, SessionOptions};
use neutron_pilot::spansh::{
    ExactOptions, ExactRequest, HttpTransport, JobPoller, NeutronRequest, PlotRequest,
    nearest_system, spawn_plot,
};
use neutron_pilot::storage::{LastRoute, Storage};

use format::{format_nearest, format_ship, format_update, format_waypoint};

/// Neutron pilot: follow plotted routes through the galaxy.
#[derive(Debug, Parser)]
#[command(name = "neutron-pilot", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Journal file to read. Defaults to the newest journal in the
    /// configured journal directory.
    #[arg(long, global = true)]
    journal: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r"Workflow: plotting and flying a neutron route
  1. neutron-pilot ship
     → shows the current ship and jump range from the journal
  2. neutron-pilot plot neutron --to Colonia --out colonia.csv --track
  3. fly; every jump pushes the next system to the clipboard
  4. after a restart: neutron-pilot resume

While tracking:
  goto 12            move to row 12
  edit 12 Sol        rename row 12
  mode hotkey        switch automation backend
  fuel 120           alert below 120% of the fuel one jump uses
  quit               save progress and exit";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Track a route from a CSV file.
    Track {
        /// Route file, as written by `plot --out`.
        route: PathBuf,

        /// Row to start at. Defaults to the row after the departure system.
        #[arg(long)]
        index: Option<usize>,
    },

    /// Resume the route saved when the game last shut down or tracking quit.
    Resume,

    /// Plot a new route with the Spansh plotters.
    Plot {
        #[command(subcommand)]
        plotter: Plotter,

        /// Write the route to this CSV file.
        #[arg(long, global = true)]
        out: Option<PathBuf>,

        /// Start tracking the route once plotted.
        #[arg(long, global = true)]
        track: bool,
    },

    /// Show the current ship and its jump range.
    Ship,

    /// Find the catalogued system nearest to a point.
    ///
    /// Defaults to the current position from the journal.
    Nearest {
        #[arg(long, allow_negative_numbers = true, requires_all = ["y", "z"])]
        x: Option<f64>,
        #[arg(long, allow_negative_numbers = true, requires_all = ["x", "z"])]
        y: Option<f64>,
        #[arg(long, allow_negative_numbers = true, requires_all = ["x", "y"])]
        z: Option<f64>,
    },

    /// List journal files, newest first.
    Journals,
}

#[derive(Debug, Args)]
pub struct Endpoints {
    /// Departure system. Defaults to the current location.
    #[arg(long)]
    from: Option<String>,

    /// Destination system.
    #[arg(long)]
    to: String,
}

#[derive(Debug, Subcommand)]
pub enum Plotter {
    /// Neutron plotter: fast routes through neutron stars.
    Neutron {
        #[command(flatten)]
        endpoints: Endpoints,

        /// Jump range in light years. Defaults to the ship's laden range.
        #[arg(long)]
        range: Option<f64>,

        /// Cargo carried, in tons, for the default range. Defaults to the
        /// current cargo.
        #[arg(long)]
        cargo: Option<u32>,

        /// Route efficiency, in percent.
        #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(1..=100))]
        efficiency: u8,
    },

    /// Exact plotter: fuel-aware routes for the current ship.
    Exact {
        #[command(flatten)]
        endpoints: Endpoints,

        /// The drive is already supercharged.
        #[arg(long)]
        supercharged: bool,

        /// Route through neutron stars.
        #[arg(long)]
        use_supercharge: bool,

        /// Use FSD synthesis injections.
        #[arg(long)]
        injections: bool,

        /// Avoid secondary stars.
        #[arg(long)]
        exclude_secondary: bool,

        /// Plot for the ship in this Coriolis export instead of the
        /// journal's current ship.
        #[arg(long, value_name = "FILE", conflicts_with = "coriolis_clipboard")]
        coriolis: Option<PathBuf>,

        /// Like `--coriolis`, reading the export from the clipboard.
        #[arg(long)]
        coriolis_clipboard: bool,
    },
}

/// Run the CLI, returning an error message on failure.
pub fn run(config: &Config, storage: &Storage) -> Result<(), String> {
    let cli = Cli::parse();
    let journal = cli.journal.as_deref();

    match cli.command {
        Command::Track { route: path, index } => {
            let route = route::load_route(&path)
                .map_err(|e| format!("failed to load {}: {e}", path.display()))?;
            let index = index.unwrap_or_else(|| RouteTracker::default_start_index(route.len()));
            cmd_track(config, storage, journal, route, index)
        }
        Command::Resume => {
            let last = storage
                .load_last_route()
                .map_err(|e| format!("cannot resume: {e}"))?;
            eprintln!(
                "Resuming route saved at {} ({} waypoints, row {})",
                last.saved_at,
                last.route.len(),
                last.index
            );
            cmd_track(config, storage, journal, last.route, last.index)
        }
        Command::Plot {
            plotter,
            out,
            track,
        } => {
            let route = cmd_plot(config, journal, &plotter)?;
            if let Some(path) = out {
                route::save_route(&path, &route)
                    .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
                eprintln!("Route written to {}", path.display());
            }
            if track {
                let index = RouteTracker::default_start_index(route.len());
                cmd_track(config, storage, journal, route, index)
            } else {
                print_route(&route);
                Ok(())
            }
        }
        Command::Ship => cmd_ship(config, journal),
        Command::Nearest { x, y, z } => {
            let at = match (x, y, z) {
                (Some(x), Some(y), Some(z)) => Some(Coordinates { x, y, z }),
                _ => None,
            };
            cmd_nearest(config, journal, at)
        }
        Command::Journals => cmd_journals(config),
    }
}

fn cmd_track(
    config: &Config,
    storage: &Storage,
    journal: Option<&Path>,
    route: Route,
    index: usize,
) -> Result<(), String> {
    let journal = resolve_journal(config, journal)?;
    let work_dir = Storage::default_root()
        .ok_or("could not determine home directory")?
        .join("automation");
    let automation = config.automation();
    let dispatcher = AutomationDispatcher::new(
        automation.clone(),
        Box::new(SystemClipboard::new()),
        Box::new(CommandHost),
        work_dir,
    );

    let options = SessionOptions::new(journal.clone(), config.fuel_modifier());
    let session = Session::start(route, index, dispatcher, &options)
        .map_err(|e| format!("failed to start tracking: {e}"))?;

    eprintln!(
        "Tracking {} ({} waypoints)",
        journal.display(),
        session.tracker().route().len()
    );
    spawn_command_reader(session.control(), automation);

    let end = session.run(|update| println!("{}", format_update(&update)));

    match end.reason {
        EndReason::Shutdown | EndReason::Stopped => storage
            .save_last_route(&LastRoute::new(end.route, end.index))
            .map_err(|e| format!("failed to save route: {e}")),
        EndReason::Complete => Ok(()),
    }
}

fn cmd_plot(config: &Config, journal: Option<&Path>, plotter: &Plotter) -> Result<Route, String> {
    let state = journal_state(config, journal)?;

    let request = match plotter {
        Plotter::Neutron {
            endpoints,
            range,
            cargo,
            efficiency,
        } => {
            let range = match range {
                Some(range) => *range,
                None => {
                    let ship = current_ship(&state)?;
                    let cargo = cargo.or(state.cargo).unwrap_or(0);
                    ship.jump_range(cargo)
                }
            };
            PlotRequest::Neutron(NeutronRequest {
                efficiency: *efficiency,
                range: round_distance(range),
                from: departure(endpoints, &state)?,
                to: endpoints.to.clone(),
            })
        }
        Plotter::Exact {
            endpoints,
            supercharged,
            use_supercharge,
            injections,
            exclude_secondary,
            coriolis,
            coriolis_clipboard,
        } => {
            let ship = match (coriolis, *coriolis_clipboard) {
                (Some(path), _) => {
                    let json = std::fs::read_to_string(path)
                        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
                    coriolis_ship(&json)?
                }
                (None, true) => coriolis_ship(&clipboard_text()?)?,
                (None, false) => current_ship(&state)?,
            };
            PlotRequest::Exact(ExactRequest {
                source: departure(endpoints, &state)?,
                destination: endpoints.to.clone(),
                options: ExactOptions {
                    is_supercharged: *supercharged,
                    use_supercharge: *use_supercharge,
                    use_injections: *injections,
                    exclude_secondary: *exclude_secondary,
                },
                ship,
            })
        }
    };

    let transport = HttpTransport::new().map_err(|e| e.to_string())?;
    let poller = JobPoller::new(transport, config.spansh_api.as_str());
    let handle = spawn_plot(poller, request).map_err(|e| format!("failed to start plot: {e}"))?;

    handle
        .wait(|job, retry_in| {
            eprintln!("Job {job} queued, checking again in {}s", retry_in.as_secs());
        })
        .map_err(|e| e.to_string())
}

fn cmd_ship(config: &Config, journal: Option<&Path>) -> Result<(), String> {
    let state = journal_state(config, journal)?;
    let ship = current_ship(&state)?;

    if let Some(location) = &state.location {
        println!("Location: {location}");
    }
    println!("{}", format_ship(&ship, state.cargo.unwrap_or(0)));
    if state.shut_down {
        eprintln!("Note: this journal ends with a shutdown");
    }
    Ok(())
}

fn cmd_nearest(
    config: &Config,
    journal: Option<&Path>,
    at: Option<Coordinates>,
) -> Result<(), String> {
    let at = match at {
        Some(at) => at,
        None => journal_state(config, journal)?
            .position
            .ok_or("no position in the journal; pass --x, --y and --z")?,
    };

    let transport = HttpTransport::new().map_err(|e| e.to_string())?;
    let system = nearest_system(&transport, &config.spansh_api, at).map_err(|e| e.to_string())?;
    println!("{}", format_nearest(&system));
    Ok(())
}

fn cmd_journals(config: &Config) -> Result<(), String> {
    let dir = config
        .journal_dir()
        .ok_or("could not determine journal directory")?;
    let journals = journal::list_journals(&dir)
        .map_err(|e| format!("failed to list {}: {e}", dir.display()))?;

    if journals.is_empty() {
        println!("No journals in {}", dir.display());
        return Ok(());
    }
    for path in &journals {
        println!("{}", path.display());
    }
    Ok(())
}

// ── Helpers ──

fn print_route(route: &Route) {
    for (index, waypoint) in route.iter().enumerate() {
        println!("{}", format_waypoint(index, waypoint));
    }
}

/// The `--journal` path, or the newest journal in the journal directory.
fn resolve_journal(config: &Config, journal: Option<&Path>) -> Result<PathBuf, String> {
    if let Some(path) = journal {
        return Ok(path.to_path_buf());
    }
    let dir = config
        .journal_dir()
        .ok_or("could not determine journal directory")?;
    journal::latest_journal(&dir)
        .map_err(|e| format!("failed to list {}: {e}", dir.display()))?
        .ok_or_else(|| format!("no journals found in {}", dir.display()))
}

fn journal_state(config: &Config, journal: Option<&Path>) -> Result<JournalState, String> {
    let path = resolve_journal(config, journal)?;
    journal::scan(&path).map_err(|e| format!("failed to read {}: {e}", path.display()))
}

fn current_ship(state: &JournalState) -> Result<Ship, String> {
    let loadout = state
        .loadout
        .as_ref()
        .ok_or("no loadout in the journal; load the game first")?;
    Ship::from_loadout(loadout).map_err(|e| e.to_string())
}

fn coriolis_ship(json: &str) -> Result<Ship, String> {
    Ship::from_coriolis(json).map_err(|e| format!("cannot import ship: {e}"))
}

fn clipboard_text() -> Result<String, String> {
    arboard::Clipboard::new()
        .and_then(|mut clipboard| clipboard.get_text())
        .map_err(|e| format!("cannot read the clipboard: {e}"))
}

fn departure(endpoints: &Endpoints, state: &JournalState) -> Result<String, String> {
    endpoints
        .from
        .clone()
        .or_else(|| state.location.clone())
        .ok_or_else(|| "no location in the journal; pass --from".to_string())
}

// ── Interactive commands ──

/// Forward commands typed on stdin to the session.
///
/// The thread is detached: it ends on EOF or at the first command sent
/// after the session is gone.
fn spawn_command_reader(control: SessionControl, automation: AutomationConfig) {
    let spawned = thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            let mut automation = automation;
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line, &automation) {
                    Ok(command) => {
                        if let SessionCommand::Configure(config) = &command {
                            automation = config.clone();
                        }
                        let stop = command == SessionCommand::Stop;
                        if !control.send(command) || stop {
                            break;
                        }
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
        });
    if let Err(e) = spawned {
        log::warn!("interactive commands unavailable: {e}");
    }
}

/// Parse one interactive command line.
fn parse_command(line: &str, automation: &AutomationConfig) -> Result<SessionCommand, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();

    let index = |word: Option<&str>| -> Result<usize, String> {
        word.ok_or("missing row number")?
            .parse()
            .map_err(|_| "row must be a number".to_string())
    };

    match verb {
        "goto" => Ok(SessionCommand::JumpTo(index(words.next())?)),
        "edit" => {
            let index = index(words.next())?;
            let system = words.collect::<Vec<_>>().join(" ");
            if system.is_empty() {
                return Err("usage: edit N NAME".to_string());
            }
            Ok(SessionCommand::Edit { index, system })
        }
        "mode" => {
            let mode = match words.next() {
                Some("clipboard") => AutomationMode::Clipboard,
                Some("hotkey") => AutomationMode::Hotkey,
                _ => return Err("usage: mode clipboard|hotkey".to_string()),
            };
            Ok(SessionCommand::Configure(AutomationConfig {
                mode,
                ..automation.clone()
            }))
        }
        "fuel" => words
            .next()
            .and_then(|w| w.parse::<f64>().ok())
            .filter(|p| *p >= 0.0)
            .map(SessionCommand::SetFuelModifier)
            .ok_or_else(|| "usage: fuel PERCENT".to_string()),
        "quit" | "exit" => Ok(SessionCommand::Stop),
        other => Err(format!("unknown command: {other}")),
    }
}
