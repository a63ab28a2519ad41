//! The tracking session: one coordinator fed by background watchers.
//!
//! A journal watcher and a fuel watcher run on their own threads and send
//! everything they see over a single channel. The coordinator owns the
//! route tracker and the automation dispatcher, so jumps, edits and
//! configuration changes are applied strictly one at a time.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::automation::{AutomationConfig, AutomationDispatcher, AutomationError};
use crate::fuel::{self, FuelAlert, FuelGate};
use crate::journal::{
    self, JOURNAL_POLL_INTERVAL, Loadout, LogEvent, STATUS_POLL_INTERVAL, StopSignal, Tailer,
};
use crate::model::{Route, Ship};
use crate::route::{EditOutcome, RouteNotice, RouteTracker, TrackerError};

/// Errors starting a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("failed to read journal {}: {source}", path.display())]
    Journal {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to start watcher thread: {0}")]
    Spawn(std::io::Error),
}

// ── Messages ──

/// Everything the coordinator reacts to.
#[derive(Debug)]
pub enum SessionEvent {
    Journal(LogEvent),
    FuelAlert(FuelAlert),
    Command(SessionCommand),
}

impl From<FuelAlert> for SessionEvent {
    fn from(alert: FuelAlert) -> Self {
        Self::FuelAlert(alert)
    }
}

/// Requests from the user while tracking.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Move the cursor to a waypoint by hand.
    JumpTo(usize),

    /// Rename the system of a waypoint.
    Edit { index: usize, system: String },

    /// Switch automation settings.
    Configure(AutomationConfig),

    /// Change the fuel alert percentage.
    SetFuelModifier(f64),

    /// End the session.
    Stop,
}

/// What the coordinator reports back to its owner.
#[derive(Debug)]
pub enum SessionUpdate {
    /// The cursor moved; `system` is the new target.
    IndexChanged { index: usize, system: String },

    RouteComplete,

    GameShutdown { route: Route, index: usize },

    FuelAlert(FuelAlert),

    /// A waypoint was renamed.
    Edited { index: usize, system: String },

    /// Pushing to the automation backend failed.
    AutomationFailed(AutomationError),

    /// A command could not be applied.
    Rejected(String),
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Complete,
    Shutdown,
    Stopped,
}

/// The route and cursor at the end of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEnd {
    pub reason: EndReason,
    pub route: Route,
    pub index: usize,
}

/// Sends commands to a running session from any thread.
#[derive(Debug, Clone)]
pub struct SessionControl {
    tx: Sender<SessionEvent>,
}

impl SessionControl {
    /// Returns false once the session has ended.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.tx.send(SessionEvent::Command(command)).is_ok()
    }
}

// ── Session ──

/// Where the watchers read from and how often.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub journal: PathBuf,
    pub status: PathBuf,
    pub journal_interval: Duration,
    pub status_interval: Duration,
    /// Fuel alert threshold as a percentage of the maximum fuel per jump.
    pub fuel_modifier: f64,
}

impl SessionOptions {
    /// Production intervals for `journal`, with the status file beside it.
    pub fn new(journal: PathBuf, fuel_modifier: f64) -> Self {
        let status = journal.with_file_name(journal::STATUS_FILE);
        Self {
            journal,
            status,
            journal_interval: JOURNAL_POLL_INTERVAL,
            status_interval: STATUS_POLL_INTERVAL,
            fuel_modifier,
        }
    }
}

pub struct Session {
    tracker: RouteTracker,
    dispatcher: AutomationDispatcher,
    gate: Arc<FuelGate>,
    stop: StopSignal,
    tx: Sender<SessionEvent>,
    rx: Receiver<SessionEvent>,
    threads: Vec<JoinHandle<()>>,
    /// The journal already recorded a shutdown; nothing is watched.
    shut_down: bool,
    /// The automation configuration is broken; targets are held, not pushed.
    automation_blocked: bool,
}

impl Session {
    /// Scan the journal and start the watchers.
    ///
    /// A journal that already records a shutdown is not watched; [`Session::run`]
    /// then reports the shutdown immediately.
    pub fn start(
        route: Route,
        start_index: usize,
        dispatcher: AutomationDispatcher,
        options: &SessionOptions,
    ) -> Result<Self, SessionError> {
        let tracker = RouteTracker::new(route, start_index)?;
        let state = journal::scan(&options.journal).map_err(|source| SessionError::Journal {
            path: options.journal.clone(),
            source,
        })?;

        let max_fuel = max_fuel_per_jump(state.loadout.as_ref());
        let gate = Arc::new(FuelGate::new(max_fuel, options.fuel_modifier));
        let (tx, rx) = mpsc::channel();

        let mut session = Self {
            tracker,
            dispatcher,
            gate,
            stop: StopSignal::new(),
            tx,
            rx,
            threads: Vec::new(),
            shut_down: state.shut_down,
            automation_blocked: false,
        };

        if state.shut_down {
            log::warn!(
                "{} already records a shutdown; not tracking",
                options.journal.display()
            );
            return Ok(session);
        }

        let journal_watch = spawn_journal_watch(
            &options.journal,
            state.end_offset,
            options.journal_interval,
            session.stop.clone(),
            session.tx.clone(),
        )
        .map_err(SessionError::Spawn)?;
        session.threads.push(journal_watch);

        match fuel::spawn_fuel_watch(
            options.status.clone(),
            options.status_interval,
            Arc::clone(&session.gate),
            session.stop.clone(),
            session.tx.clone(),
        ) {
            Ok(handle) => session.threads.push(handle),
            Err(e) => log::warn!(
                "fuel alerts disabled, cannot open {}: {e}",
                options.status.display()
            ),
        }

        Ok(session)
    }

    pub fn control(&self) -> SessionControl {
        SessionControl {
            tx: self.tx.clone(),
        }
    }

    pub fn tracker(&self) -> &RouteTracker {
        &self.tracker
    }

    /// Dispatch the current target, then process events until the route
    /// completes, the game shuts down, or a stop command arrives.
    pub fn run(mut self, mut on_update: impl FnMut(SessionUpdate)) -> SessionEnd {
        let reason = self.coordinate(&mut on_update);
        self.finish();
        SessionEnd {
            reason,
            route: self.tracker.route().clone(),
            index: self.tracker.index(),
        }
    }

    fn coordinate(&mut self, on_update: &mut impl FnMut(SessionUpdate)) -> EndReason {
        if self.shut_down {
            on_update(self.tracker.on_shutdown().into_update(&self.tracker));
            return EndReason::Shutdown;
        }
        if self.tracker.is_complete() {
            on_update(SessionUpdate::RouteComplete);
            return EndReason::Complete;
        }
        self.dispatch_target(on_update);

        while let Ok(event) = self.rx.recv() {
            let end = match event {
                SessionEvent::Journal(event) => self.on_log_event(event, on_update),
                SessionEvent::FuelAlert(alert) => {
                    on_update(SessionUpdate::FuelAlert(alert));
                    None
                }
                SessionEvent::Command(command) => self.on_command(command, on_update),
            };
            if let Some(reason) = end {
                return reason;
            }
        }
        EndReason::Stopped
    }

    fn on_log_event(
        &mut self,
        event: LogEvent,
        on_update: &mut impl FnMut(SessionUpdate),
    ) -> Option<EndReason> {
        match event {
            LogEvent::Jump { system_name, .. } => {
                let notice = self.tracker.on_jump(&system_name)?;
                self.on_notice(notice, on_update)
            }
            LogEvent::Shutdown => {
                let notice = self.tracker.on_shutdown();
                self.on_notice(notice, on_update)
            }
            LogEvent::Loadout(loadout) => {
                match Ship::from_loadout(&loadout) {
                    Ok(ship) => {
                        log::debug!(
                            "loadout changed, max fuel per jump {}",
                            ship.fsd.max_fuel_per_jump
                        );
                        self.gate.set_max_fuel(ship.fsd.max_fuel_per_jump);
                    }
                    Err(e) => log::warn!("ignoring loadout: {e}"),
                }
                None
            }
            _ => None,
        }
    }

    fn on_command(
        &mut self,
        command: SessionCommand,
        on_update: &mut impl FnMut(SessionUpdate),
    ) -> Option<EndReason> {
        log::debug!("command: {command:?}");
        match command {
            SessionCommand::JumpTo(index) => match self.tracker.jump_to_index(index) {
                Ok(notice) => self.on_notice(notice, on_update),
                Err(e) => {
                    on_update(SessionUpdate::Rejected(e.to_string()));
                    None
                }
            },
            SessionCommand::Edit { index, system } => {
                match self.tracker.edit_system(index, system.clone()) {
                    Ok(outcome) => {
                        on_update(SessionUpdate::Edited { index, system });
                        if let EditOutcome::Retarget(target) = outcome {
                            self.push(&target, on_update);
                        }
                    }
                    Err(e) => on_update(SessionUpdate::Rejected(e.to_string())),
                }
                None
            }
            SessionCommand::Configure(config) => {
                let was_blocked = std::mem::take(&mut self.automation_blocked);
                // Re-sending the same settings is how a fixed environment gets retried.
                let result = if was_blocked && config == *self.dispatcher.config() {
                    self.dispatcher.redispatch()
                } else {
                    self.dispatcher.apply_config(config)
                };
                if let Err(e) = result {
                    self.report(e, on_update);
                }
                None
            }
            SessionCommand::SetFuelModifier(modifier) => {
                self.gate.set_modifier(modifier);
                None
            }
            SessionCommand::Stop => Some(EndReason::Stopped),
        }
    }

    fn on_notice(
        &mut self,
        notice: RouteNotice,
        on_update: &mut impl FnMut(SessionUpdate),
    ) -> Option<EndReason> {
        let end = match notice {
            RouteNotice::IndexChanged(_) => {
                self.dispatch_target(on_update);
                return None;
            }
            RouteNotice::RouteComplete => EndReason::Complete,
            RouteNotice::GameShutdown { .. } => EndReason::Shutdown,
        };
        self.gate.set_armed(false);
        on_update(notice.into_update(&self.tracker));
        Some(end)
    }

    /// Report the current target and hand it to automation.
    fn dispatch_target(&mut self, on_update: &mut impl FnMut(SessionUpdate)) {
        let Some(target) = self.tracker.current_target() else {
            return;
        };
        let system = target.system().to_string();
        self.gate.set_armed(self.tracker.next_jump_is_final_leg());
        on_update(SessionUpdate::IndexChanged {
            index: self.tracker.index(),
            system: system.clone(),
        });
        self.push(&system, on_update);
    }

    fn push(&mut self, system: &str, on_update: &mut impl FnMut(SessionUpdate)) {
        if self.automation_blocked {
            log::debug!("automation blocked, holding {system:?}");
            self.dispatcher.hold(system);
            return;
        }
        if let Err(e) = self.dispatcher.push(system) {
            self.report(e, on_update);
        }
    }

    fn report(&mut self, err: AutomationError, on_update: &mut impl FnMut(SessionUpdate)) {
        log::error!("automation failed: {err}");
        if err.is_config_invalid() {
            self.automation_blocked = true;
        }
        on_update(SessionUpdate::AutomationFailed(err));
    }

    fn finish(&mut self) {
        self.stop.stop();
        self.dispatcher.stop();
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
        log::debug!("session finished at index {}", self.tracker.index());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

impl RouteNotice {
    fn into_update(self, tracker: &RouteTracker) -> SessionUpdate {
        match self {
            Self::IndexChanged(index) => SessionUpdate::IndexChanged {
                index,
                system: tracker
                    .route()
                    .get(index)
                    .map(|w| w.system().to_string())
                    .unwrap_or_default(),
            },
            Self::RouteComplete => SessionUpdate::RouteComplete,
            Self::GameShutdown { route, index } => SessionUpdate::GameShutdown { route, index },
        }
    }
}

/// Fuel used by a maximum jump of the scanned ship; zero disables alerts.
fn max_fuel_per_jump(loadout: Option<&Loadout>) -> f64 {
    let Some(loadout) = loadout else {
        log::debug!("no loadout in the journal yet");
        return 0.0;
    };
    match Ship::from_loadout(loadout) {
        Ok(ship) => ship.fsd.max_fuel_per_jump,
        Err(e) => {
            log::warn!("ignoring loadout, fuel alerts disabled: {e}");
            0.0
        }
    }
}

/// Follow the journal from where the scan stopped and forward recognised events.
fn spawn_journal_watch(
    path: &std::path::Path,
    offset: u64,
    interval: Duration,
    stop: StopSignal,
    tx: Sender<SessionEvent>,
) -> std::io::Result<JoinHandle<()>> {
    let mut tailer = Tailer::open_at(path, offset, interval, stop)?;

    thread::Builder::new()
        .name("journal-watch".into())
        .spawn(move || {
            while let Some(line) = tailer.next_line() {
                let event = journal::decode(&line);
                if matches!(event, LogEvent::Other) {
                    continue;
                }
                if tx.send(SessionEvent::Journal(event)).is_err() {
                    break;
                }
            }
            log::debug!("journal watch stopped");
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::path::Path;

    use tempfile::TempDir;

    use crate::automation::{AutomationMode, FakeHost, RecordingClipboard, config_in};
    use crate::model::{NeutronWaypoint, Waypoint};

    fn neutron(system: &str, jumps: u32) -> Waypoint {
        Waypoint::Neutron(NeutronWaypoint {
            system: system.into(),
            distance_jumped: 0.0,
            distance_left: 0.0,
            jumps,
        })
    }

    fn route() -> Route {
        vec![neutron("Sol", 0), neutron("Alpha Centauri", 3), neutron("Barnard's Star", 1)]
    }

    struct Fixture {
        dir: TempDir,
        clipboard: RecordingClipboard,
        options: SessionOptions,
    }

    impl Fixture {
        fn new(journal: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("Journal.2026-01-01T000000.01.log");
            fs::write(&path, journal).unwrap();
            let mut options = SessionOptions::new(path, 100.0);
            options.journal_interval = Duration::from_millis(5);
            options.status_interval = Duration::from_millis(5);
            Self {
                dir,
                clipboard: RecordingClipboard::default(),
                options,
            }
        }

        fn dispatcher(&self) -> AutomationDispatcher {
            AutomationDispatcher::new(
                AutomationConfig {
                    mode: AutomationMode::Clipboard,
                    hotkey: config_in(self.dir.path()),
                },
                Box::new(self.clipboard.clone()),
                Box::new(FakeHost::default()),
                self.dir.path().join("work"),
            )
        }

        fn start(&self) -> Session {
            Session::start(route(), 1, self.dispatcher(), &self.options).unwrap()
        }

        fn copied(&self) -> Vec<String> {
            self.clipboard.copied.lock().unwrap().clone()
        }
    }

    fn append(path: &Path, line: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        writeln!(file, "{line}").unwrap();
    }

    fn jump(system: &str) -> String {
        format!(r#"{{ "event":"FSDJump", "StarSystem":"{system}" }}"#)
    }

    #[test]
    fn follows_appended_jumps_to_completion() {
        let f = Fixture::new("{ \"event\":\"Fileheader\" }\n");
        let session = f.start();
        let journal = f.options.journal.clone();

        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            append(&journal, &jump("ALPHA CENTAURI"));
            append(&journal, &jump("Barnard's Star"));
        });

        let mut updates = Vec::new();
        let end = session.run(|u| updates.push(u));
        writer.join().unwrap();

        assert_eq!(end.reason, EndReason::Complete);
        assert_eq!(end.index, 3);
        assert_eq!(f.copied(), ["Alpha Centauri", "Barnard's Star"]);
        assert!(matches!(updates.last(), Some(SessionUpdate::RouteComplete)));
    }

    #[test]
    fn journal_with_shutdown_reports_immediately() {
        let f = Fixture::new("{ \"event\":\"Shutdown\" }\n");
        let session = f.start();

        let mut updates = Vec::new();
        let end = session.run(|u| updates.push(u));

        assert_eq!(end.reason, EndReason::Shutdown);
        assert!(matches!(
            updates.as_slice(),
            [SessionUpdate::GameShutdown { index: 1, .. }]
        ));
        assert!(f.copied().is_empty());
    }

    #[test]
    fn shutdown_while_tracking_ends_session() {
        let f = Fixture::new("");
        let session = f.start();
        let journal = f.options.journal.clone();

        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            append(&journal, &jump("Alpha Centauri"));
            append(&journal, r#"{ "event":"Shutdown" }"#);
        });

        let mut shutdown = None;
        let end = session.run(|u| {
            if let SessionUpdate::GameShutdown { route, index } = u {
                shutdown = Some((route.len(), index));
            }
        });
        writer.join().unwrap();

        assert_eq!(end.reason, EndReason::Shutdown);
        assert_eq!(shutdown, Some((3, 2)));
    }

    #[test]
    fn commands_edit_and_move_the_cursor() {
        let f = Fixture::new("");
        let session = f.start();
        let control = session.control();

        control.send(SessionCommand::Edit {
            index: 1,
            system: "Ross 154".into(),
        });
        control.send(SessionCommand::Edit {
            index: 9,
            system: "Nowhere".into(),
        });
        control.send(SessionCommand::JumpTo(2));
        control.send(SessionCommand::Stop);

        let mut rejected = 0;
        let end = session.run(|u| {
            if matches!(u, SessionUpdate::Rejected(_)) {
                rejected += 1;
            }
        });

        assert_eq!(end.reason, EndReason::Stopped);
        assert_eq!(end.index, 2);
        assert_eq!(end.route[1].system(), "Ross 154");
        assert_eq!(rejected, 1);
        assert_eq!(f.copied(), ["Alpha Centauri", "Ross 154", "Barnard's Star"]);
    }

    #[test]
    fn final_leg_arms_fuel_alert() {
        let f = Fixture::new("");
        let session = f.start();
        assert!(!session.gate.is_armed());

        let control = session.control();
        control.send(SessionCommand::JumpTo(2));
        control.send(SessionCommand::Stop);

        let gate = Arc::clone(&session.gate);
        session.run(|_| {});
        // A stop leaves the gate as the last target set it.
        assert!(gate.is_armed());
    }

    #[test]
    fn broken_hotkey_config_is_reported_once() {
        let f = Fixture::new("");
        let mut dispatcher = f.dispatcher();
        let broken = AutomationConfig {
            mode: AutomationMode::Hotkey,
            hotkey: crate::automation::HotkeyConfig::default(),
        };
        dispatcher.apply_config(broken).unwrap();

        let session = Session::start(route(), 1, dispatcher, &f.options).unwrap();
        let control = session.control();
        control.send(SessionCommand::JumpTo(2));
        control.send(SessionCommand::Configure(AutomationConfig {
            mode: AutomationMode::Clipboard,
            hotkey: crate::automation::HotkeyConfig::default(),
        }));
        control.send(SessionCommand::Stop);

        let mut failures = 0;
        session.run(|u| {
            if matches!(u, SessionUpdate::AutomationFailed(_)) {
                failures += 1;
            }
        });

        assert_eq!(failures, 1);
        // The held target went out once the configuration was fixed.
        assert_eq!(f.copied(), ["Barnard's Star"]);
    }

    #[test]
    fn same_config_retries_once_environment_is_fixed() {
        let f = Fixture::new("");
        let host = FakeHost::default();
        let hotkey = config_in(f.dir.path());
        let executable = hotkey.executable.clone().unwrap();
        fs::remove_file(&executable).unwrap();
        let config = AutomationConfig {
            mode: AutomationMode::Hotkey,
            hotkey,
        };
        let dispatcher = AutomationDispatcher::new(
            config.clone(),
            Box::new(f.clipboard.clone()),
            Box::new(host.clone()),
            f.dir.path().join("work"),
        );

        let session = Session::start(route(), 1, dispatcher, &f.options).unwrap();
        let control = session.control();
        let mut failures = 0;
        session.run(|u| {
            if matches!(u, SessionUpdate::AutomationFailed(_)) {
                failures += 1;
                fs::write(&executable, "").unwrap();
                control.send(SessionCommand::Configure(config.clone()));
                control.send(SessionCommand::Stop);
            }
        });

        assert_eq!(failures, 1);
        assert_eq!(host.spawned.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    fn loadout_line(drive: &str) -> String {
        format!(
            r#"{{ "event":"Loadout", "MaxJumpRange":40.0, "CargoCapacity":0, "UnladenMass":300.0,
                "FuelCapacity":{{ "Main":16.0 }},
                "Modules":[ {{ "Slot":"FrameShiftDrive", "Item":"{drive}" }} ] }}"#
        )
        .replace('\n', " ")
    }

    #[test]
    fn unknown_drive_at_start_disables_alerts() {
        let loadout = |drive: &str| match journal::decode(&loadout_line(drive)) {
            LogEvent::Loadout(loadout) => loadout,
            other => panic!("expected loadout, got {other:?}"),
        };

        let stock = loadout("int_hyperdrive_size5_class5");
        assert!((max_fuel_per_jump(Some(&stock)) - 5.0).abs() < f64::EPSILON);

        let overcharged = loadout("int_hyperdrive_overcharge_size5_class5");
        assert!(max_fuel_per_jump(Some(&overcharged)).abs() < f64::EPSILON);
        assert!(max_fuel_per_jump(None).abs() < f64::EPSILON);

        // The session still starts and tracks; only the alert is off.
        let f = Fixture::new(&(loadout_line("int_hyperdrive_overcharge_size5_class5") + "\n"));
        let session = f.start();
        session.control().send(SessionCommand::Stop);
        assert_eq!(session.run(|_| {}).reason, EndReason::Stopped);
    }

    #[test]
    fn out_of_range_start_is_rejected() {
        let f = Fixture::new("");
        let err = Session::start(route(), 4, f.dispatcher(), &f.options).err().unwrap();
        assert!(matches!(err, SessionError::Tracker(_)));
    }
}
