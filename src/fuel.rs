//! Low fuel alerting.
//!
//! Before the last jump of a neutron leg the player usually needs to scoop.
//! The monitor watches `Status.json` and raises one alert when the main
//! tank drops below a threshold while the ship sits in supercruise with the
//! frame shift drive cooling down (i.e. right after arriving in a system).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::journal::{self, LogEvent, StatusSnapshot, StopSignal, TailPolicy, Tailer};

/// Status flag: in supercruise. Bit 4, counted from the least significant bit.
pub const FLAG_SUPERCRUISE: u64 = 1 << 4;

/// Status flag: frame shift drive cooldown. Bit 18.
pub const FLAG_FSD_COOLDOWN: u64 = 1 << 18;

/// Raised when fuel drops below the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelAlert {
    pub fuel_main: f64,
    pub threshold: f64,
}

/// Edge-triggered fuel threshold detector.
#[derive(Debug, Clone, Default)]
pub struct FuelMonitor {
    threshold: f64,
    held: bool,
}

impl FuelMonitor {
    pub fn new(max_fuel_per_jump: f64, modifier_percent: f64) -> Self {
        let mut monitor = Self::default();
        monitor.set_threshold(max_fuel_per_jump, modifier_percent);
        monitor
    }

    /// Alert below `modifier_percent` percent of the fuel one maximum jump uses.
    pub fn set_threshold(&mut self, max_fuel_per_jump: f64, modifier_percent: f64) {
        self.threshold = max_fuel_per_jump * modifier_percent / 100.0;
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Feed one status snapshot.
    ///
    /// Fires at most once per dip below the threshold; fuel has to rise back
    /// above it before another alert can fire.
    pub fn observe(&mut self, snapshot: &StatusSnapshot, armed: bool) -> Option<FuelAlert> {
        let fuel = snapshot.fuel_main();
        let cooling_in_supercruise = snapshot.flags & FLAG_FSD_COOLDOWN != 0
            && snapshot.flags & FLAG_SUPERCRUISE != 0;

        if fuel < self.threshold && cooling_in_supercruise && !self.held && armed {
            self.held = true;
            log::info!("fuel low: {fuel:.2}t below {:.2}t", self.threshold);
            return Some(FuelAlert {
                fuel_main: fuel,
                threshold: self.threshold,
            });
        }
        if fuel > self.threshold {
            self.held = false;
        }
        None
    }
}

/// State shared between the session and the fuel watcher thread.
#[derive(Debug, Default)]
pub struct FuelGate {
    armed: AtomicBool,
    /// Max fuel per jump and modifier percent.
    limits: Mutex<(f64, f64)>,
}

impl FuelGate {
    pub fn new(max_fuel_per_jump: f64, modifier_percent: f64) -> Self {
        Self {
            armed: AtomicBool::new(false),
            limits: Mutex::new((max_fuel_per_jump, modifier_percent)),
        }
    }

    /// Allow alerts; true only right before the final jump of a leg.
    pub fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn set_max_fuel(&self, max_fuel_per_jump: f64) {
        self.lock().0 = max_fuel_per_jump;
    }

    pub fn set_modifier(&self, modifier_percent: f64) {
        self.lock().1 = modifier_percent;
    }

    fn limits(&self) -> (f64, f64) {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, (f64, f64)> {
        // The guarded pair is plain data; a poisoned lock still holds valid values.
        self.limits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Re-read the status file every `interval` and send an alert through `tx`
/// each time the monitor fires.
///
/// The thread ends when `stop` is raised or the receiver is dropped.
pub fn spawn_fuel_watch<T>(
    status_path: PathBuf,
    interval: Duration,
    gate: Arc<FuelGate>,
    stop: StopSignal,
    tx: Sender<T>,
) -> std::io::Result<JoinHandle<()>>
where
    T: From<FuelAlert> + Send + 'static,
{
    let mut tailer = Tailer::open(&status_path, TailPolicy::FromStart, interval, stop)?;
    let (max_fuel, modifier) = gate.limits();
    let mut monitor = FuelMonitor::new(max_fuel, modifier);

    thread::Builder::new()
        .name("fuel-watch".into())
        .spawn(move || {
            while let Some(line) = tailer.next_line() {
                let LogEvent::StatusSnapshot(snapshot) = journal::decode(&line) else {
                    continue;
                };
                let (max_fuel, modifier) = gate.limits();
                monitor.set_threshold(max_fuel, modifier);
                if let Some(alert) = monitor.observe(&snapshot, gate.is_armed())
                    && tx.send(T::from(alert)).is_err()
                {
                    break;
                }
            }
            log::debug!("fuel watch stopped");
        })
}
