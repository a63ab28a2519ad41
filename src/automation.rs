//! Automation: handing the current target system to the player's tools.
//!
//! Two backends exist: the clipboard, and a standing hotkey script. The
//! dispatcher owns both, routes pushes to the one the configuration selects,
//! and remembers the current target so a backend switch can re-dispatch it.

mod clipboard;
mod hotkey;

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use clipboard::{ClipboardPlotter, ClipboardSink, SystemClipboard};
pub use hotkey::{
    CommandHost, HotkeyPlotter, HotkeyState, STARTUP_GRACE, ScriptHost, ScriptProcess,
};

#[cfg(test)]
pub(crate) use clipboard::tests::RecordingClipboard;
#[cfg(test)]
pub(crate) use hotkey::tests::{FakeHost, config_in};

/// Errors pushing a system to an automation backend.
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("automation executable path is not set")]
    ExecutableUnset,

    #[error("automation executable not found: {}", .0.display())]
    ExecutableMissing(PathBuf),

    #[error("automation script exited immediately; check the hotkey and script")]
    ProcessExited,

    #[error("clipboard error: {0}")]
    Clipboard(#[from] arboard::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AutomationError {
    /// Whether the error means the automation configuration is unusable.
    ///
    /// These are reported once and not retried until the configuration changes.
    pub fn is_config_invalid(&self) -> bool {
        matches!(
            self,
            Self::ExecutableUnset | Self::ExecutableMissing(_) | Self::ProcessExited
        )
    }
}

/// The capability every automation backend provides.
pub trait Plotter {
    /// Make `system` the current target.
    fn push(&mut self, system: &str) -> Result<(), AutomationError>;

    /// Release any resources held by the backend.
    fn stop(&mut self);
}

/// Which backend receives pushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutomationMode {
    #[default]
    Clipboard,
    Hotkey,
}

/// Hotkey script settings. Any difference restarts the script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotkeyConfig {
    /// The script interpreter, e.g. `AutoHotkey.exe`.
    pub executable: Option<PathBuf>,

    /// Key binding in the interpreter's syntax, e.g. `F5`.
    pub binding: String,

    /// The user's script, run when the hotkey is pressed.
    pub script: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutomationConfig {
    pub mode: AutomationMode,
    pub hotkey: HotkeyConfig,
}

/// Routes pushes to the configured backend.
///
/// Pushes and configuration changes both take `&mut self`, so whoever owns
/// the dispatcher serializes them.
pub struct AutomationDispatcher {
    config: AutomationConfig,
    clipboard: ClipboardPlotter,
    hotkey: HotkeyPlotter,
    target: Option<String>,
}

impl AutomationDispatcher {
    pub fn new(
        config: AutomationConfig,
        clipboard: Box<dyn ClipboardSink>,
        host: Box<dyn ScriptHost>,
        work_dir: PathBuf,
    ) -> Self {
        let hotkey = HotkeyPlotter::new(host, work_dir, config.hotkey.clone());
        Self {
            config,
            clipboard: ClipboardPlotter::new(clipboard),
            hotkey,
            target: None,
        }
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// The last system pushed.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Push `system` to the active backend and remember it as the target.
    pub fn push(&mut self, system: &str) -> Result<(), AutomationError> {
        self.target = Some(system.to_string());
        match self.config.mode {
            AutomationMode::Clipboard => self.clipboard.push(system),
            AutomationMode::Hotkey => self.hotkey.push(system),
        }
    }

    /// Remember `system` as the target without pushing it.
    ///
    /// Used while the configuration is known to be broken; the next
    /// configuration change dispatches it.
    pub fn hold(&mut self, system: &str) {
        self.target = Some(system.to_string());
    }

    /// Swap in a new configuration.
    ///
    /// Leaving hotkey mode terminates the script before anything else happens.
    /// When the active backend changed in any way, the current target is
    /// pushed again through it.
    pub fn apply_config(&mut self, config: AutomationConfig) -> Result<(), AutomationError> {
        if config == self.config {
            return Ok(());
        }

        let mode_changed = config.mode != self.config.mode;
        let hotkey_changed = config.hotkey != self.config.hotkey;
        if mode_changed {
            log::info!("switching automation to {:?}", config.mode);
            self.active().stop();
        }

        self.hotkey.set_config(config.hotkey.clone());
        self.config = config;

        let redispatch =
            mode_changed || (hotkey_changed && self.config.mode == AutomationMode::Hotkey);
        match self.target.clone() {
            Some(target) if redispatch => self.push(&target),
            _ => Ok(()),
        }
    }

    /// Push the retained target again through the active backend.
    ///
    /// For retrying after the environment changed under an unchanged
    /// configuration, e.g. the executable was installed at the configured path.
    pub fn redispatch(&mut self) -> Result<(), AutomationError> {
        match self.target.clone() {
            Some(target) => self.push(&target),
            None => Ok(()),
        }
    }

    /// Stop the active backend.
    pub fn stop(&mut self) {
        self.active().stop();
    }

    pub fn hotkey_state(&self) -> HotkeyState {
        self.hotkey.state()
    }

    fn active(&mut self) -> &mut dyn Plotter {
        match self.config.mode {
            AutomationMode::Clipboard => &mut self.clipboard,
            AutomationMode::Hotkey => &mut self.hotkey,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::Ordering;

    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        clipboard: RecordingClipboard,
        host: FakeHost,
        dispatcher: AutomationDispatcher,
    }

    fn fixture(mode: AutomationMode) -> Fixture {
        let dir = TempDir::new().unwrap();
        let clipboard = RecordingClipboard::default();
        let host = FakeHost::default();
        let config = AutomationConfig {
            mode,
            hotkey: config_in(dir.path()),
        };
        let dispatcher = AutomationDispatcher::new(
            config,
            Box::new(clipboard.clone()),
            Box::new(host.clone()),
            dir.path().join("work"),
        );
        Fixture {
            _dir: dir,
            clipboard,
            host,
            dispatcher,
        }
    }

    #[test]
    fn clipboard_mode_copies() {
        let mut f = fixture(AutomationMode::Clipboard);

        f.dispatcher.push("Sol").unwrap();

        assert_eq!(*f.clipboard.copied.lock().unwrap(), ["Sol"]);
        assert_eq!(f.dispatcher.target(), Some("Sol"));
        assert_eq!(f.host.spawned.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn switching_to_clipboard_terminates_script_once() {
        let mut f = fixture(AutomationMode::Hotkey);
        f.dispatcher.push("Sol").unwrap();
        assert_eq!(f.dispatcher.hotkey_state(), HotkeyState::Running);

        let mut config = f.dispatcher.config().clone();
        config.mode = AutomationMode::Clipboard;
        f.dispatcher.apply_config(config).unwrap();

        assert_eq!(f.host.terminated.load(Ordering::SeqCst), 1);
        assert_eq!(f.dispatcher.hotkey_state(), HotkeyState::Stopped);
        // The retained target went to the clipboard.
        assert_eq!(*f.clipboard.copied.lock().unwrap(), ["Sol"]);

        f.dispatcher.push("Sirius").unwrap();
        assert_eq!(*f.clipboard.copied.lock().unwrap(), ["Sol", "Sirius"]);
        assert_eq!(f.host.terminated.load(Ordering::SeqCst), 1);
        assert_eq!(f.host.spawned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn switching_back_respawns_with_target() {
        let mut f = fixture(AutomationMode::Clipboard);
        f.dispatcher.push("Sol").unwrap();

        let mut config = f.dispatcher.config().clone();
        config.mode = AutomationMode::Hotkey;
        f.dispatcher.apply_config(config).unwrap();

        assert_eq!(f.host.spawned.load(Ordering::SeqCst), 1);
        assert_eq!(f.dispatcher.hotkey_state(), HotkeyState::Running);
        assert_eq!(f.dispatcher.target(), Some("Sol"));
    }

    #[test]
    fn hotkey_change_restarts_script() {
        let mut f = fixture(AutomationMode::Hotkey);
        f.dispatcher.push("Sol").unwrap();

        let mut config = f.dispatcher.config().clone();
        config.hotkey.script = "SendInput, {Enter}".into();
        f.dispatcher.apply_config(config).unwrap();

        assert_eq!(f.host.terminated.load(Ordering::SeqCst), 1);
        assert_eq!(f.host.spawned.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn hotkey_change_in_clipboard_mode_is_quiet() {
        let mut f = fixture(AutomationMode::Clipboard);
        f.dispatcher.push("Sol").unwrap();

        let mut config = f.dispatcher.config().clone();
        config.hotkey.binding = "F6".into();
        f.dispatcher.apply_config(config).unwrap();

        assert_eq!(f.clipboard.copied.lock().unwrap().len(), 1);
        assert_eq!(f.host.spawned.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unchanged_config_is_a_no_op() {
        let mut f = fixture(AutomationMode::Hotkey);
        f.dispatcher.push("Sol").unwrap();

        let config = f.dispatcher.config().clone();
        f.dispatcher.apply_config(config).unwrap();

        assert_eq!(f.host.spawned.load(Ordering::SeqCst), 1);
        assert_eq!(f.host.terminated.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn held_target_goes_out_on_config_change() {
        let mut f = fixture(AutomationMode::Hotkey);
        f.dispatcher.hold("Sol");
        assert_eq!(f.host.spawned.load(Ordering::SeqCst), 0);

        let mut config = f.dispatcher.config().clone();
        config.mode = AutomationMode::Clipboard;
        f.dispatcher.apply_config(config).unwrap();

        assert_eq!(*f.clipboard.copied.lock().unwrap(), ["Sol"]);
    }

    #[test]
    fn redispatch_retries_held_target_under_same_config() {
        let mut f = fixture(AutomationMode::Hotkey);
        let executable = f.dispatcher.config().hotkey.executable.clone().unwrap();
        std::fs::remove_file(&executable).unwrap();

        let err = f.dispatcher.push("Sol").unwrap_err();
        assert!(matches!(err, AutomationError::ExecutableMissing(_)));

        std::fs::write(&executable, "").unwrap();
        f.dispatcher.redispatch().unwrap();

        assert_eq!(f.host.spawned.load(Ordering::SeqCst), 1);
        assert_eq!(f.dispatcher.hotkey_state(), HotkeyState::Running);
    }

    #[test]
    fn redispatch_without_target_is_quiet() {
        let mut f = fixture(AutomationMode::Hotkey);
        f.dispatcher.redispatch().unwrap();
        assert_eq!(f.host.spawned.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_hotkey_config_reports_and_stays_stopped() {
        let mut f = fixture(AutomationMode::Hotkey);
        let mut config = f.dispatcher.config().clone();
        config.hotkey.executable = None;
        f.dispatcher.apply_config(config).unwrap();

        let err = f.dispatcher.push("Sol").unwrap_err();
        assert!(err.is_config_invalid());
        assert_eq!(f.dispatcher.hotkey_state(), HotkeyState::Stopped);
    }
}
