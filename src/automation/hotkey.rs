//! Hotkey script automation.
//!
//! A standing script process (AutoHotkey on Windows) binds the configured
//! hotkey and runs the user's script when it's pressed. The current system
//! is handed over through a side-channel file that the script reads on
//! every press; the same file is the process's stdin.
//!
//! ```text
//! stopped ──push──▶ starting ──(alive after grace window)──▶ running
//!    ▲                 │                                      │
//!    └──(error)────────┘◀─── stop / config change / exited ───┘
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use super::{AutomationError, HotkeyConfig, Plotter};

/// A process that exits within this window after spawning is treated as a
/// broken script or hotkey binding.
pub const STARTUP_GRACE: Duration = Duration::from_millis(100);

const SCRIPT_FILE: &str = "hotkey_script.ahk";
const CHANNEL_FILE: &str = "hotkey_channel";

/// The script the user's snippet is wrapped in.
///
/// `{hotkey}`, `{channel}` and `{user_script}` are substituted; the user
/// script sees the current system in the `system` variable.
const SCRIPT_TEMPLATE: &str = "\
#NoEnv
#SingleInstance, Force
#Persistent
SendMode Input
SetWorkingDir %A_ScriptDir%
global system := \"\"

{hotkey}::
    FileReadLine, system, {channel}, 1
{user_script}
return
";

/// Spawns script processes.
pub trait ScriptHost {
    fn spawn(
        &mut self,
        executable: &Path,
        script: &Path,
        stdin: File,
    ) -> io::Result<Box<dyn ScriptProcess>>;
}

/// A running script process.
pub trait ScriptProcess {
    /// Non-blocking check for whether the process has exited.
    fn has_exited(&mut self) -> io::Result<bool>;

    fn terminate(&mut self) -> io::Result<()>;
}

/// Spawns real child processes: `<executable> <script>`.
#[derive(Debug, Default)]
pub struct CommandHost;

impl ScriptHost for CommandHost {
    fn spawn(
        &mut self,
        executable: &Path,
        script: &Path,
        stdin: File,
    ) -> io::Result<Box<dyn ScriptProcess>> {
        let child = Command::new(executable)
            .arg(script)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(Box::new(child))
    }
}

impl ScriptProcess for Child {
    fn has_exited(&mut self) -> io::Result<bool> {
        Ok(self.try_wait()?.is_some())
    }

    fn terminate(&mut self) -> io::Result<()> {
        if self.try_wait()?.is_none() {
            self.kill()?;
        }
        self.wait()?;
        Ok(())
    }
}

/// Lifecycle state of the script process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyState {
    Stopped,
    Running,
}

struct Running {
    process: Box<dyn ScriptProcess>,
    channel: File,
    /// The configuration the process was started with.
    config: HotkeyConfig,
}

/// Pushes systems to a standing hotkey script.
pub struct HotkeyPlotter {
    host: Box<dyn ScriptHost>,
    work_dir: PathBuf,
    config: HotkeyConfig,
    running: Option<Running>,
}

impl HotkeyPlotter {
    /// `work_dir` holds the rendered script and the side-channel file.
    pub fn new(host: Box<dyn ScriptHost>, work_dir: PathBuf, config: HotkeyConfig) -> Self {
        Self {
            host,
            work_dir,
            config,
            running: None,
        }
    }

    pub fn state(&self) -> HotkeyState {
        if self.running.is_some() {
            HotkeyState::Running
        } else {
            HotkeyState::Stopped
        }
    }

    /// Replace the desired configuration.
    ///
    /// A running process with a different configuration is replaced on the next push.
    pub fn set_config(&mut self, config: HotkeyConfig) {
        self.config = config;
    }

    pub fn channel_path(&self) -> PathBuf {
        self.work_dir.join(CHANNEL_FILE)
    }

    fn script_path(&self) -> PathBuf {
        self.work_dir.join(SCRIPT_FILE)
    }

    fn start(&mut self) -> Result<(), AutomationError> {
        self.stop();

        let executable = self
            .config
            .executable
            .clone()
            .ok_or(AutomationError::ExecutableUnset)?;
        if !executable.is_file() {
            log::error!("automation executable not found at {}", executable.display());
            return Err(AutomationError::ExecutableMissing(executable));
        }

        fs::create_dir_all(&self.work_dir)?;
        let script_path = self.script_path();
        let channel_path = self.channel_path();
        fs::write(&script_path, render_script(&self.config, &channel_path))?;

        let channel = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&channel_path)?;

        log::info!(
            "spawning hotkey script {} with {}",
            script_path.display(),
            executable.display()
        );
        let mut process = self
            .host
            .spawn(&executable, &script_path, channel.try_clone()?)?;

        thread::sleep(STARTUP_GRACE);
        let exited = match process.has_exited() {
            Ok(exited) => exited,
            Err(e) => {
                log::error!("unable to check on hotkey script, terminating it: {e}");
                if let Err(kill) = process.terminate() {
                    log::warn!("failed to terminate hotkey script: {kill}");
                }
                remove_script(&script_path);
                return Err(e.into());
            }
        };
        if exited {
            log::error!("hotkey script exited during startup");
            remove_script(&script_path);
            return Err(AutomationError::ProcessExited);
        }

        self.running = Some(Running {
            process,
            channel,
            config: self.config.clone(),
        });
        log::debug!("hotkey script running");
        Ok(())
    }
}

impl Plotter for HotkeyPlotter {
    fn push(&mut self, system: &str) -> Result<(), AutomationError> {
        if self
            .running
            .as_ref()
            .is_some_and(|r| r.config != self.config)
        {
            log::debug!("hotkey configuration changed, restarting script");
            self.stop();
        }

        let exited = match &mut self.running {
            Some(running) => running.process.has_exited()?,
            None => false,
        };
        if exited {
            log::warn!("hotkey script exited, restarting it");
            self.stop();
        }

        if self.running.is_none() {
            self.start()?;
        }
        let Some(running) = &mut self.running else {
            return Ok(());
        };

        write_channel(&mut running.channel, system)?;
        log::debug!("wrote {system:?} to the hotkey channel");
        Ok(())
    }

    fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };
        log::debug!("terminating hotkey script");
        if let Err(e) = running.process.terminate() {
            log::warn!("failed to terminate hotkey script: {e}");
        }
        drop(running.channel);
        remove_script(&self.script_path());
    }
}

impl Drop for HotkeyPlotter {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Rewrite the channel in place: the reader keeps the same open file.
fn write_channel(channel: &mut File, system: &str) -> io::Result<()> {
    let line = format!("{system}\n");
    channel.seek(SeekFrom::Start(0))?;
    channel.write_all(line.as_bytes())?;
    channel.set_len(line.len() as u64)?;
    channel.flush()?;
    channel.seek(SeekFrom::Start(0))?;
    Ok(())
}

fn render_script(config: &HotkeyConfig, channel: &Path) -> String {
    SCRIPT_TEMPLATE
        .replace("{hotkey}", &config.binding)
        .replace("{channel}", &channel.display().to_string())
        .replace("{user_script}", &config.script)
}

fn remove_script(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != io::ErrorKind::NotFound
    {
        log::warn!("unable to delete script file at {}: {e}", path.display());
    }
}
