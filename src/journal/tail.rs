//! Following a file that another process keeps appending to.
//!
//! The game owns the journal exclusively and writes to it continuously,
//! so the tailer polls at a fixed interval instead of relying on
//! filesystem notifications.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Poll interval for following the journal.
pub const JOURNAL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Poll interval for re-reading the status file.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Where a tailer starts reading, and how it moves afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailPolicy {
    /// Skip existing content; only see lines appended after opening.
    FromEnd,

    /// Re-read the first line from byte 0 on every cycle.
    ///
    /// For files the game rewrites in place rather than appends to.
    FromStart,
}

/// Shared stop flag for background loops.
///
/// Raising it makes the next suspension exit instead of retrying,
/// so a loop stops within one poll interval.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A line-oriented follower over one file.
pub struct Tailer {
    reader: BufReader<File>,
    policy: TailPolicy,
    interval: Duration,
    stop: StopSignal,
    /// Bytes read past the last newline, completed on a later poll.
    partial: Vec<u8>,
    /// In `FromStart` mode, whether a cycle already produced its line.
    cycled: bool,
}

impl Tailer {
    /// Open `path` with the given policy.
    ///
    /// With [`TailPolicy::FromEnd`] the read cursor is placed at the current end of file.
    pub fn open(
        path: &Path,
        policy: TailPolicy,
        interval: Duration,
        stop: StopSignal,
    ) -> io::Result<Self> {
        let mut file = File::open(path)?;
        if policy == TailPolicy::FromEnd {
            file.seek(SeekFrom::End(0))?;
        }
        Ok(Self {
            reader: BufReader::new(file),
            policy,
            interval,
            stop,
            partial: Vec::new(),
            cycled: false,
        })
    }

    /// Follow appended lines starting at byte `offset` rather than at the end.
    ///
    /// Pairs with the offset a [`scan`](super::scan) stopped at, so nothing
    /// written between the scan and the open is skipped.
    pub fn open_at(
        path: &Path,
        offset: u64,
        interval: Duration,
        stop: StopSignal,
    ) -> io::Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(Self {
            reader: BufReader::new(file),
            policy: TailPolicy::FromEnd,
            interval,
            stop,
            partial: Vec::new(),
            cycled: false,
        })
    }

    /// One non-blocking attempt at reading a complete line.
    ///
    /// `Ok(None)` means nothing is available yet; that's the normal idle outcome.
    pub fn poll_line(&mut self) -> io::Result<Option<String>> {
        match self.policy {
            TailPolicy::FromEnd => self.poll_appended(),
            TailPolicy::FromStart => self.poll_first_line(),
        }
    }

    /// Block until a line is available or the stop signal is raised.
    ///
    /// Read errors are treated like "no data yet" and retried after the interval.
    pub fn next_line(&mut self) -> Option<String> {
        if self.policy == TailPolicy::FromStart && self.cycled && !self.suspend() {
            return None;
        }
        loop {
            if self.stop.is_stopped() {
                return None;
            }
            match self.poll_line() {
                Ok(Some(line)) => {
                    self.cycled = true;
                    return Some(line);
                }
                Ok(None) => {}
                Err(e) => log::debug!("transient read failure, retrying: {e}"),
            }
            if !self.suspend() {
                return None;
            }
        }
    }

    fn poll_appended(&mut self) -> io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.partial)?;
        if read == 0 || self.partial.last() != Some(&b'\n') {
            return Ok(None);
        }
        let bytes = std::mem::take(&mut self.partial);
        let line = String::from_utf8_lossy(&bytes);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn poll_first_line(&mut self) -> io::Result<Option<String>> {
        self.reader.seek(SeekFrom::Start(0))?;
        let mut line = String::new();
        self.reader.read_line(&mut line)?;
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            Ok(None)
        } else {
            Ok(Some(line.to_string()))
        }
    }

    /// Sleep one interval. Returns `false` when the tailer should stop.
    fn suspend(&self) -> bool {
        if self.stop.is_stopped() {
            return false;
        }
        thread::sleep(self.interval);
        !self.stop.is_stopped()
    }
}
