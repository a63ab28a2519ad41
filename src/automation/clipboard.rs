//! Clipboard automation: the current system replaces the clipboard text.

use super::{AutomationError, Plotter};

/// Somewhere text can be copied to.
pub trait ClipboardSink {
    fn set_text(&mut self, text: &str) -> Result<(), AutomationError>;
}

/// The system clipboard, opened on first use.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure(&mut self) -> Result<&mut arboard::Clipboard, AutomationError> {
        let clipboard = match self.inner.take() {
            Some(clipboard) => clipboard,
            None => arboard::Clipboard::new()?,
        };
        Ok(self.inner.insert(clipboard))
    }
}

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), AutomationError> {
        self.ensure()?.set_text(text.to_string())?;
        Ok(())
    }
}

/// Pushes systems by copying them to a clipboard.
pub struct ClipboardPlotter {
    sink: Box<dyn ClipboardSink>,
}

impl ClipboardPlotter {
    pub fn new(sink: Box<dyn ClipboardSink>) -> Self {
        Self { sink }
    }
}

impl Plotter for ClipboardPlotter {
    fn push(&mut self, system: &str) -> Result<(), AutomationError> {
        log::info!("copying {system:?} to the clipboard");
        self.sink.set_text(system)
    }

    /// Nothing to release; the clipboard keeps the last system.
    fn stop(&mut self) {}
}
