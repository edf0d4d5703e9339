//! Status surface: a single human-readable note, last write wins.

use std::sync::{Arc, Mutex};

/// Receives status notifications. Any component may overwrite the current note.
pub trait StatusSink: Send {
    fn notify(&mut self, message: &str);
}

/// Status surface that writes every note to the log.
#[derive(Debug, Default)]
pub struct LogStatus {
    current: Option<String>,
}

impl LogStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

impl StatusSink for LogStatus {
    fn notify(&mut self, message: &str) {
        log::info!("status: {}", message);
        self.current = Some(message.to_string());
    }
}

#[derive(Debug, Default)]
struct NoteState {
    text: String,
    updates: u64,
}

/// Shared in-memory note. Clones observe the same note.
#[derive(Clone, Debug, Default)]
pub struct StatusNote {
    inner: Arc<Mutex<NoteState>>,
}

impl StatusNote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current note text (empty before the first notification).
    pub fn text(&self) -> String {
        self.inner
            .lock()
            .map(|state| state.text.clone())
            .unwrap_or_default()
    }

    /// Number of notifications received so far.
    pub fn updates(&self) -> u64 {
        self.inner.lock().map(|state| state.updates).unwrap_or(0)
    }
}

impl StatusSink for StatusNote {
    fn notify(&mut self, message: &str) {
        log::debug!("status: {}", message);
        if let Ok(mut state) = self.inner.lock() {
            state.text = message.to_string();
            state.updates += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_is_last_write_wins() {
        let note = StatusNote::new();
        let mut writer = note.clone();
        writer.notify("Stopping video");
        writer.notify("Video stopped");
        assert_eq!(note.text(), "Video stopped");
        assert_eq!(note.updates(), 2);
    }

    #[test]
    fn log_status_keeps_only_latest() {
        let mut status = LogStatus::new();
        assert_eq!(status.current(), None);
        status.notify("Loaded Model!");
        status.notify("Starting video");
        assert_eq!(status.current(), Some("Starting video"));
    }
}
