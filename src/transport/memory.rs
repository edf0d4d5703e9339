use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};

use crate::message::OutboundMessage;
use crate::status::StatusSink;

use super::Messenger;

#[derive(Debug, Default)]
struct MemoryState {
    ensemble: Option<String>,
    sent: Vec<OutboundMessage>,
    failing: bool,
    attempts: u64,
    pending_notes: Vec<String>,
}

/// Records every message in memory. Clones share the same record.
#[derive(Clone, Debug, Default)]
pub struct MemoryMessenger {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages accepted so far, in send order.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.inner
            .lock()
            .map(|state| state.sent.clone())
            .unwrap_or_default()
    }

    /// Send attempts, including rejected ones.
    pub fn attempts(&self) -> u64 {
        self.inner.lock().map(|state| state.attempts).unwrap_or(0)
    }

    pub fn ensemble(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|state| state.ensemble.clone())
    }

    /// Queue a connection note for the next `relay_status`.
    pub fn push_note(&self, note: impl Into<String>) {
        if let Ok(mut state) = self.inner.lock() {
            state.pending_notes.push(note.into());
        }
    }

    /// While set, every send fails.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut state) = self.inner.lock() {
            state.failing = failing;
        }
    }
}

impl Messenger for MemoryMessenger {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn initialize(&mut self, ensemble: &str, _status: &mut dyn StatusSink) -> Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory messenger lock poisoned"))?;
        state.ensemble = Some(ensemble.to_string());
        Ok(())
    }

    fn send(&mut self, message: &OutboundMessage) -> Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory messenger lock poisoned"))?;
        state.attempts += 1;
        if state.failing {
            return Err(anyhow!("memory messenger is set to fail"));
        }
        state.sent.push(message.clone());
        Ok(())
    }

    fn relay_status(&mut self, status: &mut dyn StatusSink) {
        let notes = match self.inner.lock() {
            Ok(mut state) => std::mem::take(&mut state.pending_notes),
            Err(_) => return,
        };
        for note in notes {
            status.notify(&note);
        }
    }
}
