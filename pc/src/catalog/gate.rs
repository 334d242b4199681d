//! Reload coalescing
//!
//! Watch notifications can arrive duplicated and in bursts. The gate lets at
//! most one reload run at a time; requests arriving while one is running
//! collapse into a single "run again" flag that the running reload consumes
//! when it finishes.

use std::sync::Mutex;

use tracing::debug;

#[derive(Debug, Default)]
struct GateState {
    running: bool,
    pending: bool,
}

#[derive(Debug, Default)]
pub struct ReloadGate {
    state: Mutex<GateState>,
}

impl ReloadGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to become the reloader
    ///
    /// Returns `true` if the caller must now run a reload and later call
    /// [`finish`](Self::finish). Returns `false` if a reload is already
    /// running; the request is recorded as pending.
    pub fn try_begin(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.running {
            state.pending = true;
            debug!("ReloadGate::try_begin: reload in flight, marked pending");
            false
        } else {
            state.running = true;
            true
        }
    }

    /// Called by the reloader after each pass
    ///
    /// Returns `true` if another pass was requested meanwhile (the caller
    /// keeps the gate and reloads once more), `false` once the gate is idle.
    pub fn finish(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.pending {
            state.pending = false;
            debug!("ReloadGate::finish: pending request, running again");
            true
        } else {
            state.running = false;
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().map(|s| s.running).unwrap_or(false)
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().map(|s| s.pending).unwrap_or(false)
    }
}
