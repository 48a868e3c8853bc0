//! Interrupt flag and restart emulators

use std::panic::{self, AssertUnwindSafe};

use exup_core::critical::InterruptControl;
use exup_core::programmer::Restart;

/// Dummy global interrupt-enable flag
///
/// Tracks how deeply interrupts are disabled so tests can check that every
/// disable was paired with a restore.
#[derive(Debug, Clone)]
pub struct DummyInterrupts {
    enabled: bool,
    depth: u32,
    max_depth: u32,
    disables: u32,
}

impl DummyInterrupts {
    /// Create a flag in the given state
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            depth: 0,
            max_depth: 0,
            disables: 0,
        }
    }

    /// Whether interrupts are currently enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of saves not yet restored
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Deepest nesting seen
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Total number of saves
    pub fn disable_count(&self) -> u32 {
        self.disables
    }
}

impl InterruptControl for DummyInterrupts {
    type State = bool;

    fn save_and_disable(&mut self) -> bool {
        let prior = self.enabled;
        self.enabled = false;
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
        self.disables += 1;
        prior
    }

    fn restore(&mut self, state: bool) {
        self.depth = self.depth.saturating_sub(1);
        self.enabled = state;
    }
}

/// Unwind payload used by [`DummyRestart`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartRequested;

/// Restart emulator
///
/// Unwinds with a [`RestartRequested`] payload. Use [`catch_restart`] to
/// observe it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyRestart;

impl Restart for DummyRestart {
    fn restart(&mut self) -> ! {
        log::info!("dummy restart");
        panic::resume_unwind(Box::new(RestartRequested))
    }
}

/// Result of running code that may restart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// The closure returned normally
    Returned(bool),
    /// The closure requested a restart
    Restarted,
}

/// Run `f`, turning a [`DummyRestart`] into [`RestartOutcome::Restarted`]
///
/// Any other panic keeps unwinding.
pub fn catch_restart<F: FnOnce() -> bool>(f: F) -> RestartOutcome {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => RestartOutcome::Returned(value),
        Err(payload) if payload.is::<RestartRequested>() => RestartOutcome::Restarted,
        Err(payload) => panic::resume_unwind(payload),
    }
}
