//! Signal handling for the watch loop
//!
//! First interrupt requests a cooperative stop: the session's cancel
//! flag is set, the in-flight build pass (if any) finishes, and the
//! watch loop releases its handles and returns. A second interrupt
//! exits the process immediately. Further interrupts are ignored.

use std::process;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Exit code used when a second interrupt forces an immediate exit.
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared state updated from the signal-handler thread.
#[derive(Debug, Default)]
pub struct SignalState {
    stop_requested: AtomicBool,
    signal_count: AtomicU8,
}

impl SignalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a graceful stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Record one received signal and decide what to do about it.
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);
        if count == 0 {
            self.stop_requested.store(true, Ordering::SeqCst);
            SignalAction::RequestStop
        } else if count == 1 {
            SignalAction::ImmediateExit
        } else {
            SignalAction::Ignore
        }
    }
}

/// Action decided for one received signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: stop after the current pass.
    RequestStop,
    /// Second signal: exit now.
    ImmediateExit,
    /// Third and later signals.
    Ignore,
}

/// Installs the ctrlc handler and wires it to a session cancel flag.
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SignalState::new()),
        }
    }

    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Install the handler. `cancel` is the watch session's cancel flag;
    /// it is set on the first interrupt.
    pub fn install(&self, cancel: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::RequestStop => {
                cancel.store(true, Ordering::SeqCst);
                eprintln!("\nInterrupted, finishing current pass...");
            }
            SignalAction::ImmediateExit => {
                eprintln!("\nSecond interrupt, exiting immediately.");
                process::exit(EXIT_CODE_INTERRUPTED);
            }
            SignalAction::Ignore => {}
        })
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
