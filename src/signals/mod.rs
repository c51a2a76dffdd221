//! Termination signal handling.
//!
//! Signals are received by a dedicated listener task instead of an
//! asynchronous handler. The first SIGTERM or SIGINT claims the
//! [`ShutdownState`] and fires the registered callback (the orchestrator
//! uses it to close the relay loop through a watch channel). Later signals
//! are logged and dropped, so rule cleanup is triggered exactly once no
//! matter how many signals arrive.
//!
//! Once registered, the signal dispositions stay installed for the life of
//! the process: a repeated SIGTERM can no longer kill the launcher halfway
//! through cleanup.

mod state;

use std::fmt;
use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use state::{ShutdownPhase, ShutdownState};

/// A signal that requests shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    /// SIGTERM, sent by the container runtime.
    Terminate,
    /// SIGINT, from an interactive terminal.
    Interrupt,
}

impl fmt::Display for TermSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermSignal::Terminate => write!(f, "SIGTERM"),
            TermSignal::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Routes termination signals to a one-shot shutdown callback.
#[derive(Debug, Clone)]
pub struct SignalCoordinator {
    state: Arc<ShutdownState>,
}

impl SignalCoordinator {
    /// Coordinator guarding `state`.
    pub fn new(state: Arc<ShutdownState>) -> Self {
        Self { state }
    }

    /// The shared shutdown guard.
    pub fn state(&self) -> &Arc<ShutdownState> {
        &self.state
    }

    /// Decide what to do with a received signal.
    ///
    /// Returns `true` if this signal claimed the shutdown.
    pub fn on_signal(&self, signal: TermSignal) -> bool {
        if self.state.begin() {
            info!("Received {}, starting shutdown", signal);
            true
        } else {
            warn!("Received {} while shutdown is already in progress, ignoring", signal);
            false
        }
    }

    /// Install the SIGTERM and SIGINT listeners and spawn the listener task.
    ///
    /// The dispositions are installed before this returns. `on_terminate`
    /// runs at most once, for the signal that claims the shutdown.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register<F>(self, on_terminate: F) -> std::io::Result<JoinHandle<()>>
    where
        F: FnOnce(TermSignal) + Send + 'static,
    {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        debug!("Registered SIGTERM and SIGINT listeners");

        let handle = tokio::spawn(async move {
            let mut on_terminate = Some(on_terminate);
            loop {
                let received = tokio::select! {
                    r = sigterm.recv() => r.map(|()| TermSignal::Terminate),
                    r = sigint.recv() => r.map(|()| TermSignal::Interrupt),
                };
                let Some(sig) = received else {
                    debug!("Signal streams closed, listener exiting");
                    break;
                };

                if self.on_signal(sig)
                    && let Some(callback) = on_terminate.take()
                {
                    callback(sig);
                }
            }
        });

        Ok(handle)
    }
}
