//! Process-wide shutdown guard.

use std::sync::atomic::{AtomicU8, Ordering};

const IDLE: u8 = 0;
const IN_PROGRESS: u8 = 1;
const DONE: u8 = 2;

/// Phase of the launcher's shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// No shutdown requested.
    Idle,
    /// Someone claimed the shutdown; cleanup is running or pending.
    InProgress,
    /// Cleanup finished.
    Done,
}

/// Single-assignment shutdown flag shared between the signal listener and
/// the orchestrator. Never reset.
#[derive(Debug, Default)]
pub struct ShutdownState {
    phase: AtomicU8,
}

impl ShutdownState {
    /// A guard in the idle phase.
    pub const fn new() -> Self {
        Self {
            phase: AtomicU8::new(IDLE),
        }
    }

    /// Claim the shutdown. Returns `true` for exactly one caller.
    pub fn begin(&self) -> bool {
        self.phase
            .compare_exchange(IDLE, IN_PROGRESS, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Mark cleanup as finished.
    pub fn finish(&self) {
        self.phase.store(DONE, Ordering::Release);
    }

    /// Current phase.
    pub fn phase(&self) -> ShutdownPhase {
        match self.phase.load(Ordering::Acquire) {
            IDLE => ShutdownPhase::Idle,
            IN_PROGRESS => ShutdownPhase::InProgress,
            _ => ShutdownPhase::Done,
        }
    }

    /// Whether shutdown has been claimed.
    pub fn is_requested(&self) -> bool {
        self.phase() != ShutdownPhase::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_begin_succeeds_once() {
        let state = ShutdownState::new();
        assert_eq!(state.phase(), ShutdownPhase::Idle);
        assert!(state.begin());
        assert!(!state.begin());
        assert_eq!(state.phase(), ShutdownPhase::InProgress);
    }

    #[test]
    fn test_finish_is_terminal() {
        let state = ShutdownState::new();
        assert!(state.begin());
        state.finish();
        assert_eq!(state.phase(), ShutdownPhase::Done);
        assert!(!state.begin());
        assert!(state.is_requested());
    }

    #[test]
    fn test_concurrent_begin_single_winner() {
        let state = Arc::new(ShutdownState::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || state.begin())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
