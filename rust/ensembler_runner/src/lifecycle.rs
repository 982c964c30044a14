//! Runner lifecycle.
//!
//! `Starting → Loading → Ready → Serving → Stopping → Stopped`, with
//! `Loading → FailedLoad` when the artifact cannot be loaded.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Starting = 0,
    Loading = 1,
    Ready = 2,
    Serving = 3,
    Stopping = 4,
    Stopped = 5,
    FailedLoad = 6,
}

impl Phase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Phase::Starting,
            1 => Phase::Loading,
            2 => Phase::Ready,
            3 => Phase::Serving,
            4 => Phase::Stopping,
            5 => Phase::Stopped,
            _ => Phase::FailedLoad,
        }
    }

    fn can_follow(self, previous: Phase) -> bool {
        use Phase::*;
        matches!(
            (previous, self),
            (Starting, Loading)
                | (Loading, Ready)
                | (Loading, FailedLoad)
                | (Ready, Serving)
                | (Ready, Stopping)
                | (Serving, Stopping)
                | (Stopping, Stopped)
        )
    }

    pub fn is_ready(self) -> bool {
        matches!(self, Phase::Ready | Phase::Serving)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Shared lifecycle flag, read lock-free by request handlers.
#[derive(Debug)]
pub struct Lifecycle {
    phase: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Starting as u8),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.phase().is_ready()
    }

    /// Move to `next`. Returns false and leaves the phase unchanged when the
    /// transition is not allowed.
    pub fn advance(&self, next: Phase) -> bool {
        let mut current = self.phase.load(Ordering::Acquire);
        loop {
            let previous = Phase::from_u8(current);
            if !next.can_follow(previous) {
                warn!(from = %previous, to = %next, "Ignoring invalid lifecycle transition");
                return false;
            }
            match self.phase.compare_exchange(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    info!(from = %previous, to = %next, "Runner lifecycle transition");
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.is_ready());
        for phase in [
            Phase::Loading,
            Phase::Ready,
            Phase::Serving,
            Phase::Stopping,
            Phase::Stopped,
        ] {
            assert!(lifecycle.advance(phase));
        }
        assert_eq!(lifecycle.phase(), Phase::Stopped);
    }

    #[test]
    fn test_failed_load_is_terminal() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.advance(Phase::Loading));
        assert!(lifecycle.advance(Phase::FailedLoad));
        assert!(!lifecycle.advance(Phase::Ready));
        assert!(!lifecycle.is_ready());
    }

    #[test]
    fn test_cannot_skip_loading() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.advance(Phase::Ready));
        assert_eq!(lifecycle.phase(), Phase::Starting);
    }
}
