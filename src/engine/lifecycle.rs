// src/engine/lifecycle.rs

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Process lifecycle: `Uninitialized → Running → Stopped`, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Running,
    Stopped,
}

impl LifecycleState {
    fn as_u8(self) -> u8 {
        match self {
            LifecycleState::Uninitialized => 0,
            LifecycleState::Running => 1,
            LifecycleState::Stopped => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LifecycleState::Uninitialized,
            1 => LifecycleState::Running,
            _ => LifecycleState::Stopped,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Atomic lifecycle state machine.
///
/// Each transition is a single compare-and-swap, so when several shutdown
/// triggers race exactly one of them wins.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Uninitialized.as_u8()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Uninitialized → Running`. On failure returns the current state.
    pub fn start(&self) -> Result<(), LifecycleState> {
        self.transition(LifecycleState::Uninitialized, LifecycleState::Running)
    }

    /// `Running → Stopped`. Returns true for the single caller that
    /// performed the transition.
    pub fn stop(&self) -> bool {
        if self
            .transition(LifecycleState::Running, LifecycleState::Stopped)
            .is_ok()
        {
            return true;
        }
        // Never started: retire it so a late boot cannot run.
        let _ = self.transition(LifecycleState::Uninitialized, LifecycleState::Stopped);
        false
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), LifecycleState> {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(LifecycleState::from_u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn transitions_are_one_directional() {
        let lc = Lifecycle::new();
        assert_eq!(lc.state(), LifecycleState::Uninitialized);

        assert!(lc.start().is_ok());
        assert_eq!(lc.start(), Err(LifecycleState::Running));

        assert!(lc.stop());
        assert!(!lc.stop());
        assert_eq!(lc.start(), Err(LifecycleState::Stopped));
    }

    #[test]
    fn stop_before_start_retires_the_lifecycle() {
        let lc = Lifecycle::new();
        assert!(!lc.stop());
        assert_eq!(lc.state(), LifecycleState::Stopped);
        assert!(lc.start().is_err());
    }

    #[test]
    fn concurrent_stops_have_one_winner() {
        let lc = Arc::new(Lifecycle::new());
        lc.start().unwrap();
        let winners = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let lc = Arc::clone(&lc);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    if lc.stop() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
