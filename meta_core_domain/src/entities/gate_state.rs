//! Drain gate: a single shared boolean the work queue consults before
//! admitting new work, plus a generation counter so waiters can detect a
//! close/reopen cycle without racing on the boolean itself.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// `open` starts `true`. Closing it (component G, on shutdown signal) stops
/// new tasks from being admitted to the work queue; in-flight tasks are left
/// to finish, never cancelled mid-stage.
#[derive(Debug)]
pub struct GateState {
    open: AtomicBool,
    generation: AtomicU64,
}

impl Default for GateState {
    fn default() -> Self {
        Self::new()
    }
}

impl GateState {
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            generation: AtomicU64::new(0),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Closes the gate. Idempotent; returns the generation reached.
    pub fn close(&self) -> u64 {
        self.open.store(false, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Reopens the gate, e.g. after a reload. Idempotent.
    pub fn reopen(&self) -> u64 {
        self.open.store(true, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_open() {
        let gate = GateState::new();
        assert!(gate.is_open());
    }

    #[test]
    fn close_then_reopen_advances_generation() {
        let gate = GateState::new();
        let g1 = gate.close();
        assert!(!gate.is_open());
        let g2 = gate.reopen();
        assert!(gate.is_open());
        assert!(g2 > g1);
    }
}
