//! Per-stage circuit breaker.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Sliding-window failure breaker.
///
/// Tracks the outcome of the most recent items through a stage; once the
/// window is full and at least half of it failed, the breaker trips and
/// stays tripped - the stage stops pulling new work for the rest of the
/// run.
#[derive(Debug)]
pub struct CircuitBreaker {
    window: Mutex<VecDeque<bool>>,
    capacity: usize,
    tripped: AtomicBool,
}

impl CircuitBreaker {
    /// A breaker over the last `capacity` outcomes.
    pub fn new(capacity: usize) -> Self {
        Self {
            window: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            tripped: AtomicBool::new(false),
        }
    }

    /// Record one item outcome.
    pub fn record(&self, ok: bool) {
        let mut window = self.window.lock().unwrap();
        if window.len() == self.capacity {
            window.pop_front();
        }
        window.push_back(ok);
        if window.len() == self.capacity {
            let failures = window.iter().filter(|ok| !**ok).count();
            if failures * 2 >= self.capacity {
                self.tripped.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Whether the stage should stop pulling new work.
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}
