use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// What the pipeline is doing right now. Only `Idle` accepts new work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Detecting,
    Training,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Detecting => "detecting",
            PipelineState::Training => "training",
        };
        f.write_str(name)
    }
}

/// Outcome of offering a frame to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    Accepted,
    /// The pipeline was busy; the frame was discarded without processing.
    Dropped,
}

/// Single-flight state machine shared between the capture thread and the
/// workers. Transitions out of `Idle` are atomic test-and-set, so two
/// callers can never both start work.
pub struct StateGate {
    state: Mutex<PipelineState>,
    idle: Condvar,
}

impl StateGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PipelineState::Idle),
            idle: Condvar::new(),
        }
    }

    pub fn current(&self) -> PipelineState {
        *self.lock()
    }

    /// Moves from `Idle` to `next`, or returns the state that blocked it.
    pub fn try_begin(&self, next: PipelineState) -> Result<(), PipelineState> {
        let mut state = self.lock();
        if *state != PipelineState::Idle {
            return Err(*state);
        }
        *state = next;
        Ok(())
    }

    /// Returns to `Idle` and wakes every waiter.
    pub fn finish(&self) {
        *self.lock() = PipelineState::Idle;
        self.idle.notify_all();
    }

    /// Blocks until the gate is `Idle` or `timeout` passes. Returns whether
    /// it is idle.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while *state != PipelineState::Idle {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match self.idle.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StateGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the gate to `Idle` when dropped, including during unwinding.
pub struct BusyGuard<'a>(&'a StateGate);

impl<'a> BusyGuard<'a> {
    pub fn new(gate: &'a StateGate) -> Self {
        Self(gate)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Monotonic pipeline counters, safe to bump from any thread.
#[derive(Default)]
pub struct PipelineCounters {
    accepted: AtomicU64,
    dropped: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    enrollments: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountersSnapshot {
    pub accepted: u64,
    pub dropped: u64,
    pub processed: u64,
    pub failed: u64,
    pub enrollments: u64,
}

impl PipelineCounters {
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enrollment(&self) {
        self.enrollments.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            enrollments: self.enrollments.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for CountersSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frames accepted: {}\nFrames dropped: {}\nFrames processed: {}\nFrames failed: {}\nEnrollments: {}",
            self.accepted, self.dropped, self.processed, self.failed, self.enrollments
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_begin_only_from_idle() {
        let gate = StateGate::new();
        assert_eq!(gate.try_begin(PipelineState::Detecting), Ok(()));
        assert_eq!(
            gate.try_begin(PipelineState::Training),
            Err(PipelineState::Detecting)
        );
        gate.finish();
        assert_eq!(gate.try_begin(PipelineState::Training), Ok(()));
        assert_eq!(gate.current(), PipelineState::Training);
    }

    #[test]
    fn test_wait_until_idle_times_out_when_busy() {
        let gate = StateGate::new();
        gate.try_begin(PipelineState::Detecting).unwrap();
        assert!(!gate.wait_until_idle(Duration::from_millis(20)));
    }

    #[test]
    fn test_wait_until_idle_wakes_on_finish() {
        let gate = Arc::new(StateGate::new());
        gate.try_begin(PipelineState::Training).unwrap();
        let worker = {
            let gate = gate.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                gate.finish();
            })
        };
        assert!(gate.wait_until_idle(Duration::from_secs(5)));
        worker.join().unwrap();
    }

    #[test]
    fn test_busy_guard_finishes_on_drop() {
        let gate = StateGate::new();
        gate.try_begin(PipelineState::Detecting).unwrap();
        {
            let _busy = BusyGuard::new(&gate);
        }
        assert_eq!(gate.current(), PipelineState::Idle);
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = PipelineCounters::default();
        counters.record_accepted();
        counters.record_dropped();
        counters.record_dropped();
        let snap = counters.snapshot();
        assert_eq!(snap.accepted, 1);
        assert_eq!(snap.dropped, 2);
        assert!(snap.to_string().contains("Frames dropped: 2"));
    }
}
