//! Dead-time buffer: bounded FIFO of `(time, mv)` samples.
//!
//! Holds the last `capacity` MVs. [`DeadTimeBuffer::pop`] reads the oldest
//! sample once the buffer is full, so a rollout that pops before pushing on
//! every tick sees each MV exactly `capacity` ticks after it was pushed.
//! Until `capacity` samples have been pushed the delayed MV is undefined:
//! `pop` returns 0 and logs an empty-buffer warning.

use std::collections::VecDeque;

use tracing::warn;

/// One recorded MV sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MvSample {
    pub time: f64,
    pub value: f64,
}

/// Bounded FIFO of MV samples with oldest-first eviction.
#[derive(Debug, Clone)]
pub struct DeadTimeBuffer {
    samples: VecDeque<MvSample>,
    capacity: usize,
    empty_pops: u64,
}

impl DeadTimeBuffer {
    /// Create an empty buffer holding at most `capacity` samples.
    ///
    /// Storage is allocated once here; pushes never reallocate.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            empty_pops: 0,
        }
    }

    /// Append a sample, evicting the oldest once over capacity.
    pub fn push(&mut self, time: f64, value: f64) {
        self.samples.push_back(MvSample { time, value });
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Delayed MV, or `None` while fewer than `capacity` samples are held.
    pub fn try_pop(&self) -> Option<f64> {
        if self.capacity == 0 || self.samples.len() < self.capacity {
            return None;
        }
        self.samples.front().map(|s| s.value)
    }

    /// Delayed MV. Returns 0 with a warning during the startup transient.
    pub fn pop(&mut self) -> f64 {
        match self.try_pop() {
            Some(value) => value,
            None => {
                self.empty_pops += 1;
                warn!(
                    held = self.samples.len(),
                    capacity = self.capacity,
                    "dead-time buffer empty, delayed MV defaults to 0"
                );
                0.0
            }
        }
    }

    /// Sample at `offset` ticks back from the newest (0 = newest).
    pub fn get_back(&self, offset: usize) -> Option<&MvSample> {
        let len = self.samples.len();
        if offset >= len {
            return None;
        }
        self.samples.get(len - 1 - offset)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pops that hit the empty-buffer fallback.
    pub fn empty_pops(&self) -> u64 {
        self.empty_pops
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
