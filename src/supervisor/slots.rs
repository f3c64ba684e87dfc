use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Bounded pool of worker slots.
#[derive(Debug)]
pub struct WorkerSlots {
    capacity: usize,
    in_use: Mutex<usize>,
    released: Condvar,
}

impl WorkerSlots {
    /// Create a pool with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            in_use: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        *self.in_use.lock()
    }

    /// Take a slot, waiting at most `wait` for one to free up.
    pub fn acquire(&self, wait: Duration) -> Option<SlotGuard<'_>> {
        let deadline = Instant::now() + wait;
        let mut in_use = self.in_use.lock();
        while *in_use >= self.capacity {
            if self.released.wait_until(&mut in_use, deadline).timed_out()
                && *in_use >= self.capacity
            {
                return None;
            }
        }
        *in_use += 1;
        Some(SlotGuard { slots: self })
    }
}

/// A held slot; returned to the pool on drop.
#[derive(Debug)]
pub struct SlotGuard<'a> {
    slots: &'a WorkerSlots,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut in_use = self.slots.in_use.lock();
        *in_use = in_use.saturating_sub(1);
        drop(in_use);
        self.slots.released.notify_one();
    }
}
