//! Lock-free work-stealing scheduler for scenario-parallel execution (§4.7)
//!
//! Each worker owns a bounded circular deque of tasks. The owner pushes and
//! pops at the tail (LIFO, cache-warm); thieves steal at the head (FIFO,
//! distant work). This is deliberately hand-rolled on top of
//! `std::sync::atomic` rather than built on `rayon` or a channel: result
//! slots are index-addressed (§4.6), which a message-passing design can't
//! give us for free.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// A scenario range packed into 32 bits: high 16 bits = start, low 16 bits
/// = count. Zero means "no task" — no zero-start, zero-count task is ever
/// enqueued, so zero is a safe empty sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task(u32);

impl Task {
    pub fn new(start: u16, count: u16) -> Self {
        debug_assert!(count > 0, "a task must cover at least one scenario");
        Task(((start as u32) << 16) | count as u32)
    }

    pub fn start(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn count(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn encode(self) -> u32 {
        self.0
    }

    fn decode(raw: u32) -> Self {
        Task(raw)
    }
}

/// Partition `[0, scenario_count)` into tasks of at most `chunk_size`
/// scenarios each.
pub fn partition_tasks(scenario_count: u32, chunk_size: u32) -> Vec<Task> {
    assert!(chunk_size > 0);
    let mut tasks = Vec::with_capacity(scenario_count.div_ceil(chunk_size) as usize);
    let mut start = 0u32;
    while start < scenario_count {
        let count = chunk_size.min(scenario_count - start);
        tasks.push(Task::new(start as u16, count as u16));
        start += count;
    }
    tasks
}

const STEAL_EMPTY: u8 = 0;
const STEAL_ABORT: u8 = 1;
const STEAL_SUCCESS: u8 = 2;

/// A single worker's bounded circular task deque.
///
/// `capacity` must be a power of two; slots are indexed with `& mask`.
/// Owner operations (`push`/`pop`) are called only from the owning thread.
/// `steal` may be called by any thread.
pub struct Deque {
    slots: Vec<AtomicU32>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl Deque {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(1);
        let slots = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        Self {
            slots,
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Owner push at the tail. Fails if the deque is full; the driver sizes
    /// each deque to its known initial task count, so this should not
    /// happen in normal operation.
    pub fn push(&self, task: Task) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= self.slots.len() {
            return false;
        }
        self.slots[tail & self.mask].store(task.encode(), Ordering::Relaxed);
        self.tail.store(tail + 1, Ordering::Release);
        true
    }

    /// Owner pop at the tail, per the protocol in §4.7.
    pub fn pop(&self) -> Option<Task> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == 0 {
            return None;
        }
        let new_tail = tail - 1;
        self.tail.store(new_tail, Ordering::Relaxed);
        std::sync::atomic::fence(Ordering::SeqCst);
        let head = self.head.load(Ordering::Relaxed);

        if head > new_tail {
            self.tail.store(tail, Ordering::Relaxed);
            return None;
        }

        let raw = self.slots[new_tail & self.mask].load(Ordering::Relaxed);
        if head == new_tail {
            // Last item: contested with any concurrent thief.
            let won = self
                .head
                .compare_exchange(new_tail, new_tail + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
            self.tail.store(new_tail + 1, Ordering::Relaxed);
            if won {
                Some(Task::decode(raw))
            } else {
                None
            }
        } else {
            Some(Task::decode(raw))
        }
    }

    /// Thief steal at the head. Returns `(status, task)`; `task` is only
    /// meaningful when `status == STEAL_SUCCESS`.
    fn try_steal(&self) -> (u8, Task) {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head >= tail {
            return (STEAL_EMPTY, Task(0));
        }
        let raw = self.slots[head & self.mask].load(Ordering::Acquire);
        match self
            .head
            .compare_exchange(head, head + 1, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => (STEAL_SUCCESS, Task::decode(raw)),
            Err(_) => (STEAL_ABORT, Task(0)),
        }
    }

    /// Attempt a steal, retrying on `ABORT` until the deque reports empty
    /// or the steal succeeds. Mirrors the worker-loop victim-retry rule in
    /// §4.7 for a single victim.
    pub fn steal(&self) -> Option<Task> {
        loop {
            match self.try_steal() {
                (STEAL_SUCCESS, task) => return Some(task),
                (STEAL_EMPTY, _) => return None,
                _ => continue,
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head >= tail
    }

    /// Drain all remaining tasks, used when a worker fails and must hand
    /// its outstanding work to the failed-tasks list (§4.7 failure
    /// semantics).
    pub fn drain(&self) -> Vec<Task> {
        let mut drained = Vec::new();
        while let Some(task) = self.pop() {
            drained.push(task);
        }
        drained
    }
}

/// Shared termination signal: set by any worker on failure or by the
/// driver on cancellation. Workers observe it at task boundaries.
pub struct TerminationFlag(AtomicU32);

impl TerminationFlag {
    pub fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    pub fn set(&self) {
        self.0.store(1, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst) != 0
    }
}

impl Default for TerminationFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker loop termination rule: empty-pass counter exceeds `2 * W`.
pub fn termination_threshold(worker_count: usize) -> usize {
    2 * worker_count
}
