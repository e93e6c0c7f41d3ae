//! Timer scheduler: one-shot and repeating tasks on a virtual clock.
//!
//! Every actor monitor registers its timers here: a slow repeating
//! precondition poll, a fast repeating detection tick while the precondition
//! holds, and at most one one-shot commit. Timers are identified by an owned
//! [`TimerHandle`]; canceling a handle guarantees its task never fires again.
//!
//! Due timers are handed out one at a time by [`Scheduler::pop_due`] in
//! `(due, task rank, sequence)` order, so a cancel performed while handling
//! an earlier timer takes effect before the next one is popped. At the same
//! instant a detection tick always runs before a commit, which lets a key
//! release seen on that tick cancel the commit.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ids::ActorId;

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Returns the raw handle value.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Check whether the actor is submerged.
    PollPrecondition(ActorId),
    /// Evaluate the actor's held key and probe.
    DetectionTick(ActorId),
    /// Untie the actor's pending target.
    Commit(ActorId),
}

impl Task {
    /// The actor the task belongs to.
    #[must_use]
    pub fn actor(self) -> ActorId {
        match self {
            Self::PollPrecondition(actor) | Self::DetectionTick(actor) | Self::Commit(actor) => {
                actor
            }
        }
    }

    /// Order among tasks due at the same instant. Lower runs first.
    fn rank(self) -> u8 {
        match self {
            Self::PollPrecondition(_) => 0,
            Self::DetectionTick(_) => 1,
            Self::Commit(_) => 2,
        }
    }
}

/// A timer that came due.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fired {
    /// Handle of the timer. Still valid afterwards for repeating timers.
    pub handle: TimerHandle,
    /// The task to run.
    pub task: Task,
    /// The instant the timer was due. Handlers use this as "now".
    pub at: f64,
}

#[derive(Debug, Clone, Copy)]
enum Cadence {
    Once,
    Repeating { interval: f64, jitter: f64 },
}

#[derive(Debug)]
struct TimerEntry {
    task: Task,
    cadence: Cadence,
    /// Sequence number of this timer's live queue slot. Older slots are stale.
    seq: u64,
}

/// A queue slot. Ordered by due time, then task rank, then insertion
/// sequence.
#[derive(Debug, Clone, Copy)]
struct Slot {
    due: f64,
    rank: u8,
    seq: u64,
    handle: TimerHandle,
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Slot {}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .total_cmp(&other.due)
            .then_with(|| self.rank.cmp(&other.rank))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Single-threaded timer scheduler.
#[derive(Debug)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Slot>>,
    timers: HashMap<TimerHandle, TimerEntry>,
    next_handle: u64,
    next_seq: u64,
    rng: StdRng,
}

impl Scheduler {
    /// Create a scheduler whose jitter is drawn from a generator seeded
    /// with `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            queue: BinaryHeap::new(),
            timers: HashMap::new(),
            next_handle: 1,
            next_seq: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Run `task` once, `delay` seconds after `now`.
    pub fn schedule_once(&mut self, now: f64, delay: f64, task: Task) -> TimerHandle {
        self.insert(now + delay.max(0.0), task, Cadence::Once)
    }

    /// Run `task` first at `now + initial_delay`, then every `interval`
    /// seconds, each period spread by a uniform `±jitter`.
    ///
    /// A non-positive or non-finite `interval` fires once and is then
    /// dropped.
    pub fn schedule_repeating(
        &mut self,
        now: f64,
        initial_delay: f64,
        interval: f64,
        jitter: f64,
        task: Task,
    ) -> TimerHandle {
        self.insert(
            now + initial_delay.max(0.0),
            task,
            Cadence::Repeating {
                interval,
                jitter: jitter.max(0.0),
            },
        )
    }

    /// Cancel a timer. Returns `true` if it was still scheduled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.timers.remove(&handle).is_some()
    }

    /// Returns `true` if the timer has not fired (one-shot) or been canceled.
    #[must_use]
    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.timers.contains_key(&handle)
    }

    /// Number of live timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Returns `true` if no timer is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Number of live timers matching `predicate`.
    #[must_use]
    pub fn count_where(&self, predicate: impl Fn(Task) -> bool) -> usize {
        self.timers.values().filter(|e| predicate(e.task)).count()
    }

    /// The due time of the earliest live timer.
    pub fn next_due(&mut self) -> Option<f64> {
        self.discard_stale();
        self.queue.peek().map(|Reverse(slot)| slot.due)
    }

    /// Pop the earliest timer due at or before `now`.
    ///
    /// One-shot timers are forgotten once popped. Repeating timers are
    /// re-queued one period after the instant they were due, so a caller
    /// that drains late catches up period by period.
    pub fn pop_due(&mut self, now: f64) -> Option<Fired> {
        self.discard_stale();
        let Reverse(slot) = *self.queue.peek()?;
        if slot.due > now {
            return None;
        }
        self.queue.pop();

        let (task, cadence) = self
            .timers
            .get(&slot.handle)
            .map(|entry| (entry.task, entry.cadence))?;
        match cadence {
            Cadence::Once => {
                self.timers.remove(&slot.handle);
            }
            Cadence::Repeating { interval, .. } if !(interval.is_finite() && interval > 0.0) => {
                self.timers.remove(&slot.handle);
            }
            Cadence::Repeating { interval, jitter } => {
                let period = self.jittered(interval, jitter);
                let seq = self.bump_seq();
                if let Some(entry) = self.timers.get_mut(&slot.handle) {
                    entry.seq = seq;
                }
                self.queue.push(Reverse(Slot {
                    due: slot.due + period,
                    rank: slot.rank,
                    seq,
                    handle: slot.handle,
                }));
            }
        }

        Some(Fired {
            handle: slot.handle,
            task,
            at: slot.due,
        })
    }

    fn insert(&mut self, due: f64, task: Task, cadence: Cadence) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        let seq = self.bump_seq();
        self.timers.insert(handle, TimerEntry { task, cadence, seq });
        self.queue.push(Reverse(Slot {
            due,
            rank: task.rank(),
            seq,
            handle,
        }));
        handle
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn jittered(&mut self, interval: f64, jitter: f64) -> f64 {
        if jitter <= 0.0 {
            return interval;
        }
        let period = interval + self.rng.random_range(-jitter..=jitter);
        if period > 0.0 { period } else { interval }
    }

    /// Drop queue slots whose timer was canceled or re-queued.
    fn discard_stale(&mut self) {
        while let Some(Reverse(slot)) = self.queue.peek() {
            match self.timers.get(&slot.handle) {
                Some(entry) if entry.seq == slot.seq => break,
                _ => {
                    self.queue.pop();
                }
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(0)
    }
}
