use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::ops::Add;
use std::time::Duration;

/// Simulation time measured from the first tick of the run.
///
/// Advances only in fixed steps owned by the loop runner, so two runs fed the
/// same input observe identical timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(Duration);

impl SimTime {
    pub const ZERO: Self = Self(Duration::ZERO);

    pub fn from_duration(elapsed: Duration) -> Self {
        Self(elapsed)
    }

    pub fn from_secs_f64(seconds: f64) -> Self {
        Self(Duration::from_secs_f64(seconds))
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }

    pub fn saturating_duration_since(self, earlier: SimTime) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0.saturating_add(rhs))
    }
}

#[derive(Debug, Default)]
pub struct SimClock {
    now: SimTime,
}

impl SimClock {
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn advance(&mut self, dt: Duration) -> SimTime {
        self.now = self.now + dt;
        self.now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct FiredTimer<T> {
    pub id: TimerId,
    pub deadline: SimTime,
    pub payload: T,
}

struct QueuedTimer<T> {
    deadline: SimTime,
    seq: u64,
    id: TimerId,
    payload: T,
}

impl<T> PartialEq for QueuedTimer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<T> Eq for QueuedTimer<T> {}

impl<T> PartialOrd for QueuedTimer<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueuedTimer<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Deadline-ordered queue of deferred callbacks.
///
/// Timers sharing a deadline fire in scheduling order. Cancelled entries stay
/// in the heap and are skipped when they reach the front.
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<QueuedTimer<T>>>,
    pending: HashSet<TimerId>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashSet::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, deadline: SimTime, payload: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        let id = TimerId(seq);
        self.heap.push(Reverse(QueuedTimer {
            deadline,
            seq,
            id,
            payload,
        }));
        self.pending.insert(id);
        id
    }

    pub fn schedule_after(&mut self, now: SimTime, delay: Duration, payload: T) -> TimerId {
        self.schedule_at(now + delay, payload)
    }

    /// Returns false when the timer already fired or was cancelled before.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.pending.remove(&id)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.contains(&id)
    }

    pub fn pop_due(&mut self, now: SimTime) -> Option<FiredTimer<T>> {
        self.discard_cancelled_front();
        let due = matches!(self.heap.peek(), Some(Reverse(head)) if head.deadline <= now);
        if !due {
            return None;
        }
        let Reverse(timer) = self.heap.pop()?;
        self.pending.remove(&timer.id);
        Some(FiredTimer {
            id: timer.id,
            deadline: timer.deadline,
            payload: timer.payload,
        })
    }

    pub fn next_deadline(&mut self) -> Option<SimTime> {
        self.discard_cancelled_front();
        self.heap.peek().map(|Reverse(head)| head.deadline)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.pending.clear();
    }

    fn discard_cancelled_front(&mut self) {
        while let Some(Reverse(head)) = self.heap.peek() {
            if self.pending.contains(&head.id) {
                break;
            }
            self.heap.pop();
        }
    }
}
