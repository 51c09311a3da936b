//! Shared-counter race: the same read-modify-write loop with and without a lock.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Barrier, Mutex as StdMutex};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Operations each incrementing or decrementing thread performs.
pub const OPS_PER_THREAD: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterKind {
    /// Each read-modify-write runs under a mutex.
    Synchronized,
    /// Read and write are separate steps; concurrent updates can be lost.
    Unsynchronized,
}

trait SharedCounter: Sync {
    fn add(&self, delta: i64);
    fn value(&self) -> i64;
}

struct LockedCounter(StdMutex<i64>);

impl SharedCounter for LockedCounter {
    fn add(&self, delta: i64) {
        let mut value = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let local = *value;
        *value = local + delta;
    }

    fn value(&self) -> i64 {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct RacyCounter(AtomicI64);

impl SharedCounter for RacyCounter {
    fn add(&self, delta: i64) {
        let local = self.0.load(Ordering::Relaxed);
        // Give other threads the chance to interleave, even on a single core.
        std::thread::yield_now();
        self.0.store(local + delta, Ordering::Relaxed);
    }

    fn value(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RaceOutcome {
    pub counter: CounterKind,
    pub increments: usize,
    pub decrements: usize,
    pub ops_per_thread: u64,
    pub final_value: i64,
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl RaceOutcome {
    pub fn expected(&self) -> i64 {
        (self.increments as i64 - self.decrements as i64) * self.ops_per_thread as i64
    }

    pub fn is_exact(&self) -> bool {
        self.final_value == self.expected()
    }
}

impl fmt::Display for RaceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Final counter value: {}", self.final_value)?;
        writeln!(f, "Expected value: {}", self.expected())?;
        write!(f, "Execution time: {} ms", self.elapsed.as_millis())
    }
}

/// Run `increments` incrementing and `decrements` decrementing threads of
/// [`OPS_PER_THREAD`] operations each.
pub fn run_race(increments: usize, decrements: usize, counter: CounterKind) -> RaceOutcome {
    run_race_with(increments, decrements, OPS_PER_THREAD, counter)
}

pub fn run_race_with(
    increments: usize,
    decrements: usize,
    ops_per_thread: u64,
    counter: CounterKind,
) -> RaceOutcome {
    tracing::debug!(increments, decrements, ops_per_thread, ?counter, "Race starts");

    let start = Instant::now();
    let final_value = match counter {
        CounterKind::Synchronized => {
            race(&LockedCounter(StdMutex::new(0)), increments, decrements, ops_per_thread)
        }
        CounterKind::Unsynchronized => {
            race(&RacyCounter(AtomicI64::new(0)), increments, decrements, ops_per_thread)
        }
    };
    let elapsed = start.elapsed();

    tracing::debug!(final_value, ?elapsed, "Race finished");
    RaceOutcome {
        counter,
        increments,
        decrements,
        ops_per_thread,
        final_value,
        elapsed,
    }
}

fn race(counter: &impl SharedCounter, increments: usize, decrements: usize, ops: u64) -> i64 {
    let start = Barrier::new(increments + decrements);

    std::thread::scope(|scope| {
        let deltas = std::iter::repeat_n(1, increments).chain(std::iter::repeat_n(-1, decrements));
        for delta in deltas {
            let start = &start;
            scope.spawn(move || {
                start.wait();
                for _ in 0..ops {
                    counter.add(delta);
                }
            });
        }
    });

    counter.value()
}
