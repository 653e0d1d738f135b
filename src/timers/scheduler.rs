//! One-shot timer scheduling.

use crate::error::Result;
use crate::types::Timestamp;
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{trace, warn};

/// Work run once when a timer fires.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle for cancelling a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Clock plus one-shot timers.
pub trait Scheduler: Send + Sync {
    /// Current time on this scheduler's clock.
    fn now(&self) -> Timestamp;

    /// Run `task` once after `delay`.
    fn schedule(&self, delay: Duration, task: Task) -> TimerId;

    /// Cancel a pending task. Returns false if it already ran or never existed.
    fn cancel(&self, timer: TimerId) -> bool;

    /// Number of tasks waiting to fire.
    fn pending(&self) -> usize;
}

/// Deadline-ordered task queue.
///
/// Ties on the deadline fire in scheduling order since ids only grow.
#[derive(Default)]
struct TimerQueue {
    next_id: u64,
    tasks: BTreeMap<(Timestamp, TimerId), Task>,
    deadlines: HashMap<TimerId, Timestamp>,
}

impl TimerQueue {
    fn insert(&mut self, deadline: Timestamp, task: Task) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.tasks.insert((deadline, id), task);
        self.deadlines.insert(id, deadline);
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.tasks.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    fn next_deadline(&self) -> Option<Timestamp> {
        self.tasks.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Pop the earliest task due at or before `now`.
    fn pop_due(&mut self, now: Timestamp) -> Option<(Timestamp, Task)> {
        let key = *self.tasks.keys().next()?;
        if key.0 > now {
            return None;
        }
        self.deadlines.remove(&key.1);
        self.tasks.remove(&key).map(|task| (key.0, task))
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }
}

/// Deterministic scheduler driven by explicit clock advances.
///
/// Nothing fires until [`advance`](Self::advance) or
/// [`advance_to`](Self::advance_to) is called. Tasks run on the calling
/// thread with the clock set to their deadline.
pub struct ManualScheduler {
    now: Mutex<Timestamp>,
    queue: Mutex<TimerQueue>,
}

impl ManualScheduler {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
            queue: Mutex::new(TimerQueue::default()),
        }
    }

    /// Move the clock forward by `by`, running everything that falls due.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now().saturating_add(by);
        self.advance_to(target)
    }

    /// Move the clock to `target`, running everything that falls due.
    ///
    /// Tasks scheduled by running tasks also run if they fall due before
    /// `target`. The clock never moves backwards.
    pub fn advance_to(&self, target: Timestamp) -> usize {
        let mut ran = 0;

        loop {
            let next = self.queue.lock().pop_due(target);
            let Some((deadline, task)) = next else {
                break;
            };

            {
                let mut now = self.now.lock();
                if deadline > *now {
                    *now = deadline;
                }
            }

            task();
            ran += 1;
        }

        let mut now = self.now.lock();
        if target > *now {
            *now = target;
        }
        ran
    }

    /// Deadline of the earliest pending task.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.queue.lock().next_deadline()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new(Timestamp(0))
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let deadline = self.now().saturating_add(delay);
        self.queue.lock().insert(deadline, task)
    }

    fn cancel(&self, timer: TimerId) -> bool {
        self.queue.lock().cancel(timer)
    }

    fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

enum Signal {
    Wake,
    Shutdown,
}

/// Wall-clock scheduler backed by a worker thread.
///
/// The worker sleeps until the earliest deadline or until a new timer is
/// scheduled. The thread is stopped and joined on drop.
pub struct ThreadScheduler {
    queue: Arc<Mutex<TimerQueue>>,
    signals: Sender<Signal>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadScheduler {
    /// Start the worker thread.
    pub fn new() -> Result<Self> {
        let queue = Arc::new(Mutex::new(TimerQueue::default()));
        let (signals, receiver) = unbounded();

        let worker_queue = Arc::clone(&queue);
        let worker = thread::Builder::new()
            .name("herald-timers".to_string())
            .spawn(move || loop {
                let due = {
                    let now = Timestamp::now();
                    let mut queue = worker_queue.lock();
                    let mut due = Vec::new();
                    while let Some((_, task)) = queue.pop_due(now) {
                        due.push(task);
                    }
                    due
                };

                for task in due {
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        warn!("Timer task panicked");
                    }
                }

                let next = worker_queue.lock().next_deadline();
                let signal = match next {
                    Some(deadline) => {
                        let wait = deadline.duration_since(Timestamp::now());
                        receiver.recv_timeout(wait)
                    }
                    None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };

                match signal {
                    Ok(Signal::Wake) | Err(RecvTimeoutError::Timeout) => continue,
                    Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Self {
            queue,
            signals,
            worker: Some(worker),
        })
    }
}

impl Scheduler for ThreadScheduler {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let deadline = Timestamp::now().saturating_add(delay);
        let id = self.queue.lock().insert(deadline, task);
        trace!(timer = id.0, delay_ms = delay.as_millis() as u64, "Timer armed");
        // Worker gone means nothing will fire; the task stays queued
        let _ = self.signals.send(Signal::Wake);
        id
    }

    fn cancel(&self, timer: TimerId) -> bool {
        self.queue.lock().cancel(timer)
    }

    fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        let _ = self.signals.send(Signal::Shutdown);
        if let Some(worker) = self.worker.take() {
            // A task may drop the last owner from inside the worker itself
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |label: &'static str| -> Task {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().push(label))
        };
        (log, make)
    }

    #[test]
    fn test_manual_fires_in_deadline_order() {
        let clock = ManualScheduler::new(Timestamp(0));
        let (log, task) = recorder();

        clock.schedule(Duration::from_millis(30), task("late"));
        clock.schedule(Duration::from_millis(10), task("early"));
        clock.schedule(Duration::from_millis(10), task("early-second"));

        assert_eq!(clock.advance(Duration::from_millis(9)), 0);
        assert_eq!(clock.advance(Duration::from_millis(21)), 3);
        assert_eq!(*log.lock(), vec!["early", "early-second", "late"]);
        assert_eq!(clock.now(), Timestamp(30));
    }

    #[test]
    fn test_manual_cancel() {
        let clock = ManualScheduler::new(Timestamp(0));
        let (log, task) = recorder();

        let id = clock.schedule(Duration::from_millis(5), task("never"));
        assert_eq!(clock.pending(), 1);
        assert!(clock.cancel(id));
        assert!(!clock.cancel(id));

        clock.advance(Duration::from_secs(1));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_manual_clock_is_deadline_inside_task() {
        let clock = Arc::new(ManualScheduler::new(Timestamp(100)));
        let seen = Arc::new(Mutex::new(None));

        let inner_clock = Arc::clone(&clock);
        let inner_seen = Arc::clone(&seen);
        clock.schedule(
            Duration::from_millis(50),
            Box::new(move || *inner_seen.lock() = Some(inner_clock.now())),
        );

        clock.advance(Duration::from_millis(500));
        assert_eq!(*seen.lock(), Some(Timestamp(150)));
        assert_eq!(clock.now(), Timestamp(600));
    }

    #[test]
    fn test_manual_runs_tasks_scheduled_while_advancing() {
        let clock = Arc::new(ManualScheduler::new(Timestamp(0)));
        let count = Arc::new(AtomicUsize::new(0));

        let chained_clock = Arc::clone(&clock);
        let chained_count = Arc::clone(&count);
        clock.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                chained_count.fetch_add(1, Ordering::SeqCst);
                let again = Arc::clone(&chained_count);
                chained_clock.schedule(
                    Duration::from_millis(10),
                    Box::new(move || {
                        again.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        assert_eq!(clock.advance(Duration::from_millis(15)), 1);
        assert_eq!(clock.next_deadline(), Some(Timestamp(20)));
        assert_eq!(clock.advance(Duration::from_millis(5)), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_thread_scheduler_fires() {
        let scheduler = ThreadScheduler::new().unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);

        scheduler.schedule(
            Duration::from_millis(20),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_thread_scheduler_cancel() {
        let scheduler = ThreadScheduler::new().unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);

        let id = scheduler.schedule(
            Duration::from_millis(200),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        assert!(scheduler.cancel(id));

        assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    }
}
