//! Repeating tick timers.
//!
//! The chat UI never sleeps or spawns timers itself. It asks a
//! [`TickScheduler`] for a repeating timer and gets a [`TimerId`] back; the
//! event loop later hands each fired id to the owner (`ChatUi::on_tick`).
//! Production code uses [`TokioScheduler`], tests drive virtual time with
//! [`ManualScheduler`].

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

pub trait TickScheduler {
    /// Starts a timer that fires every `every` until cancelled. The first
    /// tick happens one period after scheduling.
    fn schedule(&mut self, every: Duration) -> TimerId;

    /// Stops a timer. Unknown or already cancelled ids are ignored.
    fn cancel(&mut self, id: TimerId);
}

/// Tokio-backed scheduler. Each timer is a task running an interval and
/// sending its id into the channel returned by [`TokioScheduler::new`].
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerId>,
    next_id: u64,
    timers: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                next_id: 0,
                timers: HashMap::new(),
            },
            rx,
        )
    }

    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }
}

impl TickScheduler for TokioScheduler {
    fn schedule(&mut self, every: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let every = every.max(MIN_PERIOD);
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + every;
            let mut interval = tokio::time::interval_at(start, every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(id).is_err() {
                    break;
                }
            }
        });

        debug!(%id, ?every, "scheduled tick timer");
        self.timers.insert(id, handle);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.timers.remove(&id) {
            handle.abort();
            debug!(%id, "cancelled tick timer");
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

#[derive(Debug)]
struct ManualTimer {
    every: Duration,
    next_due: Duration,
}

#[derive(Debug, Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<TimerId, ManualTimer>,
}

impl ManualClock {
    fn earliest_due(&self) -> Option<(TimerId, Duration)> {
        self.timers
            .iter()
            .map(|(id, timer)| (*id, timer.next_due))
            .min_by_key(|(id, due)| (*due, *id))
    }

    fn fire(&mut self, id: TimerId) {
        if let Some(timer) = self.timers.get_mut(&id) {
            self.now = timer.next_due;
            timer.next_due += timer.every;
        }
    }
}

/// Virtual-time scheduler. Clones share the same clock, so a test can keep a
/// handle while the chat UI owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    clock: Rc<RefCell<ManualClock>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.clock.borrow().now
    }

    pub fn active_timers(&self) -> usize {
        self.clock.borrow().timers.len()
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.clock.borrow().timers.contains_key(&id)
    }

    /// Jumps to the earliest pending tick and returns it.
    pub fn next_tick(&self) -> Option<TimerId> {
        let mut clock = self.clock.borrow_mut();
        let (id, _) = clock.earliest_due()?;
        clock.fire(id);
        Some(id)
    }

    /// Moves the clock forward by `by`, returning every tick that fell due in
    /// firing order. Ticks are delivered after the fact, so a timer cancelled
    /// while the caller processes the list can still appear later in it.
    pub fn advance(&self, by: Duration) -> Vec<TimerId> {
        let mut clock = self.clock.borrow_mut();
        let target = clock.now + by;
        let mut fired = Vec::new();
        while let Some((id, due)) = clock.earliest_due() {
            if due > target {
                break;
            }
            clock.fire(id);
            fired.push(id);
        }
        clock.now = target;
        fired
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule(&mut self, every: Duration) -> TimerId {
        let mut clock = self.clock.borrow_mut();
        clock.next_id += 1;
        let id = TimerId(clock.next_id);
        let every = every.max(MIN_PERIOD);
        let next_due = clock.now + every;
        clock.timers.insert(id, ManualTimer { every, next_due });
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.clock.borrow_mut().timers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn manual_scheduler_fires_in_time_order() {
        let mut scheduler = ManualScheduler::new();
        let fast = scheduler.schedule(ms(10));
        let slow = scheduler.schedule(ms(25));

        let fired = scheduler.advance(ms(30));
        assert_eq!(fired, vec![fast, fast, slow, fast]);
        assert_eq!(scheduler.now(), ms(30));
    }

    #[test]
    fn cancelled_timers_stop_firing() {
        let mut scheduler = ManualScheduler::new();
        let id = scheduler.schedule(ms(30));
        assert_eq!(scheduler.next_tick(), Some(id));
        scheduler.cancel(id);
        scheduler.cancel(id);
        assert_eq!(scheduler.next_tick(), None);
        assert!(scheduler.advance(ms(300)).is_empty());
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[test]
    fn clones_share_one_clock() {
        let mut owned = ManualScheduler::new();
        let observer = owned.clone();
        let id = owned.schedule(ms(5));
        assert!(observer.is_active(id));
        assert_eq!(observer.next_tick(), Some(id));
        assert_eq!(owned.now(), ms(5));
    }

    #[tokio::test]
    async fn tokio_scheduler_delivers_ticks_until_cancelled() {
        let (mut scheduler, mut rx) = TokioScheduler::new();
        let id = scheduler.schedule(ms(2));
        assert_eq!(rx.recv().await, Some(id));
        assert_eq!(rx.recv().await, Some(id));
        scheduler.cancel(id);
        assert_eq!(scheduler.active_timers(), 0);

        // Drain anything sent before the abort landed, then expect silence.
        tokio::time::sleep(ms(10)).await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(ms(10)).await;
        assert!(rx.try_recv().is_err());
    }
}
