//! Spout touches travel from the interrupt context to the poll loop through a
//! bounded channel; the loop alone touches dosing state.
use std::sync::Arc;
use std::time::Instant;

use cage_traits::{Clock, TouchCallback};
use chrono::NaiveDateTime;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

/// A touch as stamped in the interrupt context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEvent {
    pub at: Instant,
    pub wall: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct TouchQueue {
    tx: Sender<TouchEvent>,
    rx: Receiver<TouchEvent>,
}

impl TouchQueue {
    pub fn bounded(cap: usize) -> Self {
        let (tx, rx) = bounded(cap.max(1));
        Self { tx, rx }
    }

    /// Callback for `TouchSensor::subscribe`. Stamps the touch and never blocks;
    /// touches arriving on a full queue are dropped with a warning.
    pub fn callback(&self, clock: Arc<dyn Clock + Send + Sync>) -> TouchCallback {
        let tx = self.tx.clone();
        Box::new(move || {
            let ev = TouchEvent {
                at: clock.now(),
                wall: clock.wall_now(),
            };
            match tx.try_send(ev) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => tracing::warn!("touch queue full, touch dropped"),
                Err(TrySendError::Disconnected(_)) => {}
            }
        })
    }

    /// Everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<TouchEvent> {
        self.rx.try_iter().collect()
    }

    /// Discards queued touches, returning how many were dropped.
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cage_traits::ManualClock;
    use std::time::Duration;

    #[test]
    fn callback_stamps_and_queues_in_order() {
        let clock = ManualClock::starting_at(NaiveDateTime::default());
        let q = TouchQueue::bounded(8);
        let cb = q.callback(Arc::new(clock.clone()));
        let t0 = clock.now();
        cb();
        clock.advance(Duration::from_millis(40));
        cb();

        let evs = q.drain();
        assert_eq!(evs.len(), 2);
        assert_eq!(evs[0].at, t0);
        assert_eq!(evs[1].at - evs[0].at, Duration::from_millis(40));
        assert!(q.is_empty());
    }

    #[test]
    fn overflow_drops_newest() {
        let clock = ManualClock::starting_at(NaiveDateTime::default());
        let q = TouchQueue::bounded(2);
        let cb = q.callback(Arc::new(clock));
        for _ in 0..5 {
            cb();
        }
        assert_eq!(q.len(), 2);
        assert_eq!(q.clear(), 2);
        assert!(q.drain().is_empty());
    }
}
