//! Resource allocator: one fallible acquisition per internal buffer.
//!
//! Exhaustion is reported as `ResourceExhausted` and never folded into a
//! validation error. A `Probe` can be attached to count attempts, track live
//! blocks and simulate exhaustion at a chosen step.

use crate::error::ConstructionError;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// One entry in a probe's event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Acquired(&'static str),
    Released(&'static str),
    Exhausted(&'static str),
}

/// Allocation instrumentation shared by every block acquired through one allocator.
#[derive(Debug, Default)]
pub struct Probe {
    /// 1-based attempt that reports exhaustion; 0 disables injection.
    fail_at: AtomicUsize,
    attempts: AtomicUsize,
    live: AtomicUsize,
    events: Mutex<Vec<Event>>,
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A probe whose `step`-th allocation attempt (1-based) fails.
    pub fn failing_at(step: usize) -> Arc<Self> {
        let probe = Self::default();
        probe.fail_at.store(step, Ordering::SeqCst);
        Arc::new(probe)
    }

    /// Number of allocation attempts seen, including the injected failure.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Blocks acquired and not yet released.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        lock_or_recover(&self.events).clone()
    }

    /// Labels of successful acquisitions, in order.
    pub fn acquired(&self) -> Vec<&'static str> {
        self.labels(|e| match e {
            Event::Acquired(what) => Some(what),
            _ => None,
        })
    }

    /// Labels of releases, in order.
    pub fn released(&self) -> Vec<&'static str> {
        self.labels(|e| match e {
            Event::Released(what) => Some(what),
            _ => None,
        })
    }

    fn labels(&self, pick: impl Fn(Event) -> Option<&'static str>) -> Vec<&'static str> {
        lock_or_recover(&self.events)
            .iter()
            .filter_map(|&e| pick(e))
            .collect()
    }

    /// Counts the attempt; true when this one should be reported as exhausted.
    fn begin_attempt(&self) -> bool {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let fail_at = self.fail_at.load(Ordering::SeqCst);
        fail_at != 0 && n == fail_at
    }

    fn record(&self, event: Event) {
        match event {
            Event::Acquired(_) => {
                self.live.fetch_add(1, Ordering::SeqCst);
            }
            Event::Released(_) => {
                self.live.fetch_sub(1, Ordering::SeqCst);
            }
            Event::Exhausted(_) => {}
        }
        lock_or_recover(&self.events).push(event);
    }
}

/// Acquires internal buffers, optionally through a probe.
#[derive(Debug, Clone, Default)]
pub struct Allocator {
    probe: Option<Arc<Probe>>,
}

impl Allocator {
    /// Plain system allocation, no shared state.
    pub fn system() -> Self {
        Self { probe: None }
    }

    pub fn instrumented(probe: Arc<Probe>) -> Self {
        Self { probe: Some(probe) }
    }

    pub fn probe(&self) -> Option<&Arc<Probe>> {
        self.probe.as_ref()
    }

    /// Acquire `len` default-initialised elements.
    pub fn zeroed<T: Clone + Default>(
        &self,
        what: &'static str,
        len: usize,
    ) -> Result<Block<T>, ConstructionError> {
        self.filled(what, len, T::default())
    }

    /// Acquire `len` copies of `value`.
    pub fn filled<T: Clone>(
        &self,
        what: &'static str,
        len: usize,
        value: T,
    ) -> Result<Block<T>, ConstructionError> {
        let bytes = len.saturating_mul(std::mem::size_of::<T>());
        let exhausted = ConstructionError::ResourceExhausted { what, bytes };

        if let Some(probe) = &self.probe {
            if probe.begin_attempt() {
                probe.record(Event::Exhausted(what));
                log::trace!("injected exhaustion at {}", what);
                return Err(exhausted);
            }
        }

        let mut data = Vec::new();
        if data.try_reserve_exact(len).is_err() {
            if let Some(probe) = &self.probe {
                probe.record(Event::Exhausted(what));
            }
            return Err(exhausted);
        }
        data.resize(len, value);

        if let Some(probe) = &self.probe {
            probe.record(Event::Acquired(what));
        }
        log::trace!("acquired {} ({} bytes)", what, bytes);
        Ok(Block {
            data,
            what,
            probe: self.probe.clone(),
        })
    }
}

/// An owned internal buffer. Released exactly once, when dropped.
#[derive(Debug)]
pub struct Block<T> {
    data: Vec<T>,
    what: &'static str,
    probe: Option<Arc<Probe>>,
}

impl<T> Block<T> {
    /// Label the block was acquired under.
    pub fn what(&self) -> &'static str {
        self.what
    }
}

impl<T> Deref for Block<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for Block<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Drop for Block<T> {
    fn drop(&mut self) {
        if let Some(probe) = &self.probe {
            probe.record(Event::Released(self.what));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_is_released_on_drop() {
        let probe = Probe::new();
        let alloc = Allocator::instrumented(probe.clone());
        let block = alloc.zeroed::<f32>("scratch", 16).unwrap();
        assert_eq!(block.len(), 16);
        assert!(block.iter().all(|&x| x == 0.0));
        assert_eq!(probe.live(), 1);
        drop(block);
        assert_eq!(probe.live(), 0);
        assert_eq!(
            probe.events(),
            vec![Event::Acquired("scratch"), Event::Released("scratch")]
        );
    }

    #[test]
    fn injected_exhaustion_hits_the_chosen_attempt() {
        let probe = Probe::failing_at(2);
        let alloc = Allocator::instrumented(probe.clone());
        let first = alloc.zeroed::<f32>("a", 4).unwrap();
        let second = alloc.zeroed::<f32>("b", 4);
        assert_eq!(
            second.unwrap_err(),
            ConstructionError::ResourceExhausted {
                what: "b",
                bytes: 16
            }
        );
        assert_eq!(probe.attempts(), 2);
        assert_eq!(probe.live(), 1);
        drop(first);
        assert_eq!(probe.live(), 0);
    }

    #[test]
    fn oversized_request_is_exhaustion_not_a_panic() {
        let alloc = Allocator::system();
        let err = alloc.zeroed::<f64>("huge", usize::MAX / 2).unwrap_err();
        assert!(err.is_exhaustion());
    }

    #[test]
    fn empty_block_is_legal() {
        let alloc = Allocator::system();
        let block = alloc.zeroed::<f32>("empty", 0).unwrap();
        assert!(block.is_empty());
        assert_eq!(block.what(), "empty");
    }
}
