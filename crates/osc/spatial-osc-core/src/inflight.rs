//! In-flight message accounting.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts messages handed to a transport but not yet written (or discarded).
#[derive(Clone, Debug)]
pub struct InFlightTracker {
    count: Arc<AtomicUsize>,
    cap: usize,
}

impl InFlightTracker {
    pub fn new(cap: usize) -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            cap,
        }
    }

    #[inline]
    pub fn cap(&self) -> usize {
        self.cap
    }

    #[inline]
    pub fn in_flight(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Reserve `messages` slots, or `None` if that would exceed the cap.
    pub fn try_acquire(&self, messages: usize) -> Option<InFlightPermit> {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            let next = current.checked_add(messages)?;
            if next > self.cap {
                return None;
            }
            match self.count.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(InFlightPermit {
                        count: Arc::clone(&self.count),
                        messages,
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }
}

/// Releases its slots when dropped.
pub struct InFlightPermit {
    count: Arc<AtomicUsize>,
    messages: usize,
}

impl InFlightPermit {
    #[inline]
    pub fn messages(&self) -> usize {
        self.messages
    }
}

impl fmt::Debug for InFlightPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightPermit")
            .field("messages", &self.messages)
            .finish()
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.count.fetch_sub(self.messages, Ordering::AcqRel);
    }
}
