use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Manual-reset completion event shared between a stream and its driver.
///
/// The driver signals it whenever any submitted buffer of the stream finishes.
/// A signal stays set until [`CompletionEvent::reset`] is called, so a waiter that
/// arrives late still sees it. After [`CompletionEvent::close`] further signals
/// are ignored.
#[derive(Debug, Default)]
pub struct CompletionEvent {
    signaled: Mutex<bool>,
    cond: Condvar,
    closed: AtomicBool,
}

impl CompletionEvent {
    /// Create a new, unsignaled event
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the event and wake every waiter
    pub fn set(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        *signaled = true;
        self.cond.notify_all();
    }

    /// Return the event to the unsignaled state
    pub fn reset(&self) {
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        *signaled = false;
    }

    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the event is signaled or `timeout` elapses.
    ///
    /// Returns `true` if the event was signaled. The event is left signaled; a
    /// signal says only that *some* buffer completed, so callers must check the
    /// buffer they care about themselves.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);

        while !*signaled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cond
                .wait_timeout(signaled, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            signaled = guard;
        }

        true
    }

    /// Release the event. It is reset and never signaled again.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.reset();
        self.cond.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
