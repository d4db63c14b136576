use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::event::CompletionEvent;
use super::result_code::ResultCode;
use super::slot::BufferSlot;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<BufferSlot>,
    // Bytes of the head slot already played or filled
    head_offset: usize,
    // Set once the device has failed; no slot is held after that
    fault: Option<ResultCode>,
}

/// Driver-side FIFO of submitted slots.
///
/// Backends push slots on submit and their I/O thread drains or fills them in
/// order. Completion always sets the slot's flag first and signals the stream's
/// event second, so a waiter that sees the signal and re-checks the flag never
/// misses a completion.
pub struct DriverQueue {
    state: Mutex<QueueState>,
    work: Condvar,
    event: Arc<CompletionEvent>,
}

impl DriverQueue {
    pub fn new(event: Arc<CompletionEvent>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            work: Condvar::new(),
            event,
        }
    }

    /// Append a slot that has already been marked queued.
    ///
    /// After a device fault the slot is completed empty at once instead.
    pub fn push(&self, slot: BufferSlot) {
        let mut state = self.lock();
        if state.fault.is_some() {
            drop(state);
            slot.complete(0);
            self.event.set();
            return;
        }
        state.pending.push_back(slot);
        self.work.notify_all();
    }

    /// Record a device failure and abort every queued slot.
    ///
    /// The first fault wins. Returns how many slots were aborted.
    pub fn fail(&self, code: ResultCode) -> usize {
        let mut state = self.lock();
        if state.fault.is_none() {
            state.fault = Some(code);
        }
        self.abort_locked(&mut state)
    }

    /// The failure recorded by [`DriverQueue::fail`], if any
    pub fn fault(&self) -> Option<ResultCode> {
        self.lock().fault
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Copy queued playback bytes into `out`, completing every slot that runs dry.
    ///
    /// Returns the number of bytes written; the rest of `out` is untouched.
    pub fn drain_into(&self, out: &mut [u8]) -> usize {
        let mut state = self.lock();
        let mut written = 0;
        let mut completed = false;

        while written < out.len() {
            let Some(head) = state.pending.front().cloned() else {
                break;
            };
            let offset = state.head_offset;

            let (copied, total) = head.read(|data| {
                let available = &data[offset.min(data.len())..];
                let n = available.len().min(out.len() - written);
                out[written..written + n].copy_from_slice(&available[..n]);
                (n, data.len())
            });

            written += copied;
            state.head_offset += copied;

            if state.head_offset >= total {
                state.pending.pop_front();
                state.head_offset = 0;
                head.complete(total);
                completed = true;
            }
        }

        if completed {
            self.event.set();
        }
        written
    }

    /// Copy captured bytes from `input` into queued slots, completing every
    /// slot that becomes full.
    ///
    /// Returns the number of bytes stored. Bytes arriving while no slot is
    /// queued are dropped.
    pub fn fill_from(&self, input: &[u8]) -> usize {
        let mut state = self.lock();
        let mut stored = 0;
        let mut completed = false;

        while stored < input.len() {
            let Some(head) = state.pending.front().cloned() else {
                break;
            };
            let offset = state.head_offset;

            let (copied, total) = head.write(|data| {
                let len = data.len();
                let space = &mut data[offset.min(len)..];
                let n = space.len().min(input.len() - stored);
                space[..n].copy_from_slice(&input[stored..stored + n]);
                (n, len)
            });

            stored += copied;
            state.head_offset += copied;

            if state.head_offset >= total {
                state.pending.pop_front();
                state.head_offset = 0;
                head.complete(total);
                completed = true;
            }
        }

        if completed {
            self.event.set();
        }
        stored
    }

    /// Abort every queued slot.
    ///
    /// The head slot reports the bytes processed so far, the rest report none.
    /// Returns how many slots were aborted.
    pub fn abort_all(&self) -> usize {
        let mut state = self.lock();
        self.abort_locked(&mut state)
    }

    fn abort_locked(&self, state: &mut QueueState) -> usize {
        let head_offset = std::mem::take(&mut state.head_offset);
        let aborted: Vec<BufferSlot> = state.pending.drain(..).collect();

        for (index, slot) in aborted.iter().enumerate() {
            slot.complete(if index == 0 { head_offset } else { 0 });
        }

        if !aborted.is_empty() {
            self.event.set();
        }
        self.work.notify_all();
        aborted.len()
    }

    /// Block until a slot is queued or `timeout` elapses, returning the head slot
    pub fn wait_for_work(&self, timeout: Duration) -> Option<BufferSlot> {
        let state = self.lock();
        let (state, _) = self
            .work
            .wait_timeout_while(state, timeout, |state| state.pending.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        state.pending.front().cloned()
    }

    /// Wake any thread blocked in [`DriverQueue::wait_for_work`]
    pub fn wake(&self) {
        self.work.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
