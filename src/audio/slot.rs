use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::result_code::{ResultCode, SubsystemResult};

const DONE: u32 = 0x01;
const PREPARED: u32 = 0x02;
const QUEUED: u32 = 0x10;

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(1);

struct SlotInner {
    id: u64,
    flags: AtomicU32,
    recorded: AtomicUsize,
    data: Mutex<Vec<u8>>,
}

/// One of the two alternating buffers of a stream.
///
/// A slot pairs a byte region with the state the device tracks for it. Clones
/// share the same buffer, so the engine keeps one handle while the driver holds
/// another in its queue. Lifecycle: allocated → prepared → queued → done →
/// unprepared, after which the slot may be prepared again or dropped.
#[derive(Clone)]
pub struct BufferSlot {
    inner: Arc<SlotInner>,
}

impl BufferSlot {
    /// Wrap a chunk that is about to be played
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(SlotInner {
                id: NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed),
                flags: AtomicU32::new(0),
                recorded: AtomicUsize::new(0),
                data: Mutex::new(data),
            }),
        }
    }

    /// Allocate a silent buffer of `len` bytes for recording
    pub fn zeroed(len: usize) -> Self {
        Self::with_data(vec![0; len])
    }

    /// Process-unique identifier, stable for the life of the slot
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Size of the byte region
    pub fn len(&self) -> usize {
        self.lock_data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completion flag, set by the driver once it is finished with the slot
    pub fn is_done(&self) -> bool {
        self.inner.flags.load(Ordering::Acquire) & DONE != 0
    }

    pub fn is_prepared(&self) -> bool {
        self.inner.flags.load(Ordering::Acquire) & PREPARED != 0
    }

    /// Whether the slot sits in a device queue and has not completed yet
    pub fn is_queued(&self) -> bool {
        self.inner.flags.load(Ordering::Acquire) & QUEUED != 0
    }

    /// Bytes the driver reported when completing the slot
    pub fn bytes_recorded(&self) -> usize {
        self.inner.recorded.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same buffer
    pub fn same_slot(&self, other: &BufferSlot) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` over the whole byte region
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let data = self.lock_data();
        f(&data)
    }

    /// Run `f` over the whole byte region, mutably
    pub fn write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut data = self.lock_data();
        f(&mut data)
    }

    /// Run `f` over the bytes the driver reported as filled
    pub fn read_recorded<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let data = self.lock_data();
        let len = self.bytes_recorded().min(data.len());
        f(&data[..len])
    }

    /// Register the slot with a device.
    ///
    /// Fails with `INVALID_PARAM` if it is already prepared.
    pub fn mark_prepared(&self) -> SubsystemResult {
        self.inner
            .flags
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |flags| {
                if flags & PREPARED != 0 {
                    None
                } else {
                    Some((flags | PREPARED) & !DONE)
                }
            })
            .map(|_| ())
            .map_err(|_| ResultCode::INVALID_PARAM)
    }

    /// Deregister the slot. A no-op if it is not prepared.
    ///
    /// Fails with `STILL_PLAYING` while the slot is queued and not yet done.
    pub fn mark_unprepared(&self) -> SubsystemResult {
        self.inner
            .flags
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |flags| {
                if flags & QUEUED != 0 {
                    None
                } else {
                    Some(flags & !PREPARED)
                }
            })
            .map(|_| ())
            .map_err(|_| ResultCode::STILL_PLAYING)
    }

    /// Mark the slot as handed to the driver and clear its completion flag
    pub fn mark_queued(&self) -> SubsystemResult {
        let mut outcome = Ok(());
        let _ = self
            .inner
            .flags
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |flags| {
                if flags & PREPARED == 0 {
                    outcome = Err(ResultCode::UNPREPARED);
                    None
                } else if flags & QUEUED != 0 {
                    outcome = Err(ResultCode::STILL_PLAYING);
                    None
                } else {
                    outcome = Ok(());
                    Some((flags | QUEUED) & !DONE)
                }
            });

        if outcome.is_ok() {
            self.inner.recorded.store(0, Ordering::Release);
        }
        outcome
    }

    /// Driver side: record how many bytes were processed and set the
    /// completion flag. Must happen before the completion event is signaled.
    pub fn complete(&self, bytes: usize) {
        self.inner.recorded.store(bytes, Ordering::Release);
        let _ = self
            .inner
            .flags
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |flags| {
                Some((flags | DONE) & !QUEUED)
            });
    }

    fn lock_data(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.inner.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for BufferSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferSlot")
            .field("id", &self.id())
            .field("prepared", &self.is_prepared())
            .field("queued", &self.is_queued())
            .field("done", &self.is_done())
            .field("recorded", &self.bytes_recorded())
            .finish()
    }
}
