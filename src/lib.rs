//! Low latency, bounded single producer & many consumer (SPMC) broadcast ring
//! buffer for trivially copyable records, synchronised by a per slot sequence
//! lock.
//!
//! One writer publishes fixed-shape records into a power-of-two sized slot
//! array; any number of readers observe the stream independently. A reader
//! that cannot keep up silently misses records, but it never blocks the
//! writer and the writer never waits on any reader (lossy multicast).
//!
//! Each slot carries an 8-bit version word. The writer bumps it to an odd
//! value before touching the payload and to an even value after (two atomic
//! RMWs per record). Readers sample the version, copy the payload, sample
//! again and keep the copy only if both samples agree on a stable version. An
//! additional generation check distinguishes a record the reader has already
//! delivered from a fresh one once the byte-wide version wraps.
//!
//! ## Examples
//! Create a ring and publish records through the `Writer`.
//! ```no_run
//! use seqcast::RingBuffer;
//!
//! #[derive(Clone, Copy, Default)]
//! struct Tick {
//!     price: u64,
//!     size: u32,
//! }
//!
//! let ring = RingBuffer::<Tick>::new(1024).unwrap();
//! let mut writer = ring.writer().unwrap();
//!
//! // two-phase publish
//! let tick = writer.prepare_write();
//! tick.price = 101;
//! tick.size = 7;
//! writer.commit_write();
//!
//! // or by value
//! writer.write(Tick { price: 102, size: 3 });
//! ```
//! Attach any number of `Reader`s and poll them.
//! ```no_run
//! # use seqcast::RingBuffer;
//! # #[derive(Clone, Copy, Default)]
//! # struct Tick { price: u64, size: u32 }
//! let ring = RingBuffer::<Tick>::new(1024).unwrap();
//! let mut reader = ring.reader();
//!
//! let mut tick = Tick::default();
//! while reader.try_read(&mut tick) {
//!     // process tick
//! }
//! ```

pub mod error;
pub mod mem;

use crate::mem::{AlignedStorage, CACHE_LINE_SIZE};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::{align_of, size_of, MaybeUninit};
use std::ptr::{self, NonNull};
use std::sync::atomic::{compiler_fence, AtomicBool, AtomicU8, Ordering};

// re-export
pub use error::{Error, Result};

/// Version a freshly constructed slot carries. Even (stable), and chosen so
/// that a new reader, whose generation starts at 0, rejects slots that were
/// never written.
const INITIAL_VERSION: u8 = u8::MAX - 1;

/// Version distance at which a slot counts as already seen. A committed write
/// advances a slot version by exactly 2, so a slot exactly one lap behind the
/// reader generation shows a distance of 254.
const SEEN_VERSION_DISTANCE: u8 = u8::MAX - 1;

/// One ring cell: a record plus its version word. An odd version means a
/// write is in flight, an even version means the record is stable.
#[repr(C)]
struct Slot<T> {
    value: UnsafeCell<MaybeUninit<T>>,
    version: AtomicU8,
}

impl<T> Slot<T> {
    #[inline]
    fn new() -> Self {
        Self {
            value: UnsafeCell::new(MaybeUninit::zeroed()),
            version: AtomicU8::new(INITIAL_VERSION),
        }
    }
}

/// Bounded SPMC broadcast ring buffer for `Copy` records.
///
/// The requested capacity is rounded up to the next power of two and every
/// slot is padded to its own cache line. The ring owns the slot storage for
/// its whole lifetime; [`Writer`] and [`Reader`] handles borrow it and cannot
/// outlive it.
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: NonNull<CachePadded<Slot<T>>>,
    capacity: usize,
    mask: u64,
    writer_attached: AtomicBool,
    #[allow(dead_code)]
    storage: AlignedStorage,
}

unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T: Copy> RingBuffer<T> {
    /// Create a ring with at least `capacity` slots. The capacity is rounded
    /// up to the next power of two; a power of two is used unchanged.
    ///
    /// Every slot starts with a zeroed payload and version `254`.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_flags(capacity, false)
    }

    /// Same as [`RingBuffer::new`] but backs the slot array with huge pages
    /// where the platform supports them (Linux). A huge page mapping the
    /// kernel cannot satisfy fails here with [`Error::Allocation`].
    pub fn with_huge_pages(capacity: usize) -> Result<Self> {
        Self::with_flags(capacity, true)
    }

    fn with_flags(capacity: usize, huge_pages: bool) -> Result<Self> {
        if capacity == 0 {
            return Err(error::zero_capacity());
        }
        let requested = capacity;
        let capacity = capacity
            .checked_next_power_of_two()
            .ok_or_else(|| error::capacity_overflow(requested))?;
        let size = capacity
            .checked_mul(size_of::<CachePadded<Slot<T>>>())
            .ok_or_else(|| error::capacity_overflow(requested))?;
        let alignment = align_of::<CachePadded<Slot<T>>>().max(CACHE_LINE_SIZE);

        let storage = AlignedStorage::new(size, alignment, huge_pages)?;
        let slots = storage.as_ptr() as *mut CachePadded<Slot<T>>;

        // The mapping is zero filled, which is exactly the initial payload;
        // the version bytes still need stamping.
        for i in 0..capacity {
            unsafe { ptr::write(slots.add(i), CachePadded::new(Slot::new())) };
        }

        Ok(Self {
            slots: NonNull::new(slots).unwrap(),
            capacity,
            mask: (capacity as u64) - 1,
            writer_attached: AtomicBool::new(false),
            storage,
        })
    }

    /// Number of slots in the ring (the requested capacity rounded up to a
    /// power of two).
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Attach the single writer. Fails with [`Error::WriterAlreadyAttached`]
    /// while another writer is live; dropping the writer releases the claim.
    pub fn writer(&self) -> Result<Writer<'_, T>> {
        if self.writer_attached.swap(true, Ordering::AcqRel) {
            return Err(error::writer_already_attached());
        }
        Ok(Writer {
            ring: self,
            write_pos: 0,
        })
    }

    /// Attach a new independent reader positioned at the start of the stream.
    /// Readers share nothing with each other or with the writer beyond the
    /// slot array itself.
    pub fn reader(&self) -> Reader<'_, T> {
        Reader {
            ring: self,
            read_pos: 0,
            read_version: 0,
        }
    }

    /// Slot at a ring index. `index` must already be masked.
    #[inline]
    fn slot(&self, index: u64) -> &CachePadded<Slot<T>> {
        debug_assert!(index <= self.mask);
        unsafe { &*self.slots.as_ptr().add(index as usize) }
    }
}

/// Wraps a [`RingBuffer`] and publishes records. Only one writer can be
/// attached to a ring at any time.
///
/// The writer is wait-free: a publish is two atomic RMWs and one payload
/// store, independent of reader progress. When every reader is behind it
/// simply overwrites in place.
#[derive(Debug)]
pub struct Writer<'a, T> {
    ring: &'a RingBuffer<T>,
    write_pos: u64,
}

impl<T: Copy> Writer<'_, T> {
    /// Begin a two-phase publish: mark the current slot as in flight (odd
    /// version) and return its payload for in-place population. The payload
    /// holds zero bytes on the first lap and whatever the previous record
    /// left behind afterwards, so populate every field before committing.
    ///
    /// Must be paired with [`Writer::commit_write`].
    #[inline]
    pub fn prepare_write(&mut self) -> &mut T {
        let slot = self.ring.slot(self.index());
        let previous = slot.version.fetch_add(1, Ordering::Release);
        debug_assert_eq!(previous & 1, 0, "prepare_write on a slot already in flight");
        // Keep the payload stores below the version bump in this thread's
        // instruction stream; remote visibility is ordered by the release RMW.
        compiler_fence(Ordering::AcqRel);
        unsafe { &mut *(*slot.value.get()).as_mut_ptr() }
    }

    /// Finish a two-phase publish: mark the slot stable again (even version)
    /// and advance to the next slot.
    #[inline]
    pub fn commit_write(&mut self) {
        let slot = self.ring.slot(self.index());
        compiler_fence(Ordering::AcqRel);
        let previous = slot.version.fetch_add(1, Ordering::Release);
        debug_assert_eq!(previous & 1, 1, "commit_write without a matching prepare_write");
        self.write_pos += 1;
    }

    /// Publish a record by value.
    #[inline]
    pub fn write(&mut self, value: T) {
        *self.prepare_write() = value;
        self.commit_write();
    }

    /// Publish a record populated in place by `populate`.
    #[inline]
    pub fn write_with<F: FnOnce(&mut T)>(&mut self, populate: F) {
        populate(self.prepare_write());
        self.commit_write();
    }

    /// Ring index at which the next publish happens.
    #[inline]
    fn index(&self) -> u64 {
        self.write_pos & self.ring.mask
    }
}

impl<T> Drop for Writer<'_, T> {
    fn drop(&mut self) {
        self.ring.writer_attached.store(false, Ordering::Release);
    }
}

/// Wraps a [`RingBuffer`] and observes the record stream. Any number of
/// readers can be attached; each holds a private position and generation and
/// progresses at its own pace. A reader that falls more than one lap behind
/// silently skips the records it missed.
#[derive(Debug)]
pub struct Reader<'a, T> {
    ring: &'a RingBuffer<T>,
    read_pos: u64,
    read_version: u8,
}

impl<T: Copy> Reader<'_, T> {
    /// Copy the next unseen record into `result`. Returns `false` when the
    /// reader's slot holds nothing fresh right now, either because a write is
    /// in flight there or because the committed record was already delivered
    /// to this reader. The reader advances only on success and retries the
    /// same slot on the next call otherwise.
    #[inline]
    pub fn try_read(&mut self, result: &mut T) -> bool {
        match self.receive_next() {
            Some(value) => {
                *result = value;
                true
            }
            None => false,
        }
    }

    /// Receive the next pending record, if any.
    #[inline]
    pub fn receive_next(&mut self) -> Option<T> {
        let index = self.read_pos & self.ring.mask;
        let slot = self.ring.slot(index);

        let version_1 = slot.version.load(Ordering::Acquire);
        compiler_fence(Ordering::AcqRel);

        // Racing copy: it may observe a half written record, in which case
        // the bytes are discarded below. The volatile read stops the compiler
        // from folding the copy across the version samples.
        let value = unsafe { ptr::read_volatile(slot.value.get()) };

        compiler_fence(Ordering::AcqRel);
        let version_2 = slot.version.load(Ordering::Acquire);

        if version_1 != version_2 || version_1 & 1 != 0 {
            // The writer caught up with this reader and is rewriting the slot
            // right now.
            return None;
        }

        if version_1.wrapping_sub(self.read_version) >= SEEN_VERSION_DISTANCE {
            // Stale slot: never written since this reader's current
            // generation (a fresh ring still shows the initial 254), or
            // exactly one lap behind it, i.e. already delivered.
            return None;
        }

        // A full commit raises a slot version by 2, so one lap raises every
        // slot by 2. The generation re-arms at the cycle boundaries: entering
        // a lap at slot 0 baselines it, leaving at the last slot pre-arms the
        // version the writer stamps on slot 0 next lap. The last-slot rule
        // runs first so that a single-slot ring pre-arms as well.
        if index == self.ring.mask {
            self.read_version = version_2.wrapping_add(2);
        } else if index == 0 {
            self.read_version = version_2;
        }

        self.read_pos += 1;
        // Both samples agreed on a stable version, the copy is a committed
        // record.
        Some(unsafe { value.assume_init() })
    }
}
