//! Lock-free single-producer / single-consumer ring of quote records.
//!
//! The ring is laid out for placement inside a shared-memory segment: the
//! write index and read index each occupy their own cache line so the
//! producer and consumer cores never contend on the same line, and every slot
//! is one cache-line-sized [`Quote`]. All-zero memory is a valid empty ring,
//! so a freshly created segment needs no in-place initialization beyond the
//! zero fill the OS already performs.
//!
//! # Memory ordering
//!
//! The producer stores the slot bytes, then publishes the new write index
//! with `Release`; the consumer's `Acquire` load of the write index pairs
//! with it, so a consumer that observes the new index also observes the slot
//! bytes. The read index works symmetrically so the producer observes freed
//! slots. Each side loads its own index `Relaxed` because only that side
//! mutates it.
//!
//! # Algorithm
//!
//! - Empty: `read_idx == write_idx`
//! - Full: `(write_idx + 1) & MASK == read_idx`
//! - One slot stays unused so the two states are distinguishable; capacity is
//!   `RING_SLOTS - 1`.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Quote;

/// Number of slots in the ring. Must be a power of two for mask indexing.
pub const RING_SLOTS: usize = 1024;

const RING_MASK: u64 = RING_SLOTS as u64 - 1;

const _: () = assert!(RING_SLOTS.is_power_of_two());
const _: () = assert!(RING_SLOTS >= 64);
const _: () = assert!(RING_SLOTS <= 65536);

/// An atomic index padded out to a full cache line.
#[repr(C, align(64))]
struct IndexLine(AtomicU64);

const _: () = assert!(std::mem::size_of::<IndexLine>() == 64);

/// Bounded lock-free queue of [`Quote`] records for exactly one producer and
/// exactly one consumer.
///
/// The producer and consumer may live in different processes mapping the same
/// bytes; nothing in the ring refers to state outside its own memory. Using
/// the same ring from more than one producer or more than one consumer at a
/// time is a contract violation with undefined results — see
/// [`QuoteRing::from_raw`].
#[repr(C, align(64))]
pub struct QuoteRing {
    /// Producer-owned write index, on its own cache line.
    write_idx: IndexLine,
    /// Consumer-owned read index, on its own cache line.
    read_idx: IndexLine,
    /// The slot array. Each element is one cache line.
    slots: [UnsafeCell<Quote>; RING_SLOTS],
}

const _: () =
    assert!(std::mem::size_of::<QuoteRing>() == 128 + RING_SLOTS * std::mem::size_of::<Quote>());

// SAFETY: concurrent access is coordinated by the two atomic indices under
// the SPSC contract; slot bytes are only written by the producer before the
// Release publish and only read by the consumer after the Acquire load.
unsafe impl Sync for QuoteRing {}
unsafe impl Send for QuoteRing {}

impl QuoteRing {
    /// Bytes a shared-memory segment must provide to host one ring.
    pub const fn shm_size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Usable capacity: one slot is kept empty to tell full from empty.
    pub const fn capacity() -> usize {
        RING_SLOTS - 1
    }

    /// View a ring living at `addr`, typically inside a mapped segment.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that:
    ///
    /// - `addr` is 64-byte aligned and valid for [`QuoteRing::shm_size`]
    ///   bytes for the returned lifetime (`mmap` of a named segment
    ///   satisfies the alignment — mappings are page aligned);
    /// - the memory is zero-initialized or already holds a live ring;
    /// - across all processes, at most one thread pushes and at most one
    ///   thread pops at any time.
    pub unsafe fn from_raw<'a>(addr: *mut u8) -> &'a Self {
        debug_assert!(!addr.is_null());
        debug_assert_eq!(addr as usize % 64, 0);
        unsafe { &*(addr as *const Self) }
    }

    /// Allocate a zeroed in-process ring, mainly for tests and benchmarks.
    ///
    /// The ring is too large for the stack, and zeroed memory is exactly the
    /// empty state, so a zeroed heap allocation is the whole construction.
    pub fn boxed() -> Box<Self> {
        let layout = std::alloc::Layout::new::<Self>();
        // SAFETY: layout is non-zero-sized; a zeroed allocation is a valid
        // empty ring (both indices zero, all slots default quotes).
        unsafe {
            let ptr = std::alloc::alloc_zeroed(layout) as *mut Self;
            if ptr.is_null() {
                std::alloc::handle_alloc_error(layout);
            }
            Box::from_raw(ptr)
        }
    }

    // ------------------------------------------------------------------
    // Producer interface
    // ------------------------------------------------------------------

    /// Try to append a quote. Returns `false` without side effects when the
    /// ring is full. Wait-free; never blocks.
    #[inline]
    pub fn try_push(&self, quote: &Quote) -> bool {
        let w = self.write_idx.0.load(Ordering::Relaxed);
        let next = (w + 1) & RING_MASK;

        let r = self.read_idx.0.load(Ordering::Acquire);
        if next == r {
            return false; // full
        }

        // SAFETY: slot `w` is outside the readable range [r, w), so the
        // consumer will not touch it until the Release store below.
        unsafe {
            *self.slots[w as usize].get() = *quote;
        }

        self.write_idx.0.store(next, Ordering::Release);
        true
    }

    /// Whether a push would currently fail.
    #[inline]
    pub fn is_full(&self) -> bool {
        let w = self.write_idx.0.load(Ordering::Relaxed);
        let r = self.read_idx.0.load(Ordering::Acquire);
        ((w + 1) & RING_MASK) == r
    }

    /// Number of slots a producer could fill right now.
    #[inline]
    pub fn available_for_write(&self) -> usize {
        let w = self.write_idx.0.load(Ordering::Relaxed);
        let r = self.read_idx.0.load(Ordering::Acquire);
        (r.wrapping_sub(w).wrapping_sub(1) & RING_MASK) as usize
    }

    // ------------------------------------------------------------------
    // Consumer interface
    // ------------------------------------------------------------------

    /// Try to take the oldest unread quote into `out`. Returns `false` and
    /// leaves `out` untouched when the ring is empty. Wait-free; never
    /// blocks.
    #[inline]
    pub fn try_pop(&self, out: &mut Quote) -> bool {
        let r = self.read_idx.0.load(Ordering::Relaxed);
        let w = self.write_idx.0.load(Ordering::Acquire);
        if r == w {
            return false; // empty
        }

        // SAFETY: the Acquire load above makes the producer's store to slot
        // `r` visible, and the producer will not rewrite it until the
        // Release store below frees it.
        unsafe {
            *out = *self.slots[r as usize].get();
        }

        self.read_idx.0.store((r + 1) & RING_MASK, Ordering::Release);
        true
    }

    /// Whether a pop would currently fail.
    #[inline]
    pub fn is_empty(&self) -> bool {
        let r = self.read_idx.0.load(Ordering::Relaxed);
        let w = self.write_idx.0.load(Ordering::Acquire);
        r == w
    }

    /// Number of quotes a consumer could take right now.
    #[inline]
    pub fn available_for_read(&self) -> usize {
        let r = self.read_idx.0.load(Ordering::Relaxed);
        let w = self.write_idx.0.load(Ordering::Acquire);
        (w.wrapping_sub(r) & RING_MASK) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(i: usize) -> Quote {
        Quote::new(&format!("I{i:04}"), i as f64, i as f64 + 0.5, i as i64)
    }

    #[test]
    fn starts_empty() {
        let ring = QuoteRing::boxed();
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.available_for_read(), 0);
        assert_eq!(ring.available_for_write(), QuoteRing::capacity());
        let mut out = Quote::default();
        assert!(!ring.try_pop(&mut out));
    }

    #[test]
    fn fifo_order_preserved() {
        let ring = QuoteRing::boxed();
        for i in 0..100 {
            assert!(ring.try_push(&quote(i)));
        }
        let mut out = Quote::default();
        for i in 0..100 {
            assert!(ring.try_pop(&mut out));
            assert_eq!(out, quote(i));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn fills_at_capacity_and_rejects_the_next_push() {
        let ring = QuoteRing::boxed();
        for i in 0..QuoteRing::capacity() {
            assert!(ring.try_push(&quote(i)), "push {i} should succeed");
        }
        assert!(ring.is_full());
        assert_eq!(ring.available_for_write(), 0);

        // The extra push fails and changes nothing.
        assert!(!ring.try_push(&quote(9999)));
        assert_eq!(ring.available_for_read(), QuoteRing::capacity());

        let mut out = Quote::default();
        for i in 0..QuoteRing::capacity() {
            assert!(ring.try_pop(&mut out), "pop {i} should succeed");
            assert_eq!(out, quote(i));
        }
        assert!(!ring.try_pop(&mut out));
        assert!(ring.is_empty());
    }

    #[test]
    fn inspector_identity_holds_while_filling() {
        let ring = QuoteRing::boxed();
        for i in 0..QuoteRing::capacity() {
            assert_eq!(
                ring.available_for_read() + ring.available_for_write(),
                QuoteRing::capacity()
            );
            assert_eq!(ring.is_empty(), ring.available_for_read() == 0);
            assert_eq!(ring.is_full(), ring.available_for_write() == 0);
            ring.try_push(&quote(i));
        }
        assert_eq!(
            ring.available_for_read() + ring.available_for_write(),
            QuoteRing::capacity()
        );
    }

    #[test]
    fn wraps_around_the_slot_array() {
        let ring = QuoteRing::boxed();
        let mut out = Quote::default();
        // Push/pop more records than there are slots so the indices wrap.
        for i in 0..RING_SLOTS * 3 {
            assert!(ring.try_push(&quote(i)));
            assert!(ring.try_pop(&mut out));
            assert_eq!(out.timestamp_ns, i as i64);
        }
    }

    #[test]
    fn concurrent_producer_consumer_sees_every_record_in_order() {
        let ring: &'static QuoteRing = Box::leak(QuoteRing::boxed());
        const TOTAL: usize = 50_000;

        let producer = std::thread::spawn(move || {
            for i in 0..TOTAL {
                let q = quote(i % 1000);
                let q = Quote::new(q.instrument(), q.bid, q.ask, i as i64);
                while !ring.try_push(&q) {
                    std::hint::spin_loop();
                }
            }
        });

        let mut out = Quote::default();
        for i in 0..TOTAL {
            while !ring.try_pop(&mut out) {
                std::hint::spin_loop();
            }
            assert_eq!(out.timestamp_ns, i as i64);
        }
        producer.join().unwrap();
        assert!(ring.is_empty());
    }
}
