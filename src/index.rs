//! Definition of the header index: the ordered sequence of segment headers.
//!
//! Headers live in one growable buffer with the used range kept roughly
//! centered, so inserting headers can spill into free slots on either side.
//! The used range always ends with a trailing *sentinel* header, which owns
//! no area; it gives the end of the container a stable header position
//! without any algorithm having to special-case it.

use crate::flat;
use crate::header::SegHeader;
use crate::pool::{AllocError, BlockPool, PoolBacking};

// Fresh indexes start with this many header slots.
const INITIAL_SLOTS: usize = 8;

/// Ordered sequence of segment headers plus the trailing sentinel.
///
/// Owns every header and, through the block pool, every area referenced by a
/// live header. Does not own the elements inside the areas; the container
/// drops those before headers are removed.
///
/// # Invariants
///
/// * The used slots are `buf[lo..hi)`; `buf[hi - 1]` is the null sentinel.
/// * Live headers `buf[lo..hi - 1]` are non-null.
pub(crate) struct HeaderIndex<H: SegHeader> {
    buf: Vec<H>,
    lo: usize,
    hi: usize,
    pool: BlockPool,
}

impl<H: SegHeader> HeaderIndex<H> {
    pub(crate) fn new(backing: PoolBacking) -> Self {
        let () = H::VALID;
        let lo = INITIAL_SLOTS / 2 - 1;
        Self {
            buf: vec![H::null(); INITIAL_SLOTS],
            lo,
            hi: lo + 1,
            pool: BlockPool::new(H::AREA_SIZE, H::AREA_ALIGN, backing),
        }
    }

    pub(crate) fn backing(&self) -> PoolBacking {
        self.pool.backing()
    }

    /// Number of live segments.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.hi - 1 - self.lo
    }

    /// The live headers, sentinel excluded.
    #[inline]
    pub(crate) fn headers(&self) -> &[H] {
        &self.buf[self.lo..self.hi - 1]
    }

    #[inline]
    pub(crate) fn header(&self, seg: usize) -> &H {
        debug_assert!(seg < self.len());
        &self.buf[self.lo + seg]
    }

    #[inline]
    pub(crate) fn header_mut(&mut self, seg: usize) -> &mut H {
        debug_assert!(seg < self.len());
        &mut self.buf[self.lo + seg]
    }

    /// Mutable access to two distinct headers at once.
    #[inline]
    pub(crate) fn pair_mut(&mut self, a: usize, b: usize) -> (&mut H, &mut H) {
        debug_assert!(a != b && a < self.len() && b < self.len());
        let base = self.buf.as_mut_ptr();
        // Safety: Distinct in-bounds slots, so the borrows cannot alias.
        unsafe { (&mut *base.add(self.lo + a), &mut *base.add(self.lo + b)) }
    }

    /// Inserts `n` fresh headers before live position `at`, each bound to a
    /// newly allocated area with its live range empty at the back edge.
    ///
    /// On allocation failure every area acquired so far is released, the
    /// header gap is closed again, and the index is exactly as before the
    /// call; no live element is ever moved here.
    pub(crate) fn insert_headers(&mut self, at: usize, n: usize) -> Result<(), AllocError> {
        debug_assert!(at <= self.len());
        if n == 0 {
            return Ok(());
        }

        let used = self.hi - self.lo;
        if self.buf.len() - used < n {
            self.grow(at, n)?;
        } else {
            let split = self.lo + at;
            // Safety: Headers are plain handles; the buffer is fully
            // initialized (vacant slots hold null headers), so relocating
            // them bitwise is sound.
            let (lo, hi) = unsafe {
                flat::open_gap(self.buf.as_mut_ptr(), self.buf.len(), self.lo, self.hi, split, n)
            };
            self.lo = lo;
            self.hi = hi;
        }

        let gap = self.lo + at;
        let mut acquired = 0;
        while acquired < n {
            match self.pool.allocate() {
                Ok(area) => {
                    // Safety: The pool hands out `AREA_SIZE` bytes at
                    // `AREA_ALIGN`, owned by this header until removal.
                    self.buf[gap + acquired] = unsafe { H::attach(area) };
                    acquired += 1;
                }
                Err(err) => {
                    for slot in &mut self.buf[gap..gap + acquired] {
                        // Safety: Just attached above, never exposed.
                        unsafe { self.pool.deallocate(slot.area()) };
                        *slot = H::null();
                    }
                    // Safety: Same relocation argument as above.
                    let (lo, hi, _) = unsafe {
                        flat::close_gap(self.buf.as_mut_ptr(), self.lo, self.hi, gap, gap + n)
                    };
                    self.lo = lo;
                    self.hi = hi;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Removes the live headers `[from, to)`, returning their areas to the
    /// pool. The elements inside must already have been dropped.
    pub(crate) fn remove_headers(&mut self, from: usize, to: usize) {
        debug_assert!(from <= to && to <= self.len());
        for seg in from..to {
            let h = self.buf[self.lo + seg];
            debug_assert!(!h.is_null());
            // Safety: The header exclusively owned this area; it is dead
            // storage now that its elements are gone.
            unsafe { self.pool.deallocate(h.area()) };
        }
        // Safety: Header relocation as in `insert_headers`.
        let (lo, hi, _) = unsafe {
            flat::close_gap(
                self.buf.as_mut_ptr(),
                self.lo,
                self.hi,
                self.lo + from,
                self.lo + to,
            )
        };
        self.lo = lo;
        self.hi = hi;
    }

    /// Replaces the buffer with a larger centered one, leaving an
    /// uninitialized (null-header) gap of `n` slots at live position `at`.
    fn grow(&mut self, at: usize, n: usize) -> Result<(), AllocError> {
        let used = self.hi - self.lo;
        let new_used = used + n;
        let target = (new_used * 2).max(INITIAL_SLOTS);

        let mut next: Vec<H> = Vec::new();
        next.try_reserve_exact(target)?;
        next.resize(target, H::null());

        let new_lo = (target - new_used) / 2;
        let split = self.lo + at;
        next[new_lo..new_lo + at].copy_from_slice(&self.buf[self.lo..split]);
        next[new_lo + at + n..new_lo + new_used].copy_from_slice(&self.buf[split..self.hi]);

        self.buf = next;
        self.lo = new_lo;
        self.hi = new_lo + new_used;
        Ok(())
    }

    #[allow(dead_code)]
    pub(crate) fn debug_check(&self) {
        assert!(self.lo < self.hi && self.hi <= self.buf.len());
        assert!(self.buf[self.hi - 1].is_null(), "missing sentinel header");
        for h in self.headers() {
            assert!(!h.is_null());
            assert!(h.first() <= h.last() && h.last() <= H::CAPACITY);
        }
    }
}

impl<H: SegHeader> Drop for HeaderIndex<H> {
    fn drop(&mut self) {
        for seg in self.lo..self.hi - 1 {
            let h = self.buf[seg];
            // Safety: Live headers own their areas; elements were dropped by
            // the container before this point.
            unsafe { self.pool.deallocate(h.area()) };
        }
    }
}
