//! Definition of the segmented sequence engine.
//!
//! [`SegList`] keeps a totally ordered sequence of elements spread over
//! fixed-capacity segments: lookups are two-level, point edits cost at most
//! one segment's worth of moves, and bulk edits amortize across segments.
//! It is position-addressed and order-agnostic; the sorted facades add the
//! comparator on top.

use crate::cursor::{self, Coord, Iter};
use crate::erase::plan_erase;
use crate::header::{BigHeader, SegHeader, SmallHeader};
use crate::index::HeaderIndex;
use crate::insert::plan_insert;
use crate::pool::PoolBacking;
use std::fmt;
use std::ptr;

/// Sequence of elements stored across fixed-capacity segments.
///
/// Generic over the header layout; use the [`BigSegList`] / [`SmallSegList`]
/// aliases to pick one. The capacity `C` is part of the type: every segment
/// holds at most `C` elements, and every segment except the first holds at
/// least `C / 2` between operations.
///
/// Coordinates handed out by one call are invalidated by the next mutation,
/// except the ones that mutation itself returns.
pub struct SegList<H: SegHeader> {
    index: HeaderIndex<H>,
    len: usize,
}

/// Segmented sequence with inline-index headers.
pub type BigSegList<T, const C: usize> = SegList<BigHeader<T, C>>;

/// Segmented sequence with single-pointer headers.
pub type SmallSegList<T, const C: usize> = SegList<SmallHeader<T, C>>;

// Safety: The raw pointers inside reference storage owned by this value;
// mutation requires `&mut self` per the single-threaded contract.
unsafe impl<H: SegHeader> Send for SegList<H> where H::Item: Send {}
unsafe impl<H: SegHeader> Sync for SegList<H> where H::Item: Sync {}

impl<H: SegHeader> SegList<H> {
    /// Empty sequence with heap-backed segment areas.
    pub fn new() -> Self {
        Self::with_backing(PoolBacking::Heap)
    }

    /// Empty sequence whose segment areas come from the given backing.
    pub fn with_backing(backing: PoolBacking) -> Self {
        Self {
            index: HeaderIndex::new(backing),
            len: 0,
        }
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of live segments.
    #[inline]
    pub fn segments(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn headers(&self) -> &[H] {
        self.index.headers()
    }

    pub(crate) fn backing(&self) -> PoolBacking {
        self.index.backing()
    }

    /// Coordinate of the first element; equals [`Self::end`] when empty.
    #[inline]
    pub fn begin(&self) -> Coord {
        Coord::new(0, 0)
    }

    /// Coordinate one past the last element.
    #[inline]
    pub fn end(&self) -> Coord {
        Coord::new(self.segments(), 0)
    }

    /// The element at `at`, if the coordinate addresses one.
    pub fn get(&self, at: Coord) -> Option<&H::Item> {
        let h = self.headers().get(at.seg)?;
        if at.off >= h.size() {
            return None;
        }
        // Safety: In-bounds live slot; the borrow pins the storage.
        Some(unsafe { &*h.begin().add(at.off) })
    }

    /// Iterator over every element, front to back.
    pub fn iter(&self) -> Iter<'_, H> {
        Iter::new(self.headers(), self.begin(), self.end(), self.len)
    }

    /// Iterator over the elements of `[first, last)`.
    pub fn range(&self, first: Coord, last: Coord) -> Iter<'_, H> {
        let n = self.distance(first, last);
        Iter::new(self.headers(), first, last, n)
    }

    /// Moves a coordinate `n` elements toward the end.
    pub fn advance(&self, at: Coord, n: usize) -> Coord {
        cursor::advance(self.headers(), at, n)
    }

    /// Moves a coordinate `n` elements toward the start.
    pub fn retreat(&self, at: Coord, n: usize) -> Coord {
        cursor::retreat(self.headers(), at, n)
    }

    /// Number of elements in `[first, last)`.
    pub fn distance(&self, first: Coord, last: Coord) -> usize {
        cursor::distance(self.headers(), first, last)
    }

    /// Folds an end-of-segment coordinate onto the start of the next
    /// segment, and everything at or past the end onto the end coordinate.
    fn normalized(&self, at: Coord) -> Coord {
        let len = self.segments();
        if at.seg >= len {
            return Coord::new(len, 0);
        }
        if at.off == self.index.header(at.seg).size() {
            return Coord::new(at.seg + 1, 0);
        }
        at
    }

    /// Maps a (normalized) coordinate onto the segment the planners work
    /// with: the end coordinate anchors to the back of the last segment.
    fn anchored(&self, at: Coord) -> Coord {
        let len = self.segments();
        if at.seg == len && len > 0 {
            let size = self.index.header(len - 1).size();
            return Coord::new(len - 1, size);
        }
        at
    }

    /// Inserts `value` before `at` and returns its coordinate.
    ///
    /// # Panics
    ///
    /// Panics when no backing memory can be acquired; the sequence is
    /// unchanged in that case.
    pub fn insert(&mut self, at: Coord, value: H::Item) -> Coord {
        let at = self.anchored(at);
        let (first, _) = plan_insert(&mut self.index, at.seg, at.off, 1)
            .expect("segment area allocation failed");
        let h = self.index.header(first.seg);
        // Safety: The planner opened a one-slot gap at `first`.
        unsafe { h.begin().add(first.off).write(value) };
        self.len += 1;
        self.debug_check();
        first
    }

    /// Inserts the elements of `values` before `at`, in order, and returns
    /// the coordinates bracketing the inserted run.
    ///
    /// # Panics
    ///
    /// As [`Self::insert`].
    pub fn insert_bulk(&mut self, at: Coord, mut values: Vec<H::Item>) -> (Coord, Coord) {
        let n = values.len();
        let at = self.anchored(at);
        let (first, last) = plan_insert(&mut self.index, at.seg, at.off, n)
            .expect("segment area allocation failed");
        // Safety: The planner opened a gap of exactly `n` slots spanning
        // `[first, last)`; the values relocate out of the vector.
        unsafe {
            self.fill_gap(first, last, values.as_ptr(), n);
            values.set_len(0);
        }
        self.len += n;
        self.debug_check();
        (first, self.normalized(last))
    }

    /// Relocates `n` elements from `src` into the gap `[first, last)`.
    unsafe fn fill_gap(&mut self, first: Coord, last: Coord, mut src: *const H::Item, n: usize) {
        if n == 0 {
            return;
        }
        let mut seg = first.seg;
        let mut off = first.off;
        let mut left = n;
        while seg < last.seg {
            let h = self.index.header(seg);
            let take = h.size() - off;
            // Safety: Every slot of the gap is dead storage awaiting its
            // element; source and area never overlap.
            unsafe {
                ptr::copy_nonoverlapping(src, h.begin().add(off), take);
                src = src.add(take);
            }
            left -= take;
            seg += 1;
            off = 0;
        }
        let h = self.index.header(seg);
        let take = last.off - off;
        // Safety: As above.
        unsafe { ptr::copy_nonoverlapping(src, h.begin().add(off), take) };
        debug_assert_eq!(left, take);
    }

    /// Erases `[first, last)`. Returns the coordinate of the element that
    /// followed the range and the number of elements erased.
    pub fn erase(&mut self, first: Coord, last: Coord) -> (Coord, usize) {
        if self.len == 0 {
            return (self.end(), 0);
        }
        let first = self.anchored(self.normalized(first));
        let last = self.anchored(self.normalized(last));
        debug_assert!(first <= last);
        let (next, count) = plan_erase(&mut self.index, first, last);
        self.len -= count;
        self.debug_check();
        (self.normalized(next), count)
    }

    /// Drops every element and segment.
    pub fn clear(&mut self) {
        self.drop_elements();
        let segments = self.segments();
        self.index.remove_headers(0, segments);
        self.len = 0;
        self.debug_check();
    }

    fn drop_elements(&mut self) {
        for h in self.index.headers() {
            // Safety: Live runs hold initialized elements; the headers are
            // removed (or the list forgotten) right after.
            unsafe { crate::flat::drop_range(h.begin(), h.size()) };
        }
    }

    /// Invariant pass run after every mutation in debug builds.
    #[cfg(debug_assertions)]
    fn debug_check(&self) {
        self.index.debug_check();
        let mut total = 0;
        for (seg, h) in self.headers().iter().enumerate() {
            let size = h.size();
            assert!(size > 0, "live segments are never empty");
            assert!(
                seg == 0 || size >= H::limit(),
                "segment {seg} below the occupancy limit: {size}"
            );
            total += size;
        }
        assert_eq!(total, self.len, "segment sizes out of sync with len");
    }

    #[cfg(not(debug_assertions))]
    #[inline]
    fn debug_check(&self) {}
}

impl<H: SegHeader> Drop for SegList<H> {
    fn drop(&mut self) {
        self.drop_elements();
    }
}

impl<H: SegHeader> Default for SegList<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: SegHeader> Clone for SegList<H>
where
    H::Item: Clone,
{
    /// Replicates the sequence segment by segment, preserving the exact
    /// segment layout of the source.
    ///
    /// A panicking element clone destructs the partially built copy and
    /// propagates; the source is untouched.
    fn clone(&self) -> Self {
        let mut out = Self::with_backing(self.backing());
        for (seg, src) in self.headers().iter().enumerate() {
            out.index
                .insert_headers(seg, 1)
                .expect("segment area allocation failed");
            let first = src.first();
            out.index.header_mut(seg).set_bounds(first, first);
            // Safety: The live run of `src` is initialized.
            for (k, item) in unsafe { src.items() }.iter().enumerate() {
                let value = item.clone();
                let dst = out.index.header_mut(seg);
                // Safety: Slot `first + k` is the next dead slot of `dst`.
                unsafe { dst.data().add(first + k).write(value) };
                dst.set_last(first + k + 1);
                out.len += 1;
            }
        }
        out.debug_check();
        out
    }
}

impl<H: SegHeader> PartialEq for SegList<H>
where
    H::Item: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<H: SegHeader> Eq for SegList<H> where H::Item: Eq {}

impl<H: SegHeader> PartialOrd for SegList<H>
where
    H::Item: PartialOrd,
{
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<H: SegHeader> Ord for SegList<H>
where
    H::Item: Ord,
{
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<H: SegHeader> fmt::Debug for SegList<H>
where
    H::Item: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, H: SegHeader> IntoIterator for &'a SegList<H> {
    type Item = &'a H::Item;
    type IntoIter = Iter<'a, H>;

    fn into_iter(self) -> Iter<'a, H> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolero::{TypeGenerator, check};
    use rstest::rstest;
    use std::time::Duration;

    type List = BigSegList<i32, 100>;
    type SmallList = SmallSegList<i32, 100>;

    fn filled<H: SegHeader<Item = i32>>(n: i32) -> SegList<H> {
        let mut list = SegList::new();
        let end = list.end();
        list.insert_bulk(end, (0..n).collect());
        list
    }

    fn contents<H: SegHeader<Item = i32>>(list: &SegList<H>) -> Vec<i32> {
        list.iter().copied().collect()
    }

    fn sizes<H: SegHeader>(list: &SegList<H>) -> Vec<usize> {
        list.headers().iter().map(|h| h.size()).collect()
    }

    #[test]
    fn empty_fill_balances_three_segments() {
        let list: List = filled(250);
        assert_eq!(list.len(), 250);
        assert_eq!(list.segments(), 3);
        let mut shape = sizes(&list);
        shape.sort_unstable();
        assert_eq!(shape, vec![83, 83, 84]);
        assert_eq!(contents(&list), (0..250).collect::<Vec<_>>());
    }

    #[test]
    fn small_layout_behaves_identically() {
        let list: SmallList = filled(250);
        let mut shape = sizes(&list);
        shape.sort_unstable();
        assert_eq!(shape, vec![83, 83, 84]);
        assert_eq!(contents(&list), (0..250).collect::<Vec<_>>());
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(100)]
    #[case(1000)]
    fn fill_sizes_honor_the_limit(#[case] n: i32) {
        let list: List = filled(n);
        assert_eq!(list.len(), n as usize);
        assert_eq!(contents(&list), (0..n).collect::<Vec<_>>());
        for (seg, size) in sizes(&list).iter().enumerate() {
            assert!(seg == 0 || *size >= 50);
        }
    }

    #[test]
    fn point_inserts_build_a_sequence() {
        let mut list: List = SegList::new();
        for v in 0..300 {
            let end = list.end();
            list.insert(end, v);
        }
        let at = list.advance(list.begin(), 150);
        list.insert(at, -1);
        assert_eq!(list.len(), 301);
        assert_eq!(*list.get(list.advance(list.begin(), 150)).unwrap(), -1);
    }

    #[test]
    fn split_insert_spreads_over_new_segments() {
        // Two segments of 90 each, then 200 more in the middle of the first.
        let mut list: List = filled(180);
        assert_eq!(sizes(&list), vec![90, 90]);

        let incoming: Vec<i32> = (1000..1200).collect();
        let (first, last) = list.insert_bulk(Coord::new(0, 45), incoming);
        assert_eq!(list.len(), 380);
        assert!(list.segments() >= 4);
        for (seg, size) in sizes(&list).iter().enumerate() {
            assert!(seg == 0 || *size >= 50);
        }
        assert_eq!(list.distance(first, last), 200);

        let mut expect: Vec<i32> = (0..45).collect();
        expect.extend(1000..1200);
        expect.extend(45..180);
        assert_eq!(contents(&list), expect);
    }

    #[test]
    fn full_neighborhood_point_insert_adds_one_segment() {
        // Three segments at capacity; a middle insert must split.
        let mut list: List = filled(300);
        assert_eq!(sizes(&list), vec![100, 100, 100]);

        let at = list.insert(Coord::new(1, 50), -1);
        assert_eq!(list.len(), 301);
        assert_eq!(list.segments(), 4);
        assert_eq!(*list.get(at).unwrap(), -1);
        for (seg, size) in sizes(&list).iter().enumerate() {
            assert!(seg == 0 || *size >= 50);
        }
        assert_eq!(list.distance(list.begin(), at), 150);
    }

    #[test]
    fn erase_merges_underfilled_neighbors() {
        // (60, 60); erase the last 40 of the first and first 20 of the second.
        let mut list: List = filled(120);
        assert_eq!(sizes(&list), vec![60, 60]);

        let (next, count) = list.erase(Coord::new(0, 20), Coord::new(1, 20));
        assert_eq!(count, 60);
        assert_eq!(list.segments(), 1);
        assert_eq!(sizes(&list), vec![60]);
        assert_eq!(list.distance(list.begin(), next), 20);

        let mut expect: Vec<i32> = (0..20).collect();
        expect.extend(80..120);
        assert_eq!(contents(&list), expect);
    }

    #[test]
    fn erase_above_the_limit_leaves_segments_alone() {
        // (51, 51); erasing one element keeps both segments legal.
        let mut list: List = filled(102);
        assert_eq!(sizes(&list), vec![51, 51]);

        let (_, count) = list.erase(Coord::new(1, 30), Coord::new(1, 31));
        assert_eq!(count, 1);
        assert_eq!(sizes(&list), vec![51, 50]);
    }

    #[test]
    fn erase_spanning_many_segments() {
        let mut list: List = filled(500);
        assert_eq!(list.segments(), 5);

        let (next, count) = list.erase(Coord::new(0, 10), Coord::new(4, 90));
        assert_eq!(count, 480);
        assert_eq!(list.len(), 20);
        assert_eq!(list.distance(list.begin(), next), 10);

        let mut expect: Vec<i32> = (0..10).collect();
        expect.extend(490..500);
        assert_eq!(contents(&list), expect);
    }

    #[test]
    fn erase_everything_leaves_an_empty_list() {
        let mut list: List = filled(250);
        let (next, count) = list.erase(list.begin(), list.end());
        assert_eq!(count, 250);
        assert!(list.is_empty());
        assert_eq!(list.segments(), 0);
        assert_eq!(next, list.end());

        // The emptied list is fully reusable.
        let end = list.end();
        list.insert_bulk(end, (0..10).collect());
        assert_eq!(contents(&list), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn insert_then_erase_round_trips() {
        let mut list: List = filled(230);
        let before = contents(&list);

        let at = list.advance(list.begin(), 117);
        let (first, last) = list.insert_bulk(at, (9000..9040).collect());
        let (_, count) = list.erase(first, last);
        assert_eq!(count, 40);
        assert_eq!(contents(&list), before);
    }

    #[test]
    fn bulk_insert_of_nothing_is_a_no_op() {
        let mut list: List = filled(10);
        let at = list.advance(list.begin(), 4);
        let (first, last) = list.insert_bulk(at, Vec::new());
        assert_eq!(first, last);
        assert_eq!(list.len(), 10);
    }

    #[test]
    fn coordinates_walk_both_ways() {
        let list: List = filled(250);
        let mid = list.advance(list.begin(), 137);
        assert_eq!(*list.get(mid).unwrap(), 137);
        assert_eq!(list.retreat(mid, 137), list.begin());
        assert_eq!(list.distance(list.begin(), mid), 137);
        assert_eq!(list.distance(mid, list.end()), 113);
        assert_eq!(list.advance(list.begin(), 250), list.end());
    }

    #[test]
    fn iteration_runs_both_directions() {
        let list: List = filled(250);
        let forward: Vec<i32> = list.iter().copied().collect();
        let mut backward: Vec<i32> = list.iter().rev().copied().collect();
        backward.reverse();
        assert_eq!(forward, backward);

        let a = list.advance(list.begin(), 40);
        let b = list.advance(list.begin(), 170);
        let window: Vec<i32> = list.range(a, b).copied().collect();
        assert_eq!(window, (40..170).collect::<Vec<_>>());
    }

    #[test]
    fn lists_compare_lexicographically() {
        let a: List = filled(10);
        let mut b: List = filled(10);
        let end = b.end();
        b.insert(end, 99);
        assert!(a < b);

        b.erase(b.begin(), b.advance(b.begin(), 1));
        assert!(b > a);
        assert_ne!(a, b);
    }

    #[test]
    fn clone_preserves_layout_and_content() {
        let list: List = filled(333);
        let copy = list.clone();
        assert_eq!(copy, list);
        assert_eq!(sizes(&copy), sizes(&list));
    }

    #[test]
    fn clone_panics_do_not_leak() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static LIVE: AtomicUsize = AtomicUsize::new(0);

        struct Counted(u32);
        impl Clone for Counted {
            fn clone(&self) -> Self {
                if self.0 == 40 {
                    panic!("clone failure injected");
                }
                LIVE.fetch_add(1, Ordering::SeqCst);
                Counted(self.0)
            }
        }
        impl Drop for Counted {
            fn drop(&mut self) {
                LIVE.fetch_sub(1, Ordering::SeqCst);
            }
        }

        let mut list: BigSegList<Counted, 16> = SegList::new();
        for v in 0..60 {
            let end = list.end();
            let value = Counted(v);
            LIVE.fetch_add(1, Ordering::SeqCst);
            list.insert(end, value);
        }

        let live_before = LIVE.load(Ordering::SeqCst);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| list.clone()));
        assert!(result.is_err());
        assert_eq!(LIVE.load(Ordering::SeqCst), live_before);

        drop(list);
        assert_eq!(LIVE.load(Ordering::SeqCst), 0);
    }

    #[derive(Debug, TypeGenerator)]
    enum Operation {
        Insert(u16, i32),
        InsertBulk(u16, u8),
        EraseRange(u16, u16),
    }

    // Differential test against a plain Vec, on a capacity small enough
    // that bulk inserts span several segments and erases hit every merge
    // path.
    #[test]
    fn state_machine_matches_a_vec() {
        check!()
            .with_iterations(150)
            .with_test_time(Duration::from_secs(5))
            .with_type::<Vec<Operation>>()
            .for_each(|operations| {
                let mut list: BigSegList<i32, 8> = SegList::new();
                let mut model: Vec<i32> = Vec::new();
                let mut stamp = 0;

                for operation in operations {
                    match operation {
                        Operation::Insert(pos, v) => {
                            let at = *pos as usize % (model.len() + 1);
                            let coord = list.advance(list.begin(), at);
                            list.insert(coord, *v);
                            model.insert(at, *v);
                        }
                        Operation::InsertBulk(pos, n) => {
                            let at = *pos as usize % (model.len() + 1);
                            stamp += 1;
                            let batch: Vec<i32> =
                                (0..*n as i32).map(|k| stamp * 1000 + k).collect();
                            let coord = list.advance(list.begin(), at);
                            let (first, last) = list.insert_bulk(coord, batch.clone());
                            assert_eq!(list.distance(first, last), batch.len());
                            model.splice(at..at, batch);
                        }
                        Operation::EraseRange(a, b) => {
                            let mut a = *a as usize % (model.len() + 1);
                            let mut b = *b as usize % (model.len() + 1);
                            if b < a {
                                std::mem::swap(&mut a, &mut b);
                            }
                            let first = list.advance(list.begin(), a);
                            let last = list.advance(list.begin(), b);
                            let (_, count) = list.erase(first, last);
                            assert_eq!(count, b - a);
                            model.drain(a..b);
                        }
                    }
                    assert_eq!(list.len(), model.len());
                    assert!(list.iter().copied().eq(model.iter().copied()));
                }
            });
    }

    #[test]
    fn minimum_capacity_still_balances() {
        let mut list: BigSegList<i32, 2> = SegList::new();
        for v in 0..40 {
            let at = list.advance(list.begin(), (v as usize * 7) % (list.len() + 1));
            list.insert(at, v);
        }
        assert_eq!(list.len(), 40);
        let (_, count) = list.erase(
            list.advance(list.begin(), 5),
            list.advance(list.begin(), 25),
        );
        assert_eq!(count, 20);
        assert_eq!(list.len(), 20);
    }
}
