//! The erasure planner: drops a coordinate range, closes the holes, and
//! merges or rebalances the surviving segments so the minimum-occupancy
//! invariant holds again.

use crate::balance::{move_to_left, move_to_right};
use crate::cursor::Coord;
use crate::flat;
use crate::header::SegHeader;
use crate::index::HeaderIndex;

/// Drops `count` elements at offset `at` of segment `seg` and closes the
/// hole by relocating the smaller adjacent run. The erase offset stays `at`
/// in the shrunken segment either way.
fn erase_in_segment<H: SegHeader>(index: &mut HeaderIndex<H>, seg: usize, at: usize, count: usize) {
    let h = index.header_mut(seg);
    debug_assert!(at + count <= h.size());
    // Safety: The range is live; after the drop it is dead storage that
    // `close_gap` may relocate over.
    unsafe {
        flat::drop_range(h.begin().add(at), count);
        let hole = h.first() + at;
        let (first, last, _) =
            flat::close_gap(h.data(), h.first(), h.last(), hole, hole + count);
        h.set_bounds(first, last);
    }
}

/// Restores the occupancy invariant after `curr` alone shrank. Returns the
/// coordinate of the element that followed the erased range.
fn settle_current<H: SegHeader>(index: &mut HeaderIndex<H>, curr: usize, at: usize) -> Coord {
    let size = index.header(curr).size();
    if size >= H::limit() {
        return Coord::new(curr, at);
    }
    if curr == 0 {
        // The first segment may hold any number of elements, but not zero.
        if size > 0 {
            return Coord::new(curr, at);
        }
        index.remove_headers(0, 1);
        return Coord::new(0, 0);
    }
    let left = curr - 1;
    if index.header(left).available() >= size {
        // The whole remainder fits beside the left neighbor.
        {
            let (c, l) = index.pair_mut(curr, left);
            // Safety: Room checked above.
            unsafe { move_to_left(c, l, size, 0, 0) };
        }
        index.remove_headers(curr, curr + 1);
        return Coord::new(left, index.header(left).size() - (size - at));
    }
    // Even out with the left neighbor instead.
    let pull = (index.header(left).size() + size) / 2 - size;
    let (l, c) = index.pair_mut(left, curr);
    // Safety: `curr` has at least `pull` free slots since it is under limit
    // and the pair averages below capacity.
    unsafe { move_to_right(l, c, pull, 0, 0) };
    Coord::new(curr, pull + at)
}

/// Restores the invariant after a cross-segment erase left `left` trimmed at
/// its tail and `right` trimmed at its head, with the segments between them
/// already dropped (their headers still in place). Returns the coordinate of
/// the first surviving element after the erased range.
fn settle_pair<H: SegHeader>(index: &mut HeaderIndex<H>, left: usize, right: usize) -> Coord {
    let left_size = index.header(left).size();
    let right_size = index.header(right).size();
    let total = left_size + right_size;

    if total > H::CAPACITY {
        // Too much for one segment: drop the interior, even the pair out.
        index.remove_headers(left + 1, right);
        let right = left + 1;
        let half = total / 2;
        if left_size < half {
            let pull = half - left_size;
            {
                let (r, l) = index.pair_mut(right, left);
                // Safety: `left` has room for `pull` by the averaging.
                unsafe { move_to_left(r, l, pull, 0, 0) };
            }
            return Coord::new(left, index.header(left).size() - pull);
        }
        let push = left_size - half;
        {
            let (l, r) = index.pair_mut(left, right);
            // Safety: As above, mirrored.
            unsafe { move_to_right(l, r, push, 0, 0) };
        }
        return Coord::new(right, push);
    }
    if total >= H::limit() || (left == 0 && total > 0) {
        // The survivors fit in `left` alone and keep it legal.
        {
            let (r, l) = index.pair_mut(right, left);
            // Safety: `total <= CAPACITY` bounds the transfer.
            unsafe { move_to_left(r, l, right_size, 0, 0) };
        }
        index.remove_headers(left + 1, right + 1);
        return Coord::new(left, left_size);
    }
    if total == 0 {
        index.remove_headers(left, right + 1);
        return Coord::new(left, 0);
    }
    // Too few survivors for a segment of their own; `left` has a
    // predecessor (it is not first here).
    let pred = left - 1;
    if index.header(pred).available() >= total {
        {
            let (l, p) = index.pair_mut(left, pred);
            // Safety: Room checked above.
            unsafe { move_to_left(l, p, left_size, 0, 0) };
        }
        {
            let (r, p) = index.pair_mut(right, pred);
            // Safety: Room checked above covers both transfers.
            unsafe { move_to_left(r, p, right_size, 0, 0) };
        }
        index.remove_headers(left, right + 1);
        return Coord::new(pred, index.header(pred).size() - right_size);
    }
    // Merge the survivors into `left`, then borrow from the predecessor
    // until `left` is legal again.
    {
        let (r, l) = index.pair_mut(right, left);
        // Safety: `total <= CAPACITY`.
        unsafe { move_to_left(r, l, right_size, 0, 0) };
    }
    let pred_size = index.header(pred).size();
    let borrow = pred_size - (pred_size + total) / 2;
    {
        let (p, l) = index.pair_mut(pred, left);
        // Safety: `left` holds `total < limit` elements, leaving room.
        unsafe { move_to_right(p, l, borrow, 0, 0) };
    }
    index.remove_headers(left + 1, right + 1);
    Coord::new(left, index.header(left).size() - right_size)
}

/// Erases the coordinate range `[first, last)`, both ends anchored to live
/// segments. Returns the coordinate just past the erased range and the
/// number of elements erased.
pub(crate) fn plan_erase<H: SegHeader>(
    index: &mut HeaderIndex<H>,
    first: Coord,
    last: Coord,
) -> (Coord, usize) {
    debug_assert!(first <= last);
    if first.seg == last.seg {
        if first.off == last.off {
            return (first, 0);
        }
        let count = last.off - first.off;
        erase_in_segment(index, first.seg, first.off, count);
        (settle_current(index, first.seg, first.off), count)
    } else {
        // Interior segments vanish whole.
        let mut dropped = 0;
        for seg in first.seg + 1..last.seg {
            let h = index.header(seg);
            let size = h.size();
            // Safety: The whole live run is being erased.
            unsafe { flat::drop_range(h.begin(), size) };
            dropped += size;
        }
        let tail = index.header(first.seg).size() - first.off;
        erase_in_segment(index, first.seg, first.off, tail);
        erase_in_segment(index, last.seg, 0, last.off);
        (
            settle_pair(index, first.seg, last.seg),
            dropped + tail + last.off,
        )
    }
}
