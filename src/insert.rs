//! The insertion planner: opens an uninitialized gap of `n` slots at a
//! coordinate, reshaping segments as needed, and returns the coordinates
//! bracketing the gap.
//!
//! The planner never constructs elements; the caller fills the gap. Until it
//! does, the slots inside the returned range are live-by-bookkeeping but
//! still dead storage, so the container keeps that window internal.
//!
//! Decision order, cheapest first:
//!
//! 1. Nothing to do for `n == 0`; bulk segment creation for an empty index.
//! 2. The target segment has room: open the gap in place.
//! 3. A neighbor pair has room: rebalance with the left neighbor, then the
//!    right (left first for determinism).
//! 4. Otherwise allocate the minimal number of new segments to the left of
//!    the target and stream elements leftward, leaving the gap where the
//!    insertion point lands.

use crate::balance::{
    balanced_begin, move_to_left, move_to_left_unchecked, move_to_right, move_to_right_empty,
};
use crate::cursor::Coord;
use crate::flat;
use crate::header::SegHeader;
use crate::index::HeaderIndex;
use crate::pool::AllocError;

/// Target sizes for a run of segments: `count` segments share `total`
/// elements, the first `bonus` of them holding `base + 1`, the rest `base`.
fn segment_shares(cap: usize, left_size: usize, curr_size: usize, n: usize) -> (usize, usize, usize) {
    let total = left_size + curr_size + n;
    let count = total.div_ceil(cap);
    (count, total % count, total / count)
}

/// Next target size in a share walk, consuming one bonus slot if any remain.
#[inline]
fn take_share(bonus: &mut usize, base: usize) -> usize {
    if *bonus > 0 {
        *bonus -= 1;
        base + 1
    } else {
        base
    }
}

/// Next target size without consuming it.
#[inline]
fn peek_share(bonus: usize, base: usize) -> usize {
    if bonus > 0 { base + 1 } else { base }
}

/// Opens the gap inside `curr` alone.
fn open_in_segment<H: SegHeader>(
    index: &mut HeaderIndex<H>,
    curr: usize,
    i: usize,
    n: usize,
) -> (Coord, Coord) {
    let h = index.header_mut(curr);
    debug_assert!(h.available() >= n && i <= h.size());
    // Safety: Gap position is inside the live range and the free space
    // covers `n`; slots created here are the gap the caller will fill.
    let (first, last) = unsafe {
        flat::open_gap(
            h.data(),
            H::CAPACITY,
            h.first(),
            h.last(),
            h.first() + i,
            n,
        )
    };
    h.set_bounds(first, last);
    (Coord::new(curr, i), Coord::new(curr, i + n))
}

/// Marks a centered, still-uninitialized run of `size` slots live on the
/// empty segment at `pos`.
fn mark_gap_segment<H: SegHeader>(index: &mut HeaderIndex<H>, pos: usize, size: usize) {
    let h = index.header_mut(pos);
    debug_assert!(h.size() == 0);
    let b = balanced_begin(H::CAPACITY, size);
    h.set_bounds(b, b + size);
}

/// Walks segments starting at `first`, giving each its target share via
/// `fill` for as long as whole shares fit into `budget`. Returns the first
/// unfilled position, the remaining bonus count, and the leftover budget.
fn walk_shares<H: SegHeader>(
    index: &mut HeaderIndex<H>,
    mut first: usize,
    mut bonus: usize,
    base: usize,
    mut budget: usize,
    mut fill: impl FnMut(&mut HeaderIndex<H>, usize, usize),
) -> (usize, usize, usize) {
    let mut share = peek_share(bonus, base);
    while share <= budget {
        fill(index, first, share);
        budget -= share;
        first += 1;
        bonus = bonus.saturating_sub(1);
        share = peek_share(bonus, base);
    }
    (first, bonus, budget)
}

/// Continues a leftward balance once the pre-range is exhausted: the
/// remaining `n` gap slots and then `curr`'s surviving elements spread over
/// `[first, curr]`. Every segment in `[first, curr)` is empty. Returns the
/// gap's end coordinate.
fn balance_left_gap_only<H: SegHeader>(
    index: &mut HeaderIndex<H>,
    first: usize,
    curr: usize,
    bonus: usize,
    base: usize,
    n: usize,
) -> Coord {
    let (first, bonus, n) = walk_shares(index, first, bonus, base, n, mark_gap_segment);
    if first + 1 == curr {
        // One empty segment remains before `curr`: it takes the rest of the
        // gap plus enough of `curr`'s front to reach its share.
        let share = peek_share(bonus, base);
        let pull = share - n;
        let b = balanced_begin(H::CAPACITY, share);
        let (c, f) = index.pair_mut(curr, first);
        f.set_bounds(b, b);
        // Safety: `f` is empty with back room `CAPACITY - b >= share`, and
        // `curr` keeps at least `pull` elements by the share arithmetic.
        unsafe { move_to_left_unchecked(c, f, 0, n, pull) };
        return Coord::new(first, f.size() - pull);
    }
    if first == curr {
        // The rest of the gap fits in front of `curr`'s surviving elements.
        return open_in_segment(index, curr, 0, n).1;
    }
    // The walk consumed `curr` itself as a pure gap carrier; this happens
    // only when the insertion point was at the very end of a drained `curr`.
    debug_assert_eq!(first, curr + 1);
    Coord::new(curr, index.header(curr).size())
}

/// Leftward balance across freshly inserted empty segments.
///
/// `[first + 1, curr)` are empty; `first` itself holds fewer elements than
/// its target share (possibly zero). The insertion point splits `curr` into
/// a pre-range of `i` elements, the `n`-slot gap, and the rest.
fn balance_left_spread<H: SegHeader>(
    index: &mut HeaderIndex<H>,
    mut first: usize,
    curr: usize,
    mut bonus: usize,
    base: usize,
    mut i: usize,
    n: usize,
) -> (Coord, Coord) {
    debug_assert!(first < curr);
    let mut pull = take_share(&mut bonus, base) - index.header(first).size();
    if pull <= i {
        // `first` tops up from the pre-range alone.
        {
            let (c, f) = index.pair_mut(curr, first);
            // Safety: `available(first) >= pull` by the share arithmetic.
            unsafe { move_to_left(c, f, pull, 0, 0) };
        }
        i -= pull;
        let (filled, left_bonus, left_i) =
            walk_shares(index, first + 1, bonus, base, i, |index, pos, share| {
                let b = balanced_begin(H::CAPACITY, share);
                let (c, f) = index.pair_mut(curr, pos);
                f.set_bounds(b, b);
                // Safety: Empty target centered for exactly `share` elements.
                unsafe { move_to_left_unchecked(c, f, share, 0, 0) };
            });
        bonus = left_bonus;
        i = left_i;
        if filled == curr {
            // The whole gap lands on `curr`.
            return open_in_segment(index, curr, i, n);
        }
        first = filled;
        pull = take_share(&mut bonus, base) - index.header(first).size();
    }
    // The insertion point lands on `first`: its share is the pre-range plus
    // some prefix of the gap.
    debug_assert!(pull > i);
    if pull >= i + n {
        // Gap lands on `first` whole.
        let tail = pull - (i + n);
        let (c, f) = index.pair_mut(curr, first);
        // Safety: Share arithmetic keeps the transfer within `available`.
        unsafe { move_to_left(c, f, i, n, tail) };
        let at = f.size() - tail;
        return (Coord::new(first, at - n), Coord::new(first, at));
    }
    // Gap starts on `first`, continues on the segments after it.
    let lead = pull - i;
    {
        let (c, f) = index.pair_mut(curr, first);
        // Safety: As above.
        unsafe { move_to_left(c, f, i, lead, 0) };
    }
    let begin = Coord::new(first, index.header(first).size() - lead);
    let end = balance_left_gap_only(index, first + 1, curr, bonus, base, n - lead);
    (begin, end)
}

/// Leftward balance entry when a pre-existing left neighbor participates:
/// trims it down to its share first when it is oversized.
fn balance_left_into_new<H: SegHeader>(
    index: &mut HeaderIndex<H>,
    mut first: usize,
    curr: usize,
    mut bonus: usize,
    base: usize,
    i: usize,
    n: usize,
) -> (Coord, Coord) {
    let (next_bonus, share) = if bonus > 0 {
        (bonus - 1, base + 1)
    } else {
        (bonus, base)
    };
    if index.header(first).size() >= share {
        // The old left neighbor exceeds its share; its surplus becomes the
        // seed of the empty segment to its right.
        let surplus = index.header(first).size() - share;
        let f = balanced_begin(H::CAPACITY, peek_share(next_bonus, base));
        let (a, b) = index.pair_mut(first, first + 1);
        // Safety: `b` is a fresh empty segment; `f + surplus` stays within
        // capacity because the surplus is below the next share.
        unsafe { move_to_right_empty(a, b, f, surplus) };
        first += 1;
        bonus = next_bonus;
    }
    balance_left_spread(index, first, curr, bonus, base, i, n)
}

/// Rebalances `curr` with its left neighbor so the pair absorbs the gap.
/// `new_curr` is the size `curr` should end up with (gap included).
fn balance_pair_left<H: SegHeader>(
    index: &mut HeaderIndex<H>,
    curr: usize,
    left: usize,
    new_curr: usize,
    i: usize,
    n: usize,
) -> (Coord, Coord) {
    let size = index.header(curr).size();
    let behind = size - i;
    if new_curr >= behind + n {
        // Gap stays on `curr`; shed leading elements to make room.
        let shed = size + n - new_curr;
        {
            let (c, l) = index.pair_mut(curr, left);
            // Safety: The caller checked the pair's combined room.
            unsafe { move_to_left(c, l, shed, 0, 0) };
        }
        let at = index.header(curr).size() - behind;
        return open_in_segment(index, curr, at, n);
    }
    if new_curr > behind {
        // Gap straddles: its tail stays on `curr`, its head goes left.
        let tail = new_curr - behind;
        let head = n - tail;
        {
            let (c, l) = index.pair_mut(curr, left);
            // Safety: As above.
            unsafe { move_to_left(c, l, i, head, 0) };
        }
        open_in_segment(index, curr, 0, tail);
        return (
            Coord::new(left, index.header(left).size() - head),
            Coord::new(curr, tail),
        );
    }
    // Gap lands on `left` whole, followed by part of the post-range.
    let carried = behind - new_curr;
    {
        let (c, l) = index.pair_mut(curr, left);
        // Safety: As above.
        unsafe { move_to_left(c, l, i, n, carried) };
    }
    let at = index.header(left).size() - carried;
    (Coord::new(left, at - n), Coord::new(left, at))
}

/// Mirror of [`balance_pair_left`] toward the right neighbor.
fn balance_pair_right<H: SegHeader>(
    index: &mut HeaderIndex<H>,
    curr: usize,
    right: usize,
    new_curr: usize,
    i: usize,
    n: usize,
) -> (Coord, Coord) {
    let size = index.header(curr).size();
    if new_curr >= i + n {
        // Gap stays on `curr`; shed trailing elements to make room.
        let shed = size + n - new_curr;
        {
            let (c, r) = index.pair_mut(curr, right);
            // Safety: The caller checked the pair's combined room.
            unsafe { move_to_right(c, r, shed, 0, 0) };
        }
        return open_in_segment(index, curr, i, n);
    }
    if new_curr > i {
        // Gap straddles: its head stays on `curr`, its tail goes right.
        let head = new_curr - i;
        let tail = n - head;
        {
            let (c, r) = index.pair_mut(curr, right);
            // Safety: As above.
            unsafe { move_to_right(c, r, size - i, tail, 0) };
        }
        open_in_segment(index, curr, i, head);
        return (
            Coord::new(curr, index.header(curr).size() - head),
            Coord::new(right, tail),
        );
    }
    // Gap lands on `right` whole, preceded by part of the pre-range.
    let lead = i - new_curr;
    let (c, r) = index.pair_mut(curr, right);
    // Safety: As above.
    unsafe { move_to_right(c, r, size - i, n, lead) };
    (Coord::new(right, lead), Coord::new(right, lead + n))
}

/// Fills an empty index with the minimal segment run for `n` elements.
fn open_into_empty<H: SegHeader>(
    index: &mut HeaderIndex<H>,
    n: usize,
) -> Result<(Coord, Coord), AllocError> {
    let (count, bonus, base) = segment_shares(H::CAPACITY, 0, 0, n);
    index.insert_headers(0, count)?;
    for pos in 0..count {
        mark_gap_segment(index, pos, if pos < bonus { base + 1 } else { base });
    }
    Ok((
        Coord::new(0, 0),
        Coord::new(count - 1, index.header(count - 1).size()),
    ))
}

/// New segments to the left of `curr`, with a left neighbor participating.
fn open_with_new_segments<H: SegHeader>(
    index: &mut HeaderIndex<H>,
    curr: usize,
    i: usize,
    n: usize,
) -> Result<(Coord, Coord), AllocError> {
    let (count, bonus, base) = segment_shares(
        H::CAPACITY,
        index.header(curr - 1).size(),
        index.header(curr).size(),
        n,
    );
    // The left neighbor and `curr` are two of the `count` segments.
    index.insert_headers(curr, count - 2)?;
    Ok(balance_left_into_new(
        index,
        curr - 1,
        curr + (count - 2),
        bonus,
        base,
        i,
        n,
    ))
}

/// New segments to the left of `curr` when `curr` is the first segment.
fn open_with_new_segments_first<H: SegHeader>(
    index: &mut HeaderIndex<H>,
    curr: usize,
    i: usize,
    n: usize,
) -> Result<(Coord, Coord), AllocError> {
    debug_assert_eq!(curr, 0);
    let (count, bonus, base) = segment_shares(H::CAPACITY, 0, index.header(curr).size(), n);
    index.insert_headers(curr, count - 1)?;
    Ok(balance_left_spread(
        index,
        curr,
        curr + (count - 1),
        bonus,
        base,
        i,
        n,
    ))
}

/// Opens an uninitialized gap of `n` slots at offset `i` of segment `curr`
/// and returns the coordinates bracketing it.
///
/// On error the index is exactly as before the call.
pub(crate) fn plan_insert<H: SegHeader>(
    index: &mut HeaderIndex<H>,
    curr: usize,
    i: usize,
    n: usize,
) -> Result<(Coord, Coord), AllocError> {
    if n == 0 {
        let at = Coord::new(curr, i);
        return Ok((at, at));
    }
    let len = index.len();
    if len == 0 {
        return open_into_empty(index, n);
    }
    if index.header(curr).available() >= n {
        return Ok(open_in_segment(index, curr, i, n));
    }

    let size = index.header(curr).size();
    let room = index.header(curr).available();
    if curr > 0 {
        let left = *index.header(curr - 1);
        if room + left.available() >= n {
            let target = (size + left.size() + n) / 2;
            return Ok(balance_pair_left(index, curr, curr - 1, target, i, n));
        }
        if curr + 1 < len {
            let right = *index.header(curr + 1);
            if room + right.available() >= n {
                let target = (size + right.size() + n) / 2;
                return Ok(balance_pair_right(index, curr, curr + 1, target, i, n));
            }
        }
        return open_with_new_segments(index, curr, i, n);
    }
    if curr + 1 < len {
        let right = *index.header(curr + 1);
        if room + right.available() >= n {
            let target = (size + right.size() + n) / 2;
            return Ok(balance_pair_right(index, curr, curr + 1, target, i, n));
        }
    }
    open_with_new_segments_first(index, curr, i, n)
}
