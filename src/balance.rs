//! Inter-segment balancing primitives: slides inside one area and
//! concatenating moves between adjacent segments.
//!
//! The `(n0, e, n1)` move shape is what the planners build everything from:
//! relocate `n0` elements, leave a hole of `e` dead slots, relocate `n1`
//! more. The hole is how a planner reserves room for incoming elements in
//! the middle of a transfer without touching them twice.

use crate::header::SegHeader;
use std::ptr;

/// First index of a centered run of `s` live slots in an area of `c` slots.
#[inline]
pub(crate) fn balanced_begin(c: usize, s: usize) -> usize {
    (c - s) / 2
}

/// One past the last index of a centered run of `s` live slots.
#[inline]
pub(crate) fn balanced_end(c: usize, s: usize) -> usize {
    balanced_begin(c, s) + s
}

/// Moves the whole segment `k` positions toward the front of its area.
///
/// # Safety
///
/// `h` must be live with `front_free() >= k`.
pub(crate) unsafe fn slide_segment<H: SegHeader>(h: &mut H, k: usize) {
    debug_assert!(h.front_free() >= k);
    // Safety: Stays inside the area per the precondition.
    unsafe { crate::flat::slide_down(h.begin(), h.size(), k) };
    h.set_bounds(h.first() - k, h.last() - k);
}

/// Moves the whole segment `k` positions toward the back of its area.
///
/// # Safety
///
/// `h` must be live with `back_free() >= k`.
pub(crate) unsafe fn slide_segment_back<H: SegHeader>(h: &mut H, k: usize) {
    debug_assert!(h.back_free() >= k);
    // Safety: Stays inside the area per the precondition.
    unsafe { crate::flat::slide_up(h.begin(), h.size(), k) };
    h.set_bounds(h.first() + k, h.last() + k);
}

/// Concatenating move from the front of `curr` to the back of `left`:
/// `n0` elements, a hole of `e`, then `n1` elements. Assumes `left` already
/// has the back room.
///
/// # Safety
///
/// `curr` and `left` must be live headers over distinct areas with
/// `left.back_free() >= n0 + e + n1` and `curr.size() >= n0 + n1`.
pub(crate) unsafe fn move_to_left_unchecked<H: SegHeader>(
    curr: &mut H,
    left: &mut H,
    n0: usize,
    e: usize,
    n1: usize,
) {
    debug_assert!(left.back_free() >= n0 + e + n1);
    debug_assert!(curr.size() >= n0 + n1);
    // Safety: Distinct areas, both runs in bounds per the preconditions.
    unsafe {
        ptr::copy_nonoverlapping(curr.begin(), left.end(), n0);
        ptr::copy_nonoverlapping(curr.begin().add(n0), left.end().add(n0 + e), n1);
    }
    left.set_last(left.last() + n0 + e + n1);
    curr.set_first(curr.first() + n0 + n1);
}

/// As [`move_to_left_unchecked`], but recenters `left` first when its back
/// free space alone cannot take the transfer.
///
/// # Safety
///
/// As [`move_to_left_unchecked`], with the weaker requirement
/// `left.available() >= n0 + e + n1`.
pub(crate) unsafe fn move_to_left<H: SegHeader>(
    curr: &mut H,
    left: &mut H,
    n0: usize,
    e: usize,
    n1: usize,
) {
    let n = n0 + e + n1;
    debug_assert!(left.available() >= n);
    // Safety: Preconditions forwarded; the slide target is the centered
    // begin for the grown segment, which the front room covers exactly when
    // the back room falls short.
    unsafe {
        if left.back_free() < n {
            let k = left.first() - balanced_begin(H::CAPACITY, left.size() + n);
            slide_segment(left, k);
        }
        move_to_left_unchecked(curr, left, n0, e, n1);
    }
}

/// Concatenating move from the back of `curr` to the front of `right`:
/// `n0` elements against `right`'s begin, a hole of `e`, then `n1` more.
/// Assumes `right` already has the front room.
///
/// # Safety
///
/// `curr` and `right` must be live headers over distinct areas with
/// `right.front_free() >= n0 + e + n1` and `curr.size() >= n0 + n1`.
pub(crate) unsafe fn move_to_right_unchecked<H: SegHeader>(
    curr: &mut H,
    right: &mut H,
    n0: usize,
    e: usize,
    n1: usize,
) {
    debug_assert!(right.front_free() >= n0 + e + n1);
    debug_assert!(curr.size() >= n0 + n1);
    // Safety: Distinct areas, both runs in bounds per the preconditions.
    unsafe {
        ptr::copy_nonoverlapping(curr.end().sub(n0), right.begin().sub(n0), n0);
        ptr::copy_nonoverlapping(
            curr.end().sub(n0 + n1),
            right.begin().sub(n0 + e + n1),
            n1,
        );
    }
    right.set_first(right.first() - (n0 + e + n1));
    curr.set_last(curr.last() - (n0 + n1));
}

/// As [`move_to_right_unchecked`], but recenters `right` first when its
/// front free space alone cannot take the transfer.
///
/// # Safety
///
/// As [`move_to_right_unchecked`], with the weaker requirement
/// `right.available() >= n0 + e + n1`.
pub(crate) unsafe fn move_to_right<H: SegHeader>(
    curr: &mut H,
    right: &mut H,
    n0: usize,
    e: usize,
    n1: usize,
) {
    let n = n0 + e + n1;
    debug_assert!(right.available() >= n);
    // Safety: Preconditions forwarded, slide target as in `move_to_left`.
    unsafe {
        if right.front_free() < n {
            let k = balanced_end(H::CAPACITY, right.size() + n) - right.last();
            slide_segment_back(right, k);
        }
        move_to_right_unchecked(curr, right, n0, e, n1);
    }
}

/// Moves `n` elements from the back of `curr` into the empty segment
/// `right`, placing them at the explicit index `f`.
///
/// # Safety
///
/// `right` must be an empty live header over an area distinct from `curr`'s,
/// `f + n <= CAPACITY`, and `curr.size() >= n`.
pub(crate) unsafe fn move_to_right_empty<H: SegHeader>(
    curr: &mut H,
    right: &mut H,
    f: usize,
    n: usize,
) {
    debug_assert!(right.size() == 0);
    debug_assert!(f + n <= H::CAPACITY && curr.size() >= n);
    // Safety: Distinct areas, runs in bounds per the preconditions.
    unsafe { ptr::copy_nonoverlapping(curr.end().sub(n), right.data().add(f), n) };
    right.set_bounds(f, f + n);
    curr.set_last(curr.last() - n);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{BigHeader, SegHeader};
    use std::alloc::{Layout, alloc, dealloc};
    use std::ptr::NonNull;

    type H = BigHeader<i32, 16>;

    // A pair of headers over real areas, pre-filled with distinct runs.
    fn with_pair(lhs: &[i32], lhs_at: usize, rhs: &[i32], rhs_at: usize, run: impl FnOnce(H, H)) {
        let layout = Layout::from_size_align(H::AREA_SIZE, H::AREA_ALIGN).unwrap();
        let a = NonNull::new(unsafe { alloc(layout) }).expect("test area allocation failed");
        let b = NonNull::new(unsafe { alloc(layout) }).expect("test area allocation failed");
        let mut ha = unsafe { H::attach(a) };
        let mut hb = unsafe { H::attach(b) };
        for (i, &v) in lhs.iter().enumerate() {
            unsafe { ha.data().add(lhs_at + i).write(v) };
        }
        ha.set_bounds(lhs_at, lhs_at + lhs.len());
        for (i, &v) in rhs.iter().enumerate() {
            unsafe { hb.data().add(rhs_at + i).write(v) };
        }
        hb.set_bounds(rhs_at, rhs_at + rhs.len());

        run(ha, hb);

        unsafe {
            dealloc(a.as_ptr(), layout);
            dealloc(b.as_ptr(), layout);
        }
    }

    #[test]
    fn slides_move_the_run_and_its_bounds() {
        with_pair(&[1, 2, 3], 6, &[], 0, |mut h, _| {
            unsafe { slide_segment(&mut h, 4) };
            assert_eq!((h.first(), h.last()), (2, 5));
            assert_eq!(unsafe { h.items() }, &[1, 2, 3]);

            unsafe { slide_segment_back(&mut h, 10) };
            assert_eq!((h.first(), h.last()), (12, 15));
            assert_eq!(unsafe { h.items() }, &[1, 2, 3]);
        });
    }

    #[test]
    fn left_move_appends_with_a_hole() {
        with_pair(&[1, 2, 3, 4], 2, &[10, 20, 30, 40, 50], 5, |mut left, mut curr| {
            unsafe { move_to_left_unchecked(&mut curr, &mut left, 2, 3, 1) };
            // left took 10, 20, a three-slot hole, then 30.
            assert_eq!((left.first(), left.last()), (2, 12));
            assert_eq!(unsafe { curr.items() }, &[40, 50]);
            let data = left.data();
            unsafe {
                assert_eq!(*data.add(6), 10);
                assert_eq!(*data.add(7), 20);
                assert_eq!(*data.add(11), 30);
            }
        });
    }

    #[test]
    fn left_move_recenters_when_the_back_is_short() {
        with_pair(&[1, 2, 3, 4], 11, &[10, 20, 30], 0, |mut left, mut curr| {
            // Back free is 1 but three elements arrive: the run recenters.
            unsafe { move_to_left(&mut curr, &mut left, 3, 0, 0) };
            assert_eq!(left.first(), balanced_begin(16, 7));
            assert_eq!(unsafe { left.items() }, &[1, 2, 3, 4, 10, 20, 30]);
            assert_eq!(unsafe { curr.items() }, &[]);
        });
    }

    #[test]
    fn right_move_prepends_with_a_hole() {
        with_pair(&[1, 2, 3, 4, 5], 2, &[10, 20], 10, |mut curr, mut right| {
            unsafe { move_to_right_unchecked(&mut curr, &mut right, 1, 2, 2) };
            // right took 3, 4, a two-slot hole, then 5 against its begin.
            assert_eq!((right.first(), right.last()), (5, 12));
            assert_eq!(unsafe { curr.items() }, &[1, 2]);
            let data = right.data();
            unsafe {
                assert_eq!(*data.add(5), 3);
                assert_eq!(*data.add(6), 4);
                assert_eq!(*data.add(9), 5);
            }
        });
    }

    #[test]
    fn right_move_recenters_when_the_front_is_short() {
        with_pair(&[1, 2, 3, 4], 2, &[10, 20, 30], 1, |mut curr, mut right| {
            unsafe { move_to_right(&mut curr, &mut right, 2, 0, 0) };
            assert_eq!(right.last(), balanced_end(16, 5));
            assert_eq!(unsafe { right.items() }, &[3, 4, 10, 20, 30]);
            assert_eq!(unsafe { curr.items() }, &[1, 2]);
        });
    }

    #[test]
    fn empty_right_takes_an_explicit_position() {
        with_pair(&[1, 2, 3, 4], 4, &[], 0, |mut curr, mut right| {
            right.set_bounds(9, 9);
            unsafe { move_to_right_empty(&mut curr, &mut right, 6, 3) };
            assert_eq!((right.first(), right.last()), (6, 9));
            assert_eq!(unsafe { right.items() }, &[2, 3, 4]);
            assert_eq!(unsafe { curr.items() }, &[1]);
        });
    }
}
