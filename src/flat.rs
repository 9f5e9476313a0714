//! Relocation primitives over the live and uninitialized slots of one area.
//!
//! Every run of live elements sits inside a larger uninitialized buffer, so
//! the primitives here move elements by relocation: a plain byte copy that
//! transfers ownership of the value to the destination slot and leaves the
//! source slots as dead storage. No drops happen on relocated-from slots;
//! only [`drop_range`] ends element lifetimes, and it is used exclusively for
//! elements the caller is erasing.

use std::ptr;

/// Drops the `n` live elements starting at `first`.
///
/// # Safety
///
/// `[first, first + n)` must be a valid run of live elements, and those slots
/// are dead storage afterwards.
#[inline]
pub(crate) unsafe fn drop_range<T>(first: *mut T, n: usize) {
    // Safety: Upheld by the caller.
    unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(first, n)) };
}

/// Relocates the run `[first, first + n)` down by `shift` positions.
///
/// # Safety
///
/// Both the source run and `[first - shift, first - shift + n)` must lie
/// inside one allocation; the source run must be live.
#[inline]
pub(crate) unsafe fn slide_down<T>(first: *mut T, n: usize, shift: usize) {
    // Safety: Ranges overlap at most with themselves; copy handles overlap.
    unsafe { ptr::copy(first, first.sub(shift), n) };
}

/// Relocates the run `[first, first + n)` up by `shift` positions.
///
/// # Safety
///
/// As [`slide_down`], mirrored.
#[inline]
pub(crate) unsafe fn slide_up<T>(first: *mut T, n: usize, shift: usize) {
    // Safety: See `slide_down`.
    unsafe { ptr::copy(first, first.add(shift), n) };
}

/// Opens a gap of `n` uninitialized slots at `split` inside the live range
/// `[first, last)` of an area of `cap` slots, and returns the new live range.
///
/// The smaller of the two runs around `split` is moved into the free space
/// beside it; ties move the side with more free space to consume, left
/// first. When neither side's free space fits `n` on its own the gap is
/// split across both sides so the new live range ends up centered, with
/// front and back free space differing by at most one.
///
/// The slots `[split', split' + n)` of the returned range (where `split'` is
/// `split` shifted along with its left run) are dead storage the caller must
/// initialize before treating them as live.
///
/// # Safety
///
/// `data` must point at an allocation of `cap` slots with
/// `first <= split <= last <= cap`, `[first, last)` live, and
/// `n <= first + (cap - last)`.
pub(crate) unsafe fn open_gap<T>(
    data: *mut T,
    cap: usize,
    first: usize,
    last: usize,
    split: usize,
    n: usize,
) -> (usize, usize) {
    debug_assert!(first <= split && split <= last && last <= cap);
    let front = first;
    let back = cap - last;
    debug_assert!(n <= front + back);

    let left = split - first;
    let right = last - split;
    // Safety: All relocations below stay inside `[0, cap)` per the size
    // checks; sources are live sub-runs of `[first, last)`.
    unsafe {
        if front >= n && back >= n {
            if left < right || (left == right && front >= back) {
                slide_down(data.add(first), left, n);
                (first - n, last)
            } else {
                slide_up(data.add(split), right, n);
                (first, last + n)
            }
        } else if front >= n {
            slide_down(data.add(first), left, n);
            (first - n, last)
        } else if back >= n {
            slide_up(data.add(split), right, n);
            (first, last + n)
        } else {
            // Split the gap over both sides, recentering the live range.
            let f = (front + back - n) / 2;
            let down = front - f;
            let up = n - down;
            slide_down(data.add(first), left, down);
            slide_up(data.add(split), right, up);
            (first - down, last + up)
        }
    }
}

/// Closes the hole `[hole_first, hole_last)` inside the live range
/// `[first, last)` by relocating the smaller adjacent run over it.
///
/// Returns the new live range and the index just past the closed hole.
///
/// # Safety
///
/// `data` must point at one allocation,
/// `first <= hole_first <= hole_last <= last`, and every slot of
/// `[first, last)` outside the hole must be live. The hole itself is treated
/// as dead storage; callers erasing elements drop them first.
pub(crate) unsafe fn close_gap<T>(
    data: *mut T,
    first: usize,
    last: usize,
    hole_first: usize,
    hole_last: usize,
) -> (usize, usize, usize) {
    debug_assert!(first <= hole_first && hole_first <= hole_last && hole_last <= last);
    let k = hole_last - hole_first;
    let pre = hole_first - first;
    let post = last - hole_last;
    // Safety: Relocations stay inside `[first, last)`; sources are live.
    unsafe {
        if pre < post {
            slide_up(data.add(first), pre, k);
            (first + k, last, hole_last)
        } else {
            slide_down(data.add(hole_last), post, k);
            (first, last - k, hole_first)
        }
    }
}
