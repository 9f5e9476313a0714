//! Two-level search over segmented storage.
//!
//! Bound queries first binary-search the segment headers, using the *last*
//! element of each candidate segment as the pivot, then finish inside the
//! one remaining segment. The in-segment step is pluggable: binary gives
//! O(log #segments + log C), linear gives O(log #segments + C) but wins on
//! short segments and branchy comparators.

use crate::cursor::Coord;
use crate::header::SegHeader;
use std::cmp::Ordering;

/// How a bound query finishes inside the final candidate segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FindStrategy {
    /// Scan the segment front to back.
    Linear,

    /// Binary-search the segment.
    #[default]
    Binary,
}

#[inline]
fn find_in_segment<T>(
    items: &[T],
    lo: usize,
    hi: usize,
    pred: &mut impl FnMut(&T) -> bool,
    strategy: FindStrategy,
) -> usize {
    match strategy {
        FindStrategy::Linear => lo
            + items[lo..hi]
                .iter()
                .position(|x| !pred(x))
                .unwrap_or(hi - lo),
        FindStrategy::Binary => lo + items[lo..hi].partition_point(|x| pred(x)),
    }
}

/// Partition point of `pred` over the window `[first, last)`.
///
/// `pred` must be a partition predicate over the window: once it is false it
/// stays false. Both window ends must be normalized coordinates. Returns the
/// first position whose element fails `pred`, or `last` if none does.
pub(crate) fn partition_point_in<H: SegHeader>(
    headers: &[H],
    first: Coord,
    last: Coord,
    mut pred: impl FnMut(&H::Item) -> bool,
    strategy: FindStrategy,
) -> Coord {
    let (mut fs, mut fo) = (first.seg, first.off);
    let (mut ls, mut lo) = (last.seg, last.off);

    let mut n = ls - fs;
    while n > 0 {
        let half = n / 2;
        let mid = fs + half;
        let h = &headers[mid];
        // Safety: Live segments are never empty, so the last element exists.
        let pivot = unsafe { &*h.begin().add(h.size() - 1) };
        if pred(pivot) {
            fs = mid + 1;
            fo = 0;
            n -= half + 1;
        } else {
            ls = mid;
            lo = h.size() - 1;
            n = half;
        }
    }
    if fs == headers.len() {
        return Coord::new(fs, 0);
    }
    // Safety: The live run of a segment holds initialized elements.
    let items = unsafe { headers[fs].items() };
    Coord::new(fs, find_in_segment(items, fo, lo, &mut pred, strategy))
}

/// Partition point of `pred` over the whole container.
pub(crate) fn partition_point<H: SegHeader>(
    headers: &[H],
    pred: impl FnMut(&H::Item) -> bool,
    strategy: FindStrategy,
) -> Coord {
    let end = Coord::new(headers.len(), 0);
    partition_point_in(headers, Coord::new(0, 0), end, pred, strategy)
}

/// First position in `[first, last)` satisfying `pred`, or `last`.
///
/// Plain forward scan; used for short windows and hinted searches.
pub(crate) fn find_if_in<H: SegHeader>(
    headers: &[H],
    first: Coord,
    last: Coord,
    mut pred: impl FnMut(&H::Item) -> bool,
) -> Coord {
    let (mut seg, mut off) = (first.seg, first.off);
    while seg < last.seg {
        // Safety: Live runs hold initialized elements.
        let items = unsafe { headers[seg].items() };
        if let Some(i) = items[off..].iter().position(&mut pred) {
            return Coord::new(seg, off + i);
        }
        seg += 1;
        off = 0;
    }
    if seg == headers.len() {
        return Coord::new(seg, 0);
    }
    // Safety: As above.
    let items = unsafe { headers[seg].items() };
    match items[off..last.off].iter().position(&mut pred) {
        Some(i) => Coord::new(seg, off + i),
        None => last,
    }
}

/// Partition point with a locality hint: windows of at most `near` segments
/// are scanned linearly before the binary search takes over.
pub(crate) fn partition_point_near<H: SegHeader>(
    headers: &[H],
    first: Coord,
    last: Coord,
    mut pred: impl FnMut(&H::Item) -> bool,
    near: usize,
    strategy: FindStrategy,
) -> Coord {
    if last.seg - first.seg <= near {
        return find_if_in(headers, first, last, |x| !pred(x));
    }
    if near > 0 {
        let stop = Coord::new(first.seg + near, 0);
        let found = find_if_in(headers, first, stop, |x| !pred(x));
        if found < stop {
            return found;
        }
        return partition_point_in(headers, stop, last, pred, strategy);
    }
    partition_point_in(headers, first, last, pred, strategy)
}

/// Both bounds of the equivalence class described by `probe`, which reports
/// how an element compares against the searched key.
///
/// The two-level narrowing runs once; when a pivot lands inside the class,
/// the window splits into one lower-bound and one upper-bound search on
/// disjoint halves.
pub(crate) fn equal_range_by<H: SegHeader>(
    headers: &[H],
    mut probe: impl FnMut(&H::Item) -> Ordering,
    strategy: FindStrategy,
) -> (Coord, Coord) {
    let (mut fs, mut fo) = (0usize, 0usize);
    let (mut ls, mut lo) = (headers.len(), 0usize);

    let mut n = ls - fs;
    while n > 0 {
        let half = n / 2;
        let mid = fs + half;
        let h = &headers[mid];
        // Safety: Live segments are never empty.
        let pivot = unsafe { &*h.begin().add(h.size() - 1) };
        match probe(pivot) {
            Ordering::Less => {
                fs = mid + 1;
                fo = 0;
                n -= half + 1;
            }
            Ordering::Greater => {
                ls = mid;
                lo = h.size() - 1;
                n = half;
            }
            Ordering::Equal => {
                let lower = partition_point_in(
                    headers,
                    Coord::new(fs, fo),
                    Coord::new(mid, h.size() - 1),
                    |x| probe(x) == Ordering::Less,
                    strategy,
                );
                let upper = partition_point_in(
                    headers,
                    Coord::new(mid + 1, 0),
                    Coord::new(ls, lo),
                    |x| probe(x) != Ordering::Greater,
                    strategy,
                );
                return (lower, upper);
            }
        }
    }
    if fs == headers.len() {
        let end = Coord::new(fs, 0);
        return (end, end);
    }
    // Safety: As above.
    let items = unsafe { headers[fs].items() };
    let lower = find_in_segment(items, fo, lo, &mut |x| probe(x) == Ordering::Less, strategy);
    let upper = find_in_segment(
        items,
        lower,
        lo,
        &mut |x| probe(x) != Ordering::Greater,
        strategy,
    );
    (Coord::new(fs, lower), Coord::new(fs, upper))
}
