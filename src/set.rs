//! Definition of the sorted multiset facade.

use crate::cursor::{Coord, Iter};
use crate::header::{BigHeader, SegHeader};
use crate::pool::PoolBacking;
use crate::search::{self, FindStrategy};
use crate::seq::SegList;
use std::fmt;
use std::marker::PhantomData;

/// Sorted multiset over segmented storage.
///
/// Elements are kept non-decreasing under `T`'s ordering; equal elements
/// keep their insertion order because [`SegSet::insert`] places at the upper
/// bound. Bound queries run the two-level search: binary over segments, then
/// the configured [`FindStrategy`] inside the final segment.
///
/// The third type parameter picks the header layout and defaults to the
/// inline-index one; pass [`SmallHeader`](crate::SmallHeader) to halve the
/// index footprint.
pub struct SegSet<T: Ord, const C: usize, H: SegHeader<Item = T> = BigHeader<T, C>> {
    list: SegList<H>,
    strategy: FindStrategy,
    marker: PhantomData<T>,
}

impl<T: Ord, const C: usize, H: SegHeader<Item = T>> SegSet<T, C, H> {
    /// Empty set with heap-backed storage and binary in-segment search.
    pub fn new() -> Self {
        Self::with_config(PoolBacking::Heap, FindStrategy::Binary)
    }

    /// Empty set with explicit backing memory and in-segment strategy.
    pub fn with_config(backing: PoolBacking, strategy: FindStrategy) -> Self {
        Self {
            list: SegList::with_backing(backing),
            strategy,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    /// Coordinate of the first element; equals [`Self::end`] when empty.
    #[inline]
    pub fn begin(&self) -> Coord {
        self.list.begin()
    }

    /// Coordinate one past the last element.
    #[inline]
    pub fn end(&self) -> Coord {
        self.list.end()
    }

    pub fn get(&self, at: Coord) -> Option<&T> {
        self.list.get(at)
    }

    pub fn iter(&self) -> Iter<'_, H> {
        self.list.iter()
    }

    pub fn first(&self) -> Option<&T> {
        self.list.get(self.begin())
    }

    pub fn last(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.list.get(self.list.retreat(self.end(), 1))
    }

    /// Moves a coordinate `n` elements toward the end.
    pub fn advance(&self, at: Coord, n: usize) -> Coord {
        self.list.advance(at, n)
    }

    /// Number of elements in `[first, last)`.
    pub fn distance(&self, first: Coord, last: Coord) -> usize {
        self.list.distance(first, last)
    }

    /// Coordinate of the first element not less than `value`.
    pub fn lower_bound(&self, value: &T) -> Coord {
        search::partition_point(self.list.headers(), |x| x < value, self.strategy)
    }

    /// Coordinate of the first element greater than `value`.
    pub fn upper_bound(&self, value: &T) -> Coord {
        search::partition_point(self.list.headers(), |x| x <= value, self.strategy)
    }

    /// Both bounds of `value`'s equivalence class.
    pub fn equal_range(&self, value: &T) -> (Coord, Coord) {
        search::equal_range_by(self.list.headers(), |x| x.cmp(value), self.strategy)
    }

    /// Lower bound within `[hint, end)`, scanning up to `near` segments
    /// linearly before binary search takes over.
    pub fn lower_bound_near(&self, hint: Coord, value: &T, near: usize) -> Coord {
        search::partition_point_near(
            self.list.headers(),
            hint,
            self.end(),
            |x| x < value,
            near,
            self.strategy,
        )
    }

    /// Number of elements equivalent to `value`.
    pub fn count(&self, value: &T) -> usize {
        let (first, last) = self.equal_range(value);
        self.list.distance(first, last)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.get(self.lower_bound(value)) == Some(value)
    }

    /// Inserts `value` at its upper bound, after any equal elements, and
    /// returns its coordinate.
    ///
    /// # Panics
    ///
    /// Panics when no backing memory can be acquired; the set is unchanged
    /// in that case.
    pub fn insert(&mut self, value: T) -> Coord {
        let at = self.upper_bound(&value);
        self.list.insert(at, value)
    }

    /// Splices a pre-sorted batch in before `hint` without searching.
    ///
    /// The caller asserts that `values` is non-decreasing and that every
    /// element belongs exactly at `hint`; debug builds verify the resulting
    /// order. Returns the coordinates bracketing the inserted run.
    ///
    /// # Panics
    ///
    /// As [`Self::insert`].
    pub fn insert_sorted_unguarded(&mut self, hint: Coord, values: Vec<T>) -> (Coord, Coord) {
        debug_assert!(values.is_sorted());
        let at = self.list.insert_bulk(hint, values);
        debug_assert!(self.iter().is_sorted());
        at
    }

    /// Erases `[first, last)`; returns the coordinate after the erased range
    /// and the number of elements erased.
    pub fn erase(&mut self, first: Coord, last: Coord) -> (Coord, usize) {
        self.list.erase(first, last)
    }

    /// Erases one element equivalent to `value`, if present.
    pub fn remove(&mut self, value: &T) -> bool {
        let at = self.lower_bound(value);
        if self.get(at) != Some(value) {
            return false;
        }
        let next = self.list.advance(at, 1);
        self.list.erase(at, next);
        true
    }

    /// Number of live segments.
    pub(crate) fn segments(&self) -> usize {
        self.list.segments()
    }
}

impl<T: Ord, const C: usize, H: SegHeader<Item = T>> Default for SegSet<T, C, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone, const C: usize, H: SegHeader<Item = T>> Clone for SegSet<T, C, H> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            strategy: self.strategy,
            marker: PhantomData,
        }
    }
}

impl<T: Ord, const C: usize, H: SegHeader<Item = T>> Extend<T> for SegSet<T, C, H> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: Ord, const C: usize, H: SegHeader<Item = T>> FromIterator<T> for SegSet<T, C, H> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut values: Vec<T> = iter.into_iter().collect();
        values.sort();
        let mut set = Self::new();
        let end = set.end();
        set.list.insert_bulk(end, values);
        set
    }
}

impl<T: Ord, const C: usize, H: SegHeader<Item = T>> PartialEq for SegSet<T, C, H> {
    fn eq(&self, other: &Self) -> bool {
        self.list == other.list
    }
}

impl<T: Ord, const C: usize, H: SegHeader<Item = T>> Eq for SegSet<T, C, H> {}

impl<T: Ord + fmt::Debug, const C: usize, H: SegHeader<Item = T>> fmt::Debug for SegSet<T, C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, T: Ord, const C: usize, H: SegHeader<Item = T>> IntoIterator for &'a SegSet<T, C, H> {
    type Item = &'a T;
    type IntoIter = Iter<'a, H>;

    fn into_iter(self) -> Iter<'a, H> {
        self.iter()
    }
}
