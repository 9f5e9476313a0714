//! Definition of the sorted multimap facade.

use crate::cursor::{Coord, Iter};
use crate::header::{BigHeader, SegHeader};
use crate::pool::PoolBacking;
use crate::search::{self, FindStrategy};
use crate::seq::SegList;
use std::fmt;
use std::marker::PhantomData;

/// Sorted multimap over segmented storage.
///
/// Entries are `(key, value)` pairs kept non-decreasing by key; entries with
/// equal keys keep their insertion order. The search surface mirrors
/// [`SegSet`](crate::SegSet), keyed on `K` alone.
pub struct SegMap<K: Ord, V, const C: usize, H: SegHeader<Item = (K, V)> = BigHeader<(K, V), C>> {
    list: SegList<H>,
    strategy: FindStrategy,
    marker: PhantomData<(K, V)>,
}

impl<K: Ord, V, const C: usize, H: SegHeader<Item = (K, V)>> SegMap<K, V, C, H> {
    /// Empty map with heap-backed storage and binary in-segment search.
    pub fn new() -> Self {
        Self::with_config(PoolBacking::Heap, FindStrategy::Binary)
    }

    /// Empty map with explicit backing memory and in-segment strategy.
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

    /// Coordinate of the first entry; equals [`Self::end`] when empty.
    #[inline]
    pub fn begin(&self) -> Coord {
        self.list.begin()
    }

    /// Coordinate one past the last entry.
    #[inline]
    pub fn end(&self) -> Coord {
        self.list.end()
    }

    pub fn get(&self, at: Coord) -> Option<&(K, V)> {
        self.list.get(at)
    }

    /// Iterator over the entries in key order.
    pub fn iter(&self) -> Iter<'_, H> {
        self.list.iter()
    }

    /// Number of entries in `[first, last)`.
    pub fn distance(&self, first: Coord, last: Coord) -> usize {
        self.list.distance(first, last)
    }

    /// Coordinate of the first entry whose key is not less than `key`.
    pub fn lower_bound(&self, key: &K) -> Coord {
        search::partition_point(self.list.headers(), |(k, _)| k < key, self.strategy)
    }

    /// Coordinate of the first entry whose key is greater than `key`.
    pub fn upper_bound(&self, key: &K) -> Coord {
        search::partition_point(self.list.headers(), |(k, _)| k <= key, self.strategy)
    }

    /// Both bounds of the entries whose key is equivalent to `key`.
    pub fn equal_range(&self, key: &K) -> (Coord, Coord) {
        search::equal_range_by(self.list.headers(), |(k, _)| k.cmp(key), self.strategy)
    }

    /// Number of entries with a key equivalent to `key`.
    pub fn count(&self, key: &K) -> usize {
        let (first, last) = self.equal_range(key);
        self.list.distance(first, last)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        matches!(self.get(self.lower_bound(key)), Some((k, _)) if k == key)
    }

    /// Value of the first entry with a key equivalent to `key`.
    pub fn get_first(&self, key: &K) -> Option<&V> {
        match self.get(self.lower_bound(key)) {
            Some((k, v)) if k == key => Some(v),
            _ => None,
        }
    }

    /// Inserts an entry at its key's upper bound, after any entries with an
    /// equal key, and returns its coordinate.
    ///
    /// # Panics
    ///
    /// Panics when no backing memory can be acquired; the map is unchanged
    /// in that case.
    pub fn insert(&mut self, key: K, value: V) -> Coord {
        let at = self.upper_bound(&key);
        self.list.insert(at, (key, value))
    }

    /// Splices a batch of entries, pre-sorted by key, in before `hint`
    /// without searching. The caller asserts that every entry belongs
    /// exactly at `hint`.
    ///
    /// # Panics
    ///
    /// As [`Self::insert`].
    pub fn insert_sorted_unguarded(&mut self, hint: Coord, entries: Vec<(K, V)>) -> (Coord, Coord) {
        debug_assert!(entries.is_sorted_by(|a, b| a.0 <= b.0));
        let at = self.list.insert_bulk(hint, entries);
        debug_assert!(self.iter().is_sorted_by(|a, b| a.0 <= b.0));
        at
    }

    /// Erases `[first, last)`; returns the coordinate after the erased range
    /// and the number of entries erased.
    pub fn erase(&mut self, first: Coord, last: Coord) -> (Coord, usize) {
        self.list.erase(first, last)
    }

    /// Erases every entry with a key equivalent to `key`; returns how many.
    pub fn remove_all(&mut self, key: &K) -> usize {
        let (first, last) = self.equal_range(key);
        self.list.erase(first, last).1
    }
}

impl<K: Ord, V, const C: usize, H: SegHeader<Item = (K, V)>> Default for SegMap<K, V, C, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Clone, const C: usize, H: SegHeader<Item = (K, V)>> Clone
    for SegMap<K, V, C, H>
{
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            strategy: self.strategy,
            marker: PhantomData,
        }
    }
}

impl<K: Ord, V, const C: usize, H: SegHeader<Item = (K, V)>> Extend<(K, V)>
    for SegMap<K, V, C, H>
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Ord, V, const C: usize, H: SegHeader<Item = (K, V)>> FromIterator<(K, V)>
    for SegMap<K, V, C, H>
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut entries: Vec<(K, V)> = iter.into_iter().collect();
        // Stable by key: equal keys keep their input order.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let mut map = Self::new();
        let end = map.end();
        map.list.insert_bulk(end, entries);
        map
    }
}

impl<K: Ord, V: PartialEq, const C: usize, H: SegHeader<Item = (K, V)>> PartialEq
    for SegMap<K, V, C, H>
{
    fn eq(&self, other: &Self) -> bool {
        self.list == other.list
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug, const C: usize, H: SegHeader<Item = (K, V)>> fmt::Debug
    for SegMap<K, V, C, H>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<'a, K: Ord, V, const C: usize, H: SegHeader<Item = (K, V)>> IntoIterator
    for &'a SegMap<K, V, C, H>
{
    type Item = &'a (K, V);
    type IntoIter = Iter<'a, H>;

    fn into_iter(self) -> Iter<'a, H> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Map = SegMap<u32, u32, 64>;

    #[test]
    fn entries_sort_by_key() {
        let mut map: Map = SegMap::new();
        for k in (0..100).rev() {
            map.insert(k, k * 2);
        }
        assert_eq!(map.len(), 100);
        assert!(map.iter().is_sorted_by(|a, b| a.0 <= b.0));
        assert_eq!(map.get_first(&42), Some(&84));
        assert!(map.contains_key(&99));
        assert!(!map.contains_key(&100));
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let mut map: Map = SegMap::new();
        for k in 0..50 {
            map.insert(k % 5, k);
        }
        // Upper-bound placement appends each new duplicate after the class.
        let (first, last) = map.equal_range(&3);
        assert_eq!(map.distance(first, last), 10);
        let values: Vec<u32> = map
            .iter()
            .filter(|(k, _)| *k == 3)
            .map(|(_, v)| *v)
            .collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn collect_is_stable_by_key() {
        let map: Map = (0..200).map(|i| (i % 10, i)).collect();
        for key in 0..10 {
            let values: Vec<u32> = map
                .iter()
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| *v)
                .collect();
            assert_eq!(values, (0..20).map(|j| j * 10 + key).collect::<Vec<_>>());
        }
    }

    #[test]
    fn remove_all_empties_one_class() {
        let mut map: Map = (0..300).map(|i| (i % 3, i)).collect();
        assert_eq!(map.count(&1), 100);
        assert_eq!(map.remove_all(&1), 100);
        assert_eq!(map.count(&1), 0);
        assert_eq!(map.len(), 200);
        assert!(map.iter().all(|(k, _)| *k != 1));
    }

    #[test]
    fn spliced_entries_follow_the_hint() {
        let mut map: Map = (0..50).map(|k| (k * 2, k)).collect();
        let hint = map.lower_bound(&31);
        let batch: Vec<(u32, u32)> = (0..10).map(|i| (31, i)).collect();
        map.insert_sorted_unguarded(hint, batch);
        assert_eq!(map.count(&31), 10);
        assert!(map.iter().is_sorted_by(|a, b| a.0 <= b.0));
    }
}
