//! A fixed size bitmap over [`PackageId`]s.

use std::ops::{BitAndAssign, BitOrAssign, SubAssign};

use thiserror::Error;

use crate::PackageId;

const WORD_BITS: usize = u64::BITS as usize;

/// Returned when a [`PackageId`] does not fit into a [`SolvMap`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum SolvMapError {
    /// The id is beyond the allocated bits.
    #[error("package id {id} is out of range, the map holds {capacity} ids")]
    OutOfRange {
        /// The offending id
        id: PackageId,
        /// The number of ids the map can hold
        capacity: usize,
    },
}

/// A bitmap with one bit per package.
///
/// The capacity is rounded up to a whole number of bytes: a map created for 25 packages accepts
/// ids up to `31`. Adding or removing an id beyond that fails, testing it returns false.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SolvMap {
    words: Vec<u64>,
    capacity: usize,
}

impl SolvMap {
    /// Creates an empty map that can hold `capacity` ids (rounded up to a multiple of 8).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.div_ceil(8) * 8;
        Self {
            words: vec![0; capacity.div_ceil(WORD_BITS)],
            capacity,
        }
    }

    /// Creates a map with all ids below `len` set. The capacity is `len` rounded up.
    pub fn full(len: usize) -> Self {
        let mut map = Self::new(len);
        for (index, word) in map.words.iter_mut().enumerate() {
            let start = index * WORD_BITS;
            if start + WORD_BITS <= len {
                *word = u64::MAX;
            } else if start < len {
                *word = (1u64 << (len - start)) - 1;
            }
        }
        map
    }

    /// The number of ids the map can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn check(&self, id: PackageId) -> Result<(usize, u64), SolvMapError> {
        let index = id.index();
        if index >= self.capacity {
            return Err(SolvMapError::OutOfRange {
                id,
                capacity: self.capacity,
            });
        }
        Ok((index / WORD_BITS, 1u64 << (index % WORD_BITS)))
    }

    /// Sets the bit of `id`.
    pub fn add(&mut self, id: PackageId) -> Result<(), SolvMapError> {
        let (word, mask) = self.check(id)?;
        self.words[word] |= mask;
        Ok(())
    }

    /// Clears the bit of `id`.
    pub fn remove(&mut self, id: PackageId) -> Result<(), SolvMapError> {
        let (word, mask) = self.check(id)?;
        self.words[word] &= !mask;
        Ok(())
    }

    /// Returns true if the bit of `id` is set. Ids out of range are never contained.
    pub fn contains(&self, id: PackageId) -> bool {
        match self.check(id) {
            Ok((word, mask)) => self.words[word] & mask != 0,
            Err(_) => false,
        }
    }

    /// Clears all bits.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// The number of set bits.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns true if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Sets every bit that is set in `other`. Grows the map if `other` is larger.
    pub fn union(&mut self, other: &SolvMap) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
            self.capacity = other.capacity;
        }
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= b;
        }
    }

    /// Keeps only the bits that are also set in `other`.
    pub fn intersect(&mut self, other: &SolvMap) {
        for (index, a) in self.words.iter_mut().enumerate() {
            *a &= other.words.get(index).copied().unwrap_or(0);
        }
    }

    /// Clears every bit that is set in `other`.
    pub fn difference(&mut self, other: &SolvMap) {
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= !b;
        }
    }

    /// Clears every bit for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(PackageId) -> bool) {
        for (index, word) in self.words.iter_mut().enumerate() {
            let mut bits = *word;
            while bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                if !keep(PackageId::from_index(index * WORD_BITS + bit)) {
                    *word &= !(1u64 << bit);
                }
            }
        }
    }

    /// Iterates over the set ids in ascending order.
    pub fn iter(&self) -> SolvMapIter<'_> {
        SolvMapIter {
            words: &self.words,
            index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl<'a> IntoIterator for &'a SolvMap {
    type Item = PackageId;
    type IntoIter = SolvMapIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl BitOrAssign<&SolvMap> for SolvMap {
    fn bitor_assign(&mut self, rhs: &SolvMap) {
        self.union(rhs);
    }
}

impl BitAndAssign<&SolvMap> for SolvMap {
    fn bitand_assign(&mut self, rhs: &SolvMap) {
        self.intersect(rhs);
    }
}

impl SubAssign<&SolvMap> for SolvMap {
    fn sub_assign(&mut self, rhs: &SolvMap) {
        self.difference(rhs);
    }
}

/// Iterator over the ids of a [`SolvMap`]. Empty words are skipped as a whole.
pub struct SolvMapIter<'a> {
    words: &'a [u64],
    index: usize,
    current: u64,
}

impl Iterator for SolvMapIter<'_> {
    type Item = PackageId;

    fn next(&mut self) -> Option<Self::Item> {
        while self.current == 0 {
            self.index += 1;
            self.current = *self.words.get(self.index)?;
        }
        let bit = self.current.trailing_zeros() as usize;
        // Clear the lowest set bit
        self.current &= self.current - 1;
        Some(PackageId::from_index(self.index * WORD_BITS + bit))
    }
}

impl std::iter::FusedIterator for SolvMapIter<'_> {}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn id(id: u32) -> PackageId {
        PackageId::new(id)
    }

    fn maps() -> (SolvMap, SolvMap) {
        let mut map1 = SolvMap::new(32);
        for i in [0, 2, 28, 30] {
            map1.add(id(i)).unwrap();
        }
        let mut map2 = SolvMap::new(32);
        for i in [0, 1] {
            map2.add(id(i)).unwrap();
        }
        (map1, map2)
    }

    #[test]
    fn test_add() {
        let (mut map1, map2) = maps();
        assert!(map1.contains(id(0)));
        assert!(!map1.contains(id(1)));
        assert!(map1.contains(id(2)));
        assert!(map2.contains(id(1)));
        assert!(!map2.contains(id(2)));

        // Adding twice is fine
        map1.add(id(0)).unwrap();
        assert!(map1.contains(id(0)));

        assert_matches!(
            map1.add(id(u32::MAX)),
            Err(SolvMapError::OutOfRange { capacity: 32, .. })
        );
        assert_matches!(map1.add(id(33)), Err(SolvMapError::OutOfRange { .. }));
        assert_matches!(map1.add(id(32)), Err(SolvMapError::OutOfRange { .. }));
        assert!(!map1.contains(id(33)));
        assert!(!map1.contains(id(u32::MAX)));
    }

    #[test]
    fn test_remove() {
        let (mut map1, _) = maps();
        map1.remove(id(0)).unwrap();
        assert!(!map1.contains(id(0)));
        map1.remove(id(0)).unwrap();
        assert!(!map1.contains(id(0)));
        assert_matches!(map1.remove(id(u32::MAX)), Err(SolvMapError::OutOfRange { .. }));
        assert_matches!(map1.remove(id(33)), Err(SolvMapError::OutOfRange { .. }));
    }

    #[test]
    fn test_allocation_range() {
        let mut map = SolvMap::new(25);
        assert_eq!(map.capacity(), 32);
        map.add(id(31)).unwrap();
        assert_matches!(map.add(id(32)), Err(SolvMapError::OutOfRange { .. }));
    }

    #[test]
    fn test_set_operations() {
        let (map1, map2) = maps();

        let mut union = map2.clone();
        union |= &map1;
        assert_eq!(union.iter().collect::<Vec<_>>(), [0, 1, 2, 28, 30].map(id));

        let mut intersection = map2.clone();
        intersection &= &map1;
        assert_eq!(intersection.iter().collect::<Vec<_>>(), vec![id(0)]);

        let mut difference = map2.clone();
        difference -= &map1;
        assert_eq!(difference.iter().collect::<Vec<_>>(), vec![id(1)]);
    }

    #[test]
    fn test_iter_sparse_and_dense() {
        let mut sparse = SolvMap::new(1000);
        sparse.add(id(3)).unwrap();
        sparse.add(id(700)).unwrap();
        assert_eq!(sparse.iter().collect::<Vec<_>>(), vec![id(3), id(700)]);
        // The iterator can be restarted
        assert_eq!(sparse.iter().count(), 2);

        let dense = SolvMap::full(130);
        assert_eq!(dense.count(), 130);
        assert_eq!(dense.iter().last(), Some(id(129)));
        assert!(!dense.contains(id(130)));

        assert_eq!(SolvMap::new(0).iter().next(), None);
        assert!(SolvMap::new(64).is_empty());
    }

    #[test]
    fn test_retain() {
        let (mut map1, _) = maps();
        map1.retain(|id| id.index() % 2 == 0 && id.index() > 0);
        assert_eq!(map1.iter().collect::<Vec<_>>(), [2, 28, 30].map(id));
    }

    fn arb_map() -> impl Strategy<Value = SolvMap> {
        proptest::collection::vec(0u32..200, 0..50).prop_map(|ids| {
            let mut map = SolvMap::new(200);
            for i in ids {
                map.add(id(i)).unwrap();
            }
            map
        })
    }

    proptest! {
        #[test]
        fn test_union_contains(a in arb_map(), b in arb_map(), x in 0u32..200) {
            let mut union = a.clone();
            union.union(&b);
            prop_assert_eq!(union.contains(id(x)), a.contains(id(x)) || b.contains(id(x)));
        }

        #[test]
        fn test_intersection_commutes(a in arb_map(), b in arb_map()) {
            let mut ab = a.clone();
            ab.intersect(&b);
            let mut ba = b.clone();
            ba.intersect(&a);
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn test_difference_with_self_is_empty(a in arb_map()) {
            let mut diff = a.clone();
            diff.difference(&a);
            prop_assert!(diff.is_empty());
        }

        #[test]
        fn test_iter_is_sorted(a in arb_map()) {
            let ids = a.iter().collect::<Vec<_>>();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(ids.len(), a.count());
        }
    }
}
