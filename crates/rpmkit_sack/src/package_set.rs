use std::ops::{BitAndAssign, BitOrAssign, SubAssign};

use thiserror::Error;

use crate::{
    package::Package,
    pool::{PoolError, PoolRef},
    solv_map::{SolvMap, SolvMapError},
    PackageId,
};

/// Errors returned by [`PackageSet`] operations.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum PackageSetError {
    /// The operands belong to different pools.
    #[error("the packages belong to different pools")]
    IncompatiblePool,

    /// The id does not fit into the set.
    #[error(transparent)]
    OutOfRange(#[from] SolvMapError),

    /// The pool of the set no longer exists.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// A set of packages of a single pool, backed by a [`SolvMap`].
#[derive(Debug, Clone)]
pub struct PackageSet {
    pool: PoolRef,
    map: SolvMap,
}

impl PackageSet {
    /// Creates an empty set sized to the current number of packages in the pool.
    pub fn new(pool: &PoolRef) -> Result<Self, PoolError> {
        let package_count = pool.upgrade()?.package_count();
        Ok(Self::from_map(pool.clone(), SolvMap::new(package_count)))
    }

    pub(crate) fn from_map(pool: PoolRef, map: SolvMap) -> Self {
        Self { pool, map }
    }

    /// The pool the set belongs to.
    pub fn pool(&self) -> &PoolRef {
        &self.pool
    }

    /// The underlying bitmap.
    pub fn map(&self) -> &SolvMap {
        &self.map
    }

    /// Adds a package. Fails if it belongs to another pool.
    pub fn add(&mut self, package: &Package) -> Result<(), PackageSetError> {
        if !self.pool.same_pool(package.pool()) {
            return Err(PackageSetError::IncompatiblePool);
        }
        self.add_id(package.id())
    }

    /// Adds a package by id.
    pub fn add_id(&mut self, id: PackageId) -> Result<(), PackageSetError> {
        Ok(self.map.add(id)?)
    }

    /// Removes a package by id.
    pub fn remove(&mut self, id: PackageId) -> Result<(), PackageSetError> {
        Ok(self.map.remove(id)?)
    }

    /// Returns true if the package is in the set.
    pub fn contains(&self, id: PackageId) -> bool {
        self.map.contains(id)
    }

    /// The number of packages in the set.
    pub fn len(&self) -> usize {
        self.map.count()
    }

    /// Returns true if the set holds no package.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over the ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.map.iter()
    }

    /// Iterates over the packages in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = Package> + '_ {
        self.map
            .iter()
            .map(|id| Package::from_parts(self.pool.clone(), id))
    }

    fn check_pool(&self, other: &PackageSet) -> Result<(), PackageSetError> {
        if self.pool.same_pool(&other.pool) {
            Ok(())
        } else {
            Err(PackageSetError::IncompatiblePool)
        }
    }

    /// Adds every package of `other`.
    pub fn union(&mut self, other: &PackageSet) -> Result<&mut Self, PackageSetError> {
        self.check_pool(other)?;
        self.map.union(&other.map);
        Ok(self)
    }

    /// Keeps only the packages that are also in `other`.
    pub fn intersection(&mut self, other: &PackageSet) -> Result<&mut Self, PackageSetError> {
        self.check_pool(other)?;
        self.map.intersect(&other.map);
        Ok(self)
    }

    /// Removes every package of `other`.
    pub fn difference(&mut self, other: &PackageSet) -> Result<&mut Self, PackageSetError> {
        self.check_pool(other)?;
        self.map.difference(&other.map);
        Ok(self)
    }
}

impl PartialEq for PackageSet {
    fn eq(&self, other: &Self) -> bool {
        self.pool.same_pool(&other.pool) && self.map.iter().eq(other.map.iter())
    }
}

impl BitOrAssign<&PackageSet> for PackageSet {
    fn bitor_assign(&mut self, rhs: &PackageSet) {
        self.union(rhs)
            .expect("cannot combine package sets of different pools");
    }
}

impl BitAndAssign<&PackageSet> for PackageSet {
    fn bitand_assign(&mut self, rhs: &PackageSet) {
        self.intersection(rhs)
            .expect("cannot combine package sets of different pools");
    }
}

impl SubAssign<&PackageSet> for PackageSet {
    fn sub_assign(&mut self, rhs: &PackageSet) {
        self.difference(rhs)
            .expect("cannot combine package sets of different pools");
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;
    use crate::Pool;

    fn set(pool: &PoolRef, capacity: usize, ids: &[u32]) -> PackageSet {
        let mut map = SolvMap::new(capacity);
        for &id in ids {
            map.add(PackageId::new(id)).unwrap();
        }
        PackageSet::from_map(pool.clone(), map)
    }

    #[test]
    fn test_set_algebra() {
        let pool = Arc::new(Pool::new());
        let pool_ref = PoolRef::from(&pool);
        let a = set(&pool_ref, 16, &[1, 2, 3]);
        let b = set(&pool_ref, 16, &[3, 4]);

        let mut union = a.clone();
        union |= &b;
        assert_eq!(union.ids().map(PackageId::index).collect::<Vec<_>>(), [1, 2, 3, 4]);

        let mut intersection = a.clone();
        intersection.intersection(&b).unwrap();
        assert_eq!(intersection.len(), 1);
        assert!(intersection.contains(PackageId::new(3)));

        let mut difference = a.clone();
        difference -= &a;
        assert!(difference.is_empty());
    }

    #[test]
    fn test_incompatible_pool() {
        let pool1 = Arc::new(Pool::new());
        let pool2 = Arc::new(Pool::new());
        let mut a = set(&PoolRef::from(&pool1), 8, &[1]);
        let b = set(&PoolRef::from(&pool2), 8, &[1]);
        assert_matches!(a.union(&b), Err(PackageSetError::IncompatiblePool));
        assert_matches!(a.difference(&b), Err(PackageSetError::IncompatiblePool));
        assert_ne!(a, b);
    }

    #[test]
    #[should_panic(expected = "different pools")]
    fn test_operator_panics_on_pool_mismatch() {
        let pool1 = Arc::new(Pool::new());
        let pool2 = Arc::new(Pool::new());
        let mut a = set(&PoolRef::from(&pool1), 8, &[1]);
        a &= &set(&PoolRef::from(&pool2), 8, &[1]);
    }

    #[test]
    fn test_out_of_range() {
        let pool = Arc::new(Pool::new());
        let mut a = PackageSet::new(&PoolRef::from(&pool)).unwrap();
        assert_matches!(
            a.add_id(PackageId::new(0)),
            Err(PackageSetError::OutOfRange(_))
        );
    }
}
