use indexmap::IndexSet;
use rpmkit_types::{ParsedReldep, QueryCmp, StringMatcher};

use crate::{
    pool::{PoolError, PoolRef, ReldepData},
    reldep::{Reldep, ReldepError},
    ReldepId,
};

/// An ordered list of dependencies of a single pool. Duplicates are allowed.
#[derive(Debug, Clone)]
pub struct ReldepList {
    pool: PoolRef,
    ids: Vec<ReldepId>,
}

impl ReldepList {
    /// Creates an empty list.
    pub fn new(pool: &PoolRef) -> Self {
        Self::from_ids(pool.clone(), Vec::new())
    }

    pub(crate) fn from_ids(pool: PoolRef, ids: Vec<ReldepId>) -> Self {
        Self { pool, ids }
    }

    /// The pool the dependencies belong to.
    pub fn pool(&self) -> &PoolRef {
        &self.pool
    }

    /// Appends a dependency.
    ///
    /// Panics if the dependency belongs to another pool.
    pub fn add(&mut self, reldep: &Reldep) {
        assert!(
            self.pool.same_pool(reldep.pool()),
            "cannot add a dependency of a different pool"
        );
        self.ids.push(reldep.id());
    }

    /// Appends a dependency by id.
    pub fn add_id(&mut self, id: ReldepId) {
        self.ids.push(id);
    }

    /// Parses, interns and appends a dependency string.
    pub fn add_reldep(&mut self, reldep: &str) -> Result<(), ReldepError> {
        let reldep = Reldep::parse(&self.pool, reldep)?;
        self.ids.push(reldep.id());
        Ok(())
    }

    /// Appends every provide of the pool whose name matches the glob in `pattern`.
    ///
    /// The pattern may carry a version range, `dwm* >= 6.0`, in which case a dependency with that
    /// range is appended for every matching provide name instead. Returns false if nothing
    /// matched.
    pub fn add_reldep_with_glob(&mut self, pattern: &str) -> Result<bool, ReldepError> {
        let parsed: ParsedReldep = pattern.parse()?;
        let matcher = StringMatcher::new(QueryCmp::Glob, &parsed.name)?;
        let pool = self.pool.upgrade()?;

        let mut found = IndexSet::new();
        for (_, provide) in pool.all_provides() {
            let data = pool.reldep(provide)?;
            if !matcher.matches(&pool.str(data.name)) {
                continue;
            }
            let id = match (parsed.op, &parsed.version) {
                (Some(op), Some(version)) => pool.intern_reldep(ReldepData {
                    name: data.name,
                    op: Some(op),
                    evr: Some(pool.intern(version)),
                    rich: false,
                }),
                _ => provide,
            };
            found.insert(id);
        }

        self.ids.extend(found.iter().copied());
        Ok(!found.is_empty())
    }

    /// Returns the dependency at `index`.
    pub fn get(&self, index: usize) -> Option<Reldep> {
        self.get_id(index)
            .map(|id| Reldep::from_parts(self.pool.clone(), id))
    }

    /// Returns the id of the dependency at `index`.
    pub fn get_id(&self, index: usize) -> Option<ReldepId> {
        self.ids.get(index).copied()
    }

    /// The ids in insertion order.
    pub fn ids(&self) -> &[ReldepId] {
        &self.ids
    }

    /// The number of dependencies.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Appends every dependency of `other`.
    ///
    /// Panics if the lists belong to different pools.
    pub fn append(&mut self, other: &ReldepList) {
        assert!(
            self.pool.same_pool(&other.pool),
            "cannot append dependencies of a different pool"
        );
        self.ids.extend_from_slice(&other.ids);
    }

    /// Iterates over the dependencies in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Reldep> + '_ {
        self.ids
            .iter()
            .map(|&id| Reldep::from_parts(self.pool.clone(), id))
    }

    /// Formats every dependency.
    pub fn to_strings(&self) -> Result<Vec<String>, PoolError> {
        let pool = self.pool.upgrade()?;
        self.ids.iter().map(|&id| pool.reldep_to_string(id)).collect()
    }
}

impl PartialEq for ReldepList {
    fn eq(&self, other: &Self) -> bool {
        self.pool.same_pool(&other.pool) && self.ids == other.ids
    }
}

impl Eq for ReldepList {}
