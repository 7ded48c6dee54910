use std::fmt::{Display, Formatter};

/// The id of a package within a [`crate::Pool`]. Ids are assigned in load order starting at `0`
/// and are never reused while the pool is alive.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PackageId(u32);

impl PackageId {
    /// Creates an id from its raw value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// The position of the package in the pool.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

impl Display for PackageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The id of an interned string. `0` never refers to a string.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct StringId(u32);

impl StringId {
    /// Creates an id from its raw value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw value.
    pub fn value(self) -> u32 {
        self.0
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }

    pub(crate) fn to_index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

/// The id of an interned relational dependency. Identical dependencies share an id.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ReldepId(u32);

impl ReldepId {
    /// Creates an id from its raw value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw value.
    pub fn value(self) -> u32 {
        self.0
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The id of a repository within a pool.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RepoId(u32);

impl RepoId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// The position of the repository in load order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
