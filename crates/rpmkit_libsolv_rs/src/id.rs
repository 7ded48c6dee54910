use crate::arena::ArenaId;

/// The id of a package name. Solvables that share a name may not be installed together unless
/// the provider allows multiple instances.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct NameId(u32);

impl NameId {
    /// Creates a name id from a raw value chosen by the provider.
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// The id of a dependency, chosen by the provider. Only used to report problems.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct DependencyId(u32);

impl DependencyId {
    /// Creates a dependency id from a raw value chosen by the provider.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw value.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// The id associated to a solvable.
///
/// `SolvableId(0)` is the root solvable that the jobs hang off. The provider's solvables are
/// numbered from `1`.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
pub struct SolvableId(u32);

impl SolvableId {
    /// Creates a solvable id. `0` is reserved for the root.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw value.
    pub fn index(self) -> u32 {
        self.0
    }

    pub(crate) fn root() -> Self {
        Self(0)
    }

    pub(crate) fn is_root(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn null() -> Self {
        Self(u32::MAX)
    }

    pub(crate) fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl ArenaId for SolvableId {
    fn from_usize(x: usize) -> Self {
        Self(x as u32)
    }

    fn to_usize(self) -> usize {
        self.0 as usize
    }
}

/// Identifies a job within [`crate::SolveJobs`].
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
pub struct JobId(u32);

impl JobId {
    /// The position of the job in the order it was added.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ArenaId for JobId {
    fn from_usize(x: usize) -> Self {
        Self(x as u32)
    }

    fn to_usize(self) -> usize {
        self.0 as usize
    }
}

#[repr(transparent)]
#[derive(Copy, Clone, PartialOrd, Ord, Eq, PartialEq, Debug, Hash)]
pub(crate) struct ClauseId(u32);

impl ClauseId {
    /// There is a guarentee that ClauseId(0) will always be "Clause::InstallRoot". This assumption
    /// is verified by the solver.
    pub(crate) fn install_root() -> Self {
        Self(0)
    }

    pub(crate) fn is_null(self) -> bool {
        self.0 == u32::MAX
    }

    pub(crate) fn null() -> ClauseId {
        ClauseId(u32::MAX)
    }
}

impl ArenaId for ClauseId {
    fn from_usize(x: usize) -> Self {
        assert!(x < u32::MAX as usize, "clause id too big");
        Self(x as u32)
    }

    fn to_usize(self) -> usize {
        self.0 as usize
    }
}

#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct LearntClauseId(u32);

impl ArenaId for LearntClauseId {
    fn from_usize(x: usize) -> Self {
        Self(x as u32)
    }

    fn to_usize(self) -> usize {
        self.0 as usize
    }
}

/// The id of a requirement: a list of candidates one of which must be installed.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct RequirementId(u32);

impl ArenaId for RequirementId {
    fn from_usize(x: usize) -> Self {
        Self(x as u32)
    }

    fn to_usize(self) -> usize {
        self.0 as usize
    }
}
