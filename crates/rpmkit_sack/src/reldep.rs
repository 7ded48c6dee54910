use std::fmt::{Display, Formatter};

use rpmkit_types::{ParseReldepError, ParsedReldep, RelOperator, StringMatcherParseError};
use thiserror::Error;

use crate::{
    pool::{PoolError, PoolRef, ReldepData},
    ReldepId,
};

/// Errors that can occur when creating dependencies.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ReldepError {
    /// The dependency string is malformed.
    #[error(transparent)]
    Parse(#[from] ParseReldepError),

    /// The name pattern is not a valid glob.
    #[error(transparent)]
    Pattern(#[from] StringMatcherParseError),

    /// The pool no longer exists.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// A handle to a relational dependency interned in a pool.
#[derive(Debug, Clone)]
pub struct Reldep {
    pool: PoolRef,
    id: ReldepId,
}

impl Reldep {
    /// Parses and interns a dependency string like `glibc >= 2.28`.
    pub fn parse(pool: &PoolRef, reldep: &str) -> Result<Self, ReldepError> {
        let parsed: ParsedReldep = reldep.parse()?;
        let id = pool.upgrade()?.intern_parsed_reldep(&parsed);
        Ok(Self::from_parts(pool.clone(), id))
    }

    /// Interns a dependency from its parts.
    pub fn new(
        pool: &PoolRef,
        name: &str,
        relation: Option<(RelOperator, &str)>,
    ) -> Result<Self, PoolError> {
        let strong = pool.upgrade()?;
        let id = strong.intern_reldep(ReldepData {
            name: strong.intern(name),
            op: relation.map(|(op, _)| op),
            evr: relation.map(|(_, evr)| strong.intern(evr)),
            rich: false,
        });
        Ok(Self::from_parts(pool.clone(), id))
    }

    /// Creates a handle for an existing id.
    pub fn from_id(pool: &PoolRef, id: ReldepId) -> Result<Self, PoolError> {
        pool.upgrade()?.reldep(id)?;
        Ok(Self::from_parts(pool.clone(), id))
    }

    pub(crate) fn from_parts(pool: PoolRef, id: ReldepId) -> Self {
        Self { pool, id }
    }

    /// The interned id.
    pub fn id(&self) -> ReldepId {
        self.id
    }

    /// The pool the dependency belongs to.
    pub fn pool(&self) -> &PoolRef {
        &self.pool
    }

    /// The dependency name. For rich dependencies the complete expression.
    pub fn name(&self) -> Result<String, PoolError> {
        let pool = self.pool.upgrade()?;
        Ok(pool.resolve(pool.reldep(self.id)?.name)?.to_string())
    }

    /// The comparison operator, `None` for unversioned dependencies.
    pub fn relation(&self) -> Result<Option<RelOperator>, PoolError> {
        Ok(self.pool.upgrade()?.reldep(self.id)?.op)
    }

    /// The version the operator refers to.
    pub fn version(&self) -> Result<Option<String>, PoolError> {
        let pool = self.pool.upgrade()?;
        pool.reldep(self.id)?
            .evr
            .map(|evr| pool.resolve(evr).map(|evr| evr.to_string()))
            .transpose()
    }

    /// Returns true for boolean dependencies like `(a if b)`.
    pub fn is_rich(&self) -> Result<bool, PoolError> {
        Ok(self.pool.upgrade()?.reldep(self.id)?.rich)
    }
}

impl PartialEq for Reldep {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.pool.same_pool(&other.pool)
    }
}

impl Eq for Reldep {}

impl Display for Reldep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self
            .pool
            .upgrade()
            .and_then(|pool| pool.reldep_to_string(self.id))
        {
            Ok(reldep) => f.write_str(&reldep),
            Err(_) => write!(f, "<reldep {} of a dropped pool>", self.id.value()),
        }
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;

    use super::*;
    use crate::test_utils::sack_with;

    #[test]
    fn test_parse() {
        let sack = sack_with(&[]);
        let pool = sack.pool_ref();
        let reldep = Reldep::parse(&pool, "python3-dnf>=4.0").unwrap();
        assert_eq!(reldep.name().unwrap(), "python3-dnf");
        assert_eq!(reldep.relation().unwrap(), Some(RelOperator::Ge));
        assert_eq!(reldep.version().unwrap().as_deref(), Some("4.0"));
        assert_eq!(reldep.to_string(), "python3-dnf >= 4.0");

        let same = Reldep::new(&pool, "python3-dnf", Some((RelOperator::Ge, "4.0"))).unwrap();
        assert_eq!(reldep, same);
        assert_eq!(reldep.id(), same.id());
    }

    #[test]
    fn test_rich() {
        let sack = sack_with(&[]);
        let reldep = Reldep::parse(&sack.pool_ref(), "(foo if bar)").unwrap();
        assert!(reldep.is_rich().unwrap());
        assert_eq!(reldep.relation().unwrap(), None);
        assert_eq!(reldep.to_string(), "(foo if bar)");
    }

    #[test]
    fn test_errors() {
        let mut sack = sack_with(&[]);
        let pool = sack.pool_ref();
        assert_matches!(Reldep::parse(&pool, "foo =< 1"), Err(ReldepError::Parse(_)));
        assert_matches!(
            Reldep::from_id(&pool, ReldepId::new(1000)),
            Err(PoolError::InvalidId(1000))
        );

        let reldep = Reldep::parse(&pool, "foo").unwrap();
        sack.reset();
        assert_matches!(reldep.name(), Err(PoolError::PoolDropped));
        assert_matches!(
            Reldep::parse(&pool, "foo"),
            Err(ReldepError::Pool(PoolError::PoolDropped))
        );
    }
}
