use rpmkit_types::{is_glob_pattern, Nevra, NevraForm, QueryCmp};

use super::{DepPatterns, Filter, Query, QueryError, QueryState};
use crate::{pool::DepKind, solv_map::SolvMap};

/// Controls how [`Query::resolve_pkg_spec`] interprets a package spec.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResolveSpecSettings {
    /// Try to parse the spec as a NEVRA in one of `forms`.
    pub with_nevra: bool,
    /// Try to match the spec against provides.
    pub with_provides: bool,
    /// Try to match specs starting with `/` against files.
    pub with_filenames: bool,
    /// Match names case-insensitively.
    pub icase: bool,
    /// The NEVRA forms to try, in order.
    pub forms: Vec<NevraForm>,
}

impl Default for ResolveSpecSettings {
    fn default() -> Self {
        Self {
            with_nevra: true,
            with_provides: true,
            with_filenames: true,
            icase: false,
            forms: NevraForm::DEFAULT_ORDER.to_vec(),
        }
    }
}

impl Query {
    /// Narrows the query to the packages selected by a user supplied spec like `wget`,
    /// `wget-1.19.5`, `wget.x86_64`, `webserver` or `/usr/bin/wget`.
    ///
    /// The spec is tried as a NEVRA in each of the configured forms, then as a provide, then as a
    /// file path. The first interpretation that selects anything wins. Returns whether something
    /// was found and, if a NEVRA form matched, the parsed NEVRA. When nothing matches the query
    /// is left empty.
    pub fn resolve_pkg_spec(
        &mut self,
        spec: &str,
        settings: &ResolveSpecSettings,
    ) -> Result<(bool, Option<Nevra>), QueryError> {
        let current = self.result()?.clone();
        let glob = is_glob_pattern(spec);
        let value_cmp = if glob { QueryCmp::Glob } else { QueryCmp::Eq };
        let name_cmp = match (glob, settings.icase) {
            (true, true) => QueryCmp::IGlob,
            (true, false) => QueryCmp::Glob,
            (false, true) => QueryCmp::IExact,
            (false, false) => QueryCmp::Eq,
        };

        if settings.with_nevra {
            for &form in &settings.forms {
                let Ok(nevra) = Nevra::parse(spec, form) else {
                    continue;
                };
                let mut candidate = self.narrowed(current.clone());
                candidate.filter(Filter::Name(name_cmp, vec![nevra.name.clone()]))?;
                if let Some(epoch) = nevra.epoch {
                    candidate.filter(Filter::Epoch(QueryCmp::Eq, vec![epoch]))?;
                }
                if let Some(version) = &nevra.version {
                    candidate.filter(Filter::Version(value_cmp, vec![version.clone()]))?;
                }
                if let Some(release) = &nevra.release {
                    candidate.filter(Filter::Release(value_cmp, vec![release.clone()]))?;
                }
                if let Some(arch) = &nevra.arch {
                    candidate.filter(Filter::Arch(value_cmp, vec![arch.clone()]))?;
                }
                if !candidate.is_empty()? {
                    tracing::debug!("resolved '{spec}' as {form}");
                    *self = candidate;
                    return Ok((true, Some(nevra)));
                }
            }
        }

        if settings.with_provides {
            let cmp = match (glob, settings.icase) {
                (true, true) => QueryCmp::IGlob,
                (true, false) => QueryCmp::Glob,
                (false, _) => QueryCmp::Eq,
            };
            let mut candidate = self.narrowed(current.clone());
            match candidate.filter(Filter::Dependency(
                DepKind::Provides,
                cmp,
                DepPatterns::Strings(vec![spec.to_owned()]),
            )) {
                Ok(_) => {
                    if !candidate.is_empty()? {
                        tracing::debug!("resolved '{spec}' as a provide");
                        *self = candidate;
                        return Ok((true, None));
                    }
                }
                // Not every spec is a valid dependency
                Err(QueryError::Reldep(_)) => {}
                Err(err) => return Err(err),
            }
        }

        if settings.with_filenames && spec.starts_with('/') {
            let mut candidate = self.narrowed(current.clone());
            candidate.filter(Filter::File(value_cmp, vec![spec.to_owned()]))?;
            if !candidate.is_empty()? {
                tracing::debug!("resolved '{spec}' as a file");
                *self = candidate;
                return Ok((true, None));
            }
        }

        self.state = QueryState::Applied(SolvMap::new(current.capacity()));
        Ok((false, None))
    }
}
