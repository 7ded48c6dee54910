//! Package coordinates: name, epoch, version, release and architecture.

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
};

use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumIter, EnumString};
use thiserror::Error;

use crate::evr::{rpmvercmp, EvrCmpMode, EvrRef};

/// The shape of a (possibly partial) NEVRA string.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, StrumDisplay, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum NevraForm {
    /// `name-[epoch:]version-release.arch`
    Nevra,
    /// `name-[epoch:]version-release`
    Nevr,
    /// `name-[epoch:]version`
    Nev,
    /// `name.arch`
    Na,
    /// `name`
    Name,
}

impl NevraForm {
    /// The order in which forms are tried when a user spec is resolved.
    pub const DEFAULT_ORDER: [NevraForm; 5] = [
        NevraForm::Nevra,
        NevraForm::Nevr,
        NevraForm::Nev,
        NevraForm::Na,
        NevraForm::Name,
    ];
}

/// A package coordinate. Every part but the name is optional so that partial specifications like
/// `wget-1.19.5` can be represented.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Nevra {
    /// The package name.
    pub name: String,

    /// The epoch. `None` means "not specified", which is different from epoch `0`.
    pub epoch: Option<u64>,

    /// The version.
    pub version: Option<String>,

    /// The release.
    pub release: Option<String>,

    /// The architecture.
    pub arch: Option<String>,
}

/// An error that can occur when parsing a [`Nevra`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("'{input}' is not a valid {form} string")]
pub struct ParseNevraError {
    /// The string that failed to parse.
    pub input: String,
    /// The form it was parsed as.
    pub form: NevraForm,
}

impl Nevra {
    /// Parses `input` according to `form`.
    ///
    /// ```
    /// # use rpmkit_types::{Nevra, NevraForm};
    /// let nevra = Nevra::parse("wget-1:1.19.5-5.fc29.x86_64", NevraForm::Nevra).unwrap();
    /// assert_eq!(nevra.name, "wget");
    /// assert_eq!(nevra.epoch, Some(1));
    /// assert_eq!(nevra.arch.as_deref(), Some("x86_64"));
    /// ```
    pub fn parse(input: &str, form: NevraForm) -> Result<Self, ParseNevraError> {
        let err = || ParseNevraError {
            input: input.to_owned(),
            form,
        };
        if input.is_empty() || input.contains(char::is_whitespace) {
            return Err(err());
        }

        // An epoch may also be given in front of the whole string: `1:wget-1.0-1.x86_64`.
        let (leading_epoch, rest) = split_leading_epoch(input);

        let (rest, arch) = match form {
            NevraForm::Nevra | NevraForm::Na => {
                let (rest, arch) = rest.rsplit_once('.').ok_or_else(err)?;
                if arch.is_empty() || arch.contains('-') {
                    return Err(err());
                }
                (rest, Some(arch))
            }
            _ => (rest, None),
        };

        let (rest, release) = match form {
            NevraForm::Nevra | NevraForm::Nevr => {
                let (rest, release) = rest.rsplit_once('-').ok_or_else(err)?;
                if release.is_empty() {
                    return Err(err());
                }
                (rest, Some(release))
            }
            _ => (rest, None),
        };

        let (name, epoch, version) = match form {
            NevraForm::Nevra | NevraForm::Nevr | NevraForm::Nev => {
                let (name, ev) = rest.rsplit_once('-').ok_or_else(err)?;
                let (epoch, version) = match ev.split_once(':') {
                    Some((epoch, version)) => {
                        if leading_epoch.is_some() {
                            return Err(err());
                        }
                        (Some(epoch.parse::<u64>().map_err(|_| err())?), version)
                    }
                    None => (leading_epoch, ev),
                };
                if version.is_empty() {
                    return Err(err());
                }
                (name, epoch, Some(version))
            }
            NevraForm::Na | NevraForm::Name => {
                if leading_epoch.is_some() {
                    return Err(err());
                }
                (rest, None, None)
            }
        };

        if name.is_empty() || name.contains(':') {
            return Err(err());
        }

        Ok(Self {
            name: name.to_owned(),
            epoch,
            version: version.map(str::to_owned),
            release: release.map(str::to_owned),
            arch: arch.map(str::to_owned),
        })
    }

    /// Returns true if only the name is set.
    pub fn has_just_name(&self) -> bool {
        self.epoch.is_none() && self.version.is_none() && self.release.is_none() && self.arch.is_none()
    }

    /// Returns `[epoch:]version[-release]`, or `None` if there is no version.
    pub fn evr(&self) -> Option<String> {
        let version = self.version.as_deref()?;
        let mut evr = String::new();
        if let Some(epoch) = self.epoch {
            evr.push_str(&epoch.to_string());
            evr.push(':');
        }
        evr.push_str(version);
        if let Some(release) = &self.release {
            evr.push('-');
            evr.push_str(release);
        }
        Some(evr)
    }

    /// Formats the coordinate with an explicit epoch, `0` when none is set.
    pub fn to_full_string(&self) -> String {
        let mut result = self.name.clone();
        if let Some(version) = &self.version {
            result.push_str(&format!("-{}:{version}", self.epoch.unwrap_or(0)));
        }
        if let Some(release) = &self.release {
            result.push('-');
            result.push_str(release);
        }
        if let Some(arch) = &self.arch {
            result.push('.');
            result.push_str(arch);
        }
        result
    }

    /// Orders by name, then by EVR, then by architecture.
    pub fn compare(&self, other: &Nevra) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| {
                let epoch = |n: &Nevra| n.epoch.map(|e| e.to_string());
                let (a_epoch, b_epoch) = (epoch(self), epoch(other));
                let a = EvrRef {
                    epoch: a_epoch.as_deref(),
                    version: self.version.as_deref().unwrap_or_default(),
                    release: self.release.as_deref(),
                };
                let b = EvrRef {
                    epoch: b_epoch.as_deref(),
                    version: other.version.as_deref().unwrap_or_default(),
                    release: other.release.as_deref(),
                };
                a.compare(&b, EvrCmpMode::Compare)
            })
            .then_with(|| {
                rpmvercmp(
                    self.arch.as_deref().unwrap_or_default(),
                    other.arch.as_deref().unwrap_or_default(),
                )
            })
    }
}

fn split_leading_epoch(input: &str) -> (Option<u64>, &str) {
    if let Some((epoch, rest)) = input.split_once(':') {
        if !epoch.contains('-') {
            if let Ok(epoch) = epoch.parse::<u64>() {
                return (Some(epoch), rest);
            }
        }
    }
    (None, input)
}

impl Display for Nevra {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(evr) = self.evr() {
            write!(f, "-{evr}")?;
        }
        if let Some(arch) = &self.arch {
            write!(f, ".{arch}")?;
        }
        Ok(())
    }
}
