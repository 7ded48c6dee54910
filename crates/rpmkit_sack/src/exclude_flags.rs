use std::ops::{BitOr, BitOrAssign};

/// Selects which of the globally configured excludes a [`crate::Query`] hides.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ExcludeFlags(u8);

impl ExcludeFlags {
    /// Hide every excluded package.
    pub const APPLY_EXCLUDES: Self = Self(0);
    /// Show packages hidden by module excludes.
    pub const IGNORE_MODULAR_EXCLUDES: Self = Self(1 << 0);
    /// Show packages hidden by `excludepkgs`, `includepkgs` and user excludes.
    pub const IGNORE_REGULAR_EXCLUDES: Self = Self(1 << 1);
    /// Show every package.
    pub const IGNORE_EXCLUDES: Self = Self(Self::IGNORE_MODULAR_EXCLUDES.0 | Self::IGNORE_REGULAR_EXCLUDES.0);

    /// The raw bits.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ExcludeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ExcludeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_combine() {
        let flags = ExcludeFlags::IGNORE_MODULAR_EXCLUDES | ExcludeFlags::IGNORE_REGULAR_EXCLUDES;
        assert_eq!(flags, ExcludeFlags::IGNORE_EXCLUDES);
        assert!(flags.contains(ExcludeFlags::IGNORE_REGULAR_EXCLUDES));
        assert!(!ExcludeFlags::APPLY_EXCLUDES.contains(ExcludeFlags::IGNORE_MODULAR_EXCLUDES));
        assert!(ExcludeFlags::default().contains(ExcludeFlags::APPLY_EXCLUDES));
    }
}
