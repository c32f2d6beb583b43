// SPDX-License-Identifier: MIT

//! Semantic versions and constraints

use super::{parse_parts, Constraint, Grammar, Prerelease};
use crate::error::VersionError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// `major.minor.patch[-prerelease][+build]`, with an optional leading `v`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Prerelease,
    pub build: String,
}

impl SemanticVersion {
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let parts = parse_parts(Grammar::Semantic, text)
            .ok_or_else(|| VersionError::InvalidVersion(text.to_string()))?;
        let segment = |i: usize| parts.core[i].max(0) as u64;
        Ok(Self {
            major: segment(0),
            minor: segment(1),
            patch: segment(2),
            prerelease: parts.prerelease.clone(),
            build: parts.build.clone(),
        })
    }

    pub fn is_stable(&self) -> bool {
        self.prerelease.is_stable()
    }

    pub(crate) fn core(&self) -> [i64; 3] {
        [self.major as i64, self.minor as i64, self.patch as i64]
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Ord for SemanticVersion {
    /// Build metadata does not take part in ordering
    fn cmp(&self, other: &Self) -> Ordering {
        self.core()
            .cmp(&other.core())
            .then_with(|| self.prerelease.cmp(&other.prerelease))
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.prerelease.is_stable() {
            write!(f, "-{}", self.prerelease)?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build)?;
        }
        Ok(())
    }
}

/// A semantic version range such as `>=1.2.0 <2.0.0 || ^3.1.0`
#[derive(Debug, Clone)]
pub struct SemverConstraint {
    inner: Constraint,
}

impl SemverConstraint {
    pub fn parse(text: &str, include_prerelease: bool) -> Result<Self, VersionError> {
        Ok(Self {
            inner: Constraint::parse(Grammar::Semantic, text, include_prerelease)?,
        })
    }

    pub fn accepts(&self, version: &SemanticVersion) -> bool {
        self.inner.accepts(version.core(), &version.prerelease)
    }
}

impl fmt::Display for SemverConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        SemanticVersion::parse(s).unwrap()
    }

    fn c(s: &str) -> SemverConstraint {
        SemverConstraint::parse(s, false).unwrap()
    }

    #[test]
    fn test_parse_version() {
        let version = v("1.2.3-alpha.3+7223b39");
        assert_eq!((version.major, version.minor, version.patch), (1, 2, 3));
        assert_eq!(version.prerelease.as_str(), "alpha.3");
        assert_eq!(version.build, "7223b39");

        let version = v("v1.2.3+7223b39");
        assert_eq!(version.patch, 3);
        assert!(version.is_stable());
        assert_eq!(v("1.2").patch, 0);
    }

    #[test]
    fn test_parse_invalid_versions() {
        for text in ["", "1.2.3-", "1.2.3-0123", "abc", "1.2.3 extra", "1.2.3.4.5"] {
            assert!(SemanticVersion::parse(text).is_err(), "{}", text);
        }
        assert!(SemanticVersion::parse("1.2.3-0").is_ok());
        assert!(SemanticVersion::parse("1.2.3-0A").is_ok());
    }

    #[test]
    fn test_version_ordering() {
        assert!(v("1.0.0") < v("1.2.0"));
        assert!(v("1.2.0") < v("10.0.0"));
        assert!(v("1.0.2") < v("1.2.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0"));
        assert_eq!(v("1.0.0+a").cmp(&v("1.0.0+b")), Ordering::Equal);
    }

    #[test]
    fn test_constraint_matrix() {
        let versions = [v("1.2.3"), v("1.2.3-alpha.3+7223b39"), v("3.4.5-alpha.9"), v("3.4.5")];
        let cases: [(SemverConstraint, [bool; 4]); 21] = [
            (c("1.2.3"), [true, false, false, false]),
            (c("1.2.3-alpha.3"), [false, true, false, false]),
            (c(">1.2.3-alpha.3"), [true, false, false, true]),
            (c(">1.2.3-alpha.1"), [true, true, false, true]),
            (c("<1.2.3-beta"), [false, true, false, false]),
            (c("^1.2.3-alpha"), [true, true, false, false]),
            (c("<3.4.6"), [true, false, false, true]),
            (c("=v1.2.3"), [true, false, false, false]),
            (c(">=v1.2.3"), [true, false, false, true]),
            (c(">=v1.2.3-0"), [true, true, false, true]),
            (c("<3.4.5"), [true, false, false, false]),
            (c("<3.4.5-9999999999"), [true, false, false, false]),
            (c("^1.0.0"), [true, false, false, false]),
            (c("<1.2.3-0"), [false, false, false, false]),
            (c("1.2.3|| >=3.4.5-0 3.4.5"), [true, false, false, true]),
            (c("1.2.3 ||>=3.4.5-0 || 3.4.5"), [true, false, true, true]),
            (c("1.2.3||3.4.5"), [true, false, false, true]),
            (SemverConstraint::parse(">=1.2.3", true).unwrap(), [true, false, true, true]),
            (SemverConstraint::parse("<=3.4.5-0", true).unwrap(), [true, true, false, false]),
            (c("@pre >=1.2.3"), [true, false, true, true]),
            (c("@prerelease <=3.4.5-0"), [true, true, false, false]),
        ];
        for (constraint, expected) in cases.iter() {
            for (version, expected) in versions.iter().zip(expected.iter()) {
                assert_eq!(
                    constraint.accepts(version),
                    *expected,
                    "{} accepts {}",
                    constraint,
                    version
                );
            }
        }
    }

    #[test]
    fn test_caret_and_tilde() {
        let version = v("1.2.3");
        assert!(c("^1.2.2").accepts(&version));
        assert!(c("^1.1.3").accepts(&version));
        assert!(!c("^1.3.3").accepts(&version));
        assert!(!c("^0.2.3").accepts(&version));

        assert!(c("~1.2.0").accepts(&version));
        assert!(!c("~1.1.0").accepts(&version));
        assert!(!c("~1.2.4").accepts(&version));
    }

    #[test]
    fn test_wildcards() {
        assert!(c("1.x").accepts(&v("1.9.0")));
        assert!(c("1.2.*").accepts(&v("1.2.7")));
        assert!(!c("1.x").accepts(&v("2.0.0")));
        assert!(c("").accepts(&v("2.0.0")));
        assert!(!c("").accepts(&v("2.0.0-beta")));
        assert!(SemverConstraint::parse("", true).unwrap().accepts(&v("2.0.0-beta")));
    }

    #[test]
    fn test_invalid_constraints() {
        for text in ["2.0.0<", "<>1.0.0", "abc", "=", ">=1.0.0 ||| 2.0.0"] {
            assert!(SemverConstraint::parse(text, false).is_err(), "{}", text);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(v("1.2.3-alpha.3+7223b39").to_string(), "1.2.3-alpha.3+7223b39");
        assert_eq!(
            c("1.2.3 ||>=3.4.5-0 || 3.4.5").to_string(),
            "=1.2.3 || >=3.4.5-0 || =3.4.5"
        );
        assert_eq!(c(">=1.0.0 <2.x").to_string(), ">=1.0.0 <2.x.x");
    }
}
