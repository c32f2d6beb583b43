// SPDX-License-Identifier: MIT

//! Calendar versions such as Azure style `2022-03-01-preview`

use super::{parse_parts, Constraint, Grammar, Prerelease};
use crate::error::VersionError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// `YYYY-MM-DD[-prerelease]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateVersion {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub prerelease: Prerelease,
}

impl DateVersion {
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidVersion(text.to_string());
        let parts = parse_parts(Grammar::Date, text).ok_or_else(invalid)?;
        let segment = |i: usize| u32::try_from(parts.core[i].max(0)).map_err(|_| invalid());
        Ok(Self {
            year: segment(0)?,
            month: segment(1)?,
            day: segment(2)?,
            prerelease: parts.prerelease.clone(),
        })
    }

    pub fn is_stable(&self) -> bool {
        self.prerelease.is_stable()
    }

    fn core(&self) -> [i64; 3] {
        [self.year as i64, self.month as i64, self.day as i64]
    }
}

impl FromStr for DateVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Ord for DateVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.core()
            .cmp(&other.core())
            .then_with(|| self.prerelease.cmp(&other.prerelease))
    }
}

impl PartialOrd for DateVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)?;
        if !self.prerelease.is_stable() {
            write!(f, "-{}", self.prerelease)?;
        }
        Ok(())
    }
}

/// A calendar version range. Only `=`, `<`, `>` and their combinations are
/// recognised.
#[derive(Debug, Clone)]
pub struct DateConstraint {
    inner: Constraint,
}

impl DateConstraint {
    pub fn parse(text: &str, include_prerelease: bool) -> Result<Self, VersionError> {
        Ok(Self {
            inner: Constraint::parse(Grammar::Date, text, include_prerelease)?,
        })
    }

    pub fn accepts(&self, version: &DateVersion) -> bool {
        self.inner.accepts(version.core(), &version.prerelease)
    }
}

impl fmt::Display for DateConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> DateVersion {
        DateVersion::parse(s).unwrap()
    }

    fn c(s: &str) -> DateConstraint {
        DateConstraint::parse(s, false).unwrap()
    }

    #[test]
    fn test_parse_version() {
        let version = v("2015-10-01");
        assert_eq!((version.year, version.month, version.day), (2015, 10, 1));
        assert!(version.is_stable());

        let version = v("2015-1-01-prerelease");
        assert_eq!(version.month, 1);
        assert_eq!(version.prerelease.as_str(), "prerelease");
        assert_eq!(version.to_string(), "2015-01-01-prerelease");

        assert!(DateVersion::parse("2022-03-01-").is_err());
        assert!(DateVersion::parse("2022-03-01-0").is_ok());
        assert!(DateVersion::parse("2022-03-01-preview").is_ok());
    }

    #[test]
    fn test_ordering() {
        let stable = v("2015-10-01");
        let pre = v("2015-10-01-prerelease");
        let later = v("2022-03-01");
        let earlier_in_year = v("2022-01-03");
        assert!(stable > pre);
        assert!(stable < later);
        assert!(pre < earlier_in_year);
        assert!(later > earlier_in_year);
    }

    #[test]
    fn test_constraints() {
        let version = v("2015-10-01");
        assert!(c("2015-10-01").accepts(&version));
        assert!(!c("2015-10-01-alpha.3").accepts(&version));
        assert!(c(">2015-10-01-alpha.3").accepts(&version));
        assert!(!c("<2015-10-01-beta").accepts(&version));
        assert!(c("<2022-03-01").accepts(&version));
        assert!(c(">=2015-10-01").accepts(&version));
        assert!(c(">=2015-10-01-0").accepts(&version));
        assert!(c("<2022-03-01-9999999999").accepts(&version));
        assert!(!c("<2015-10-01-0").accepts(&version));
        assert!(c("2015-10-01|| >=2022-03-01-0 2022-03-01").accepts(&version));
        assert!(c("@pre >=2015-09-01").accepts(&v("2015-10-01-alpha.9")));
        assert!(!c(">=2015-09-01").accepts(&v("2015-10-01-alpha.9")));
    }

    #[test]
    fn test_uplift_not_supported() {
        assert!(DateConstraint::parse("^2015-10-01", false).is_err());
        assert!(DateConstraint::parse("~2015-10-01", false).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            c("2015-10-01 ||>=2022-03-01-0 || 2022-03-01").to_string(),
            "=2015-10-01 || >=2022-03-01-0 || =2022-03-01"
        );
    }
}
