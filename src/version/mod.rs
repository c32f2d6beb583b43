// SPDX-License-Identifier: MIT

//! Version and version-constraint grammars
//!
//! Two grammars share one constraint engine: semantic versions
//! (`major.minor.patch[-prerelease][+build]`) and calendar versions
//! (`YYYY-MM-DD[-prerelease]`). A constraint is a list of comparator clauses;
//! clauses separated by spaces must all hold, groups separated by `||` are
//! alternatives. A leading `@pre ` or `@prerelease ` accepts prerelease
//! versions that would otherwise be excluded.

mod date;
mod semver;

pub use date::{DateConstraint, DateVersion};
pub use semver::{SemanticVersion, SemverConstraint};

use crate::error::VersionError;
use std::cmp::Ordering;
use std::fmt;

const FLAG_PRE: &str = "@pre ";
const FLAG_PRERELEASE: &str = "@prerelease ";

/// Dot separated prerelease identifiers. An empty value is a stable release.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prerelease {
    value: String,
}

impl Prerelease {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_stable(&self) -> bool {
        self.identifiers().next().is_none()
    }

    fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.value.split('.').filter(|s| !s.is_empty())
    }
}

impl Ord for Prerelease {
    /// A stable release sorts after any prerelease. Numeric identifiers sort
    /// below alphanumeric ones; when all shared identifiers are equal the
    /// longer list wins.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_stable(), other.is_stable()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }
        let left: Vec<&str> = self.identifiers().collect();
        let right: Vec<&str> = other.identifiers().collect();
        for (l, r) in left.iter().zip(right.iter()) {
            let ordering = match (l.parse::<i64>(), r.parse::<i64>()) {
                (Ok(l), Ok(r)) => l.cmp(&r),
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => l.cmp(r),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        left.len().cmp(&right.len())
    }
}

impl PartialOrd for Prerelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Prerelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Comparison {
    Equal,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    /// `^`: same major, at least the given minor/patch
    MinorUplift,
    /// `~`: same major and minor, at least the given patch
    PatchUplift,
}

impl Comparison {
    fn symbol(&self) -> &'static str {
        match self {
            Comparison::Equal => "=",
            Comparison::Greater => ">",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::MinorUplift => "^",
            Comparison::PatchUplift => "~",
        }
    }
}

/// Per-grammar scanning rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Grammar {
    Semantic,
    Date,
}

impl Grammar {
    fn separator(&self) -> char {
        match self {
            Grammar::Semantic => '.',
            Grammar::Date => '-',
        }
    }

    fn max_segments(&self) -> usize {
        match self {
            Grammar::Semantic => 4,
            Grammar::Date => 3,
        }
    }

    fn format_core(&self, core: &[i64; 3], f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |value: i64, width: usize| {
            if value < 0 {
                "x".to_string()
            } else {
                format!("{:0width$}", value, width = width)
            }
        };
        match self {
            Grammar::Semantic => write!(f, "{}.{}.{}", part(core[0], 0), part(core[1], 0), part(core[2], 0)),
            Grammar::Date => write!(f, "{}-{}-{}", part(core[0], 4), part(core[1], 2), part(core[2], 2)),
        }
    }
}

/// Parsed pieces of a version or comparator clause. `-1` marks a wildcard or
/// missing segment.
#[derive(Debug, Clone)]
pub(crate) struct Parts {
    pub core: [i64; 3],
    pub prerelease: Prerelease,
    pub build: String,
}

/// One comparator clause
#[derive(Debug, Clone)]
pub(crate) struct Clause {
    op: Comparison,
    core: [i64; 3],
    prerelease: Prerelease,
    include_prerelease: bool,
}

impl Clause {
    pub(crate) fn accepts(&self, core: [i64; 3], prerelease: &Prerelease) -> bool {
        if self.op == Comparison::Equal {
            return self.eq(core, prerelease);
        }
        if !self.include_prerelease && self.prerelease.is_stable() && !prerelease.is_stable() {
            return false;
        }
        let [major, minor, patch] = core;
        let [c_major, c_minor, c_patch] = self.core;
        match self.op {
            Comparison::MinorUplift => {
                major == c_major && !(minor < c_minor || (minor == c_minor && patch < c_patch))
            }
            Comparison::PatchUplift => major == c_major && minor == c_minor && patch >= c_patch,
            Comparison::Greater => self.gt(core, prerelease),
            Comparison::GreaterOrEqual => self.gt(core, prerelease) || self.eq(core, prerelease),
            Comparison::Less => self.lt(core, prerelease),
            Comparison::LessOrEqual => self.lt(core, prerelease) || self.eq(core, prerelease),
            Comparison::Equal => self.eq(core, prerelease),
        }
    }

    fn eq_core(&self, core: [i64; 3]) -> bool {
        self.core
            .iter()
            .zip(core.iter())
            .all(|(c, v)| *c == -1 || c == v)
    }

    fn eq(&self, core: [i64; 3], prerelease: &Prerelease) -> bool {
        self.eq_core(core) && self.prerelease.cmp(prerelease) == Ordering::Equal
    }

    fn gt(&self, core: [i64; 3], prerelease: &Prerelease) -> bool {
        let pr_greater = self.prerelease.cmp(prerelease) == Ordering::Less;
        if !prerelease.is_stable() && !self.include_prerelease {
            return self.eq_core(core) && pr_greater;
        }
        core > self.core || (self.eq_core(core) && pr_greater)
    }

    fn lt(&self, core: [i64; 3], prerelease: &Prerelease) -> bool {
        let pr_less = self.prerelease.cmp(prerelease) == Ordering::Greater;
        if !prerelease.is_stable() && !self.include_prerelease {
            return self.eq_core(core) && pr_less;
        }
        core < self.core || (self.eq_core(core) && pr_less)
    }

    fn fmt_with(&self, grammar: Grammar, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.op.symbol())?;
        grammar.format_core(&self.core, f)?;
        if !self.prerelease.is_stable() {
            write!(f, "-{}", self.prerelease)?;
        }
        Ok(())
    }
}

/// A parsed constraint: alternatives of clause groups
#[derive(Debug, Clone)]
pub(crate) struct Constraint {
    grammar: Grammar,
    groups: Vec<Vec<Clause>>,
    include_prerelease: bool,
}

impl Constraint {
    pub(crate) fn parse(
        grammar: Grammar,
        text: &str,
        include_prerelease: bool,
    ) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidConstraint(text.to_string());
        let mut include_prerelease = include_prerelease;
        let mut rest = text.trim();
        for flag in [FLAG_PRERELEASE, FLAG_PRE] {
            if let Some(stripped) = rest.strip_prefix(flag) {
                include_prerelease = true;
                rest = stripped;
                break;
            }
        }
        let mut constraint = Self {
            grammar,
            groups: Vec::new(),
            include_prerelease,
        };
        let mut stream = Stream::new(rest, grammar);
        let mut group = Vec::new();
        stream.skip_spaces();
        while !stream.eof() {
            let op = stream.operator().ok_or_else(invalid)?;
            let parts = stream.parts().ok_or_else(invalid)?;
            group.push(Clause {
                op,
                core: parts.core,
                prerelease: parts.prerelease,
                include_prerelease,
            });
            match stream.join().ok_or_else(invalid)? {
                Join::And => {}
                Join::Or => constraint.groups.push(std::mem::take(&mut group)),
            }
        }
        if !group.is_empty() {
            constraint.groups.push(group);
        }
        Ok(constraint)
    }

    pub(crate) fn accepts(&self, core: [i64; 3], prerelease: &Prerelease) -> bool {
        if self.groups.is_empty() {
            return prerelease.is_stable() || self.include_prerelease;
        }
        self.groups
            .iter()
            .any(|group| group.iter().all(|clause| clause.accepts(core, prerelease)))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                f.write_str(" || ")?;
            }
            for (j, clause) in group.iter().enumerate() {
                if j > 0 {
                    f.write_str(" ")?;
                }
                clause.fmt_with(self.grammar, f)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Join {
    And,
    Or,
}

/// Character scanner shared by both grammars
pub(crate) struct Stream {
    chars: Vec<char>,
    pos: usize,
    grammar: Grammar,
}

impl Stream {
    pub(crate) fn new(text: &str, grammar: Grammar) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            grammar,
        }
    }

    pub(crate) fn eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_spaces(&mut self) {
        while self.current() == Some(' ') {
            self.pos += 1;
        }
    }

    fn operator(&mut self) -> Option<Comparison> {
        let mut equal = false;
        let mut greater = false;
        let mut less = false;
        let mut uplift = None;
        while let Some(c) = self.current() {
            match c {
                '=' => equal = true,
                '>' => greater = true,
                '<' => less = true,
                '^' if self.grammar == Grammar::Semantic => uplift = Some(Comparison::MinorUplift),
                '~' if self.grammar == Grammar::Semantic => uplift = Some(Comparison::PatchUplift),
                _ => break,
            }
            self.pos += 1;
        }
        if let Some(uplift) = uplift {
            return (!equal && !greater && !less).then_some(uplift);
        }
        match (equal, greater, less) {
            (_, false, false) => Some(Comparison::Equal),
            (false, true, false) => Some(Comparison::Greater),
            (true, true, false) => Some(Comparison::GreaterOrEqual),
            (false, false, true) => Some(Comparison::Less),
            (true, false, true) => Some(Comparison::LessOrEqual),
            _ => None,
        }
    }

    fn is_wildcard(c: char) -> bool {
        c == '*' || c == 'x' || c == 'X'
    }

    fn digits(&mut self) -> Option<Option<i64>> {
        let start = self.pos;
        while self.current().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return Some(None);
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<i64>().ok().map(Some)
    }

    /// Up to three numeric or wildcard segments
    fn segments(&mut self) -> Option<[i64; 3]> {
        let separator = self.grammar.separator();
        let max = self.grammar.max_segments();
        let mut segments = [-1i64; 4];
        let mut count = 0;
        if self.grammar == Grammar::Semantic && matches!(self.current(), Some('v' | 'V')) {
            self.pos += 1;
        }
        while let Some(c) = self.current() {
            if let Some(value) = self.digits()? {
                if count >= max {
                    return None;
                }
                segments[count] = value;
                count += 1;
                if self.grammar == Grammar::Date && count == max {
                    break;
                }
                continue;
            }
            if c == separator {
                self.pos += 1;
            } else if Self::is_wildcard(c) {
                if count >= max {
                    return None;
                }
                count += 1;
                self.pos += 1;
            } else if c == '-' || c == '+' || c == ' ' || c == '|' {
                break;
            } else {
                return None;
            }
        }
        (count > 0).then_some([segments[0], segments[1], segments[2]])
    }

    fn prerelease(&mut self) -> Option<Prerelease> {
        if self.current() != Some('-') {
            return Some(Prerelease::default());
        }
        self.pos += 1;
        let start = self.pos;
        let mut numeric = true;
        while let Some(c) = self.current() {
            if numeric && c.is_ascii_digit() {
                self.pos += 1;
                continue;
            }
            numeric = false;
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return None;
        }
        let id: String = self.chars[start..self.pos].iter().collect();
        if numeric && id.len() > 1 && id.starts_with('0') {
            return None;
        }
        Some(Prerelease::new(id))
    }

    fn build(&mut self) -> String {
        if self.grammar != Grammar::Semantic || self.current() != Some('+') {
            return String::new();
        }
        self.pos += 1;
        let start = self.pos;
        while self
            .current()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    pub(crate) fn parts(&mut self) -> Option<Parts> {
        let core = self.segments()?;
        let prerelease = self.prerelease()?;
        let build = self.build();
        Some(Parts {
            core,
            prerelease,
            build,
        })
    }

    /// Separator after a clause; end of input closes the current group
    fn join(&mut self) -> Option<Join> {
        let mut join = Join::Or;
        let mut seen = false;
        let mut pipes = 0;
        while let Some(c) = self.current() {
            match c {
                ' ' => {}
                '|' => pipes += 1,
                _ => break,
            }
            seen = true;
            self.pos += 1;
        }
        if self.eof() {
            return Some(Join::Or);
        }
        if !seen || pipes > 2 {
            return None;
        }
        if pipes == 0 {
            join = Join::And;
        }
        Some(join)
    }
}

/// Parse a complete version, rejecting trailing input
pub(crate) fn parse_parts(grammar: Grammar, text: &str) -> Option<Parts> {
    let mut stream = Stream::new(text.trim(), grammar);
    if stream.eof() {
        return None;
    }
    let parts = stream.parts()?;
    stream.eof().then_some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prerelease_ordering() {
        let stable = Prerelease::default();
        let alpha = Prerelease::new("alpha");
        let alpha1 = Prerelease::new("alpha.1");
        let alpha_beta = Prerelease::new("alpha.beta");
        let beta = Prerelease::new("beta");
        let beta2 = Prerelease::new("beta.2");
        let beta11 = Prerelease::new("beta.11");
        let rc1 = Prerelease::new("rc.1");

        assert!(stable > alpha);
        assert!(alpha < alpha1);
        assert!(alpha1 < alpha_beta);
        assert!(alpha_beta < beta);
        assert!(beta < beta2);
        assert!(beta2 < beta11);
        assert!(beta11 < rc1);
        assert!(rc1 < stable);
        assert_eq!(stable.cmp(&Prerelease::new("")), Ordering::Equal);
    }

    #[test]
    fn test_operator_combinations() {
        let op = |s: &str| Stream::new(s, Grammar::Semantic).operator();
        assert_eq!(op("1"), Some(Comparison::Equal));
        assert_eq!(op("=1"), Some(Comparison::Equal));
        assert_eq!(op(">=1"), Some(Comparison::GreaterOrEqual));
        assert_eq!(op("=<1"), Some(Comparison::LessOrEqual));
        assert_eq!(op("^1"), Some(Comparison::MinorUplift));
        assert_eq!(op("<>1"), None);
        assert_eq!(op("^>1"), None);
        assert_eq!(Stream::new("^1", Grammar::Date).operator(), Some(Comparison::Equal));
    }

    #[test]
    fn test_join() {
        let constraint = Constraint::parse(Grammar::Semantic, ">=1.0.0 <2.0.0 || 3.x", false).unwrap();
        assert_eq!(constraint.groups.len(), 2);
        assert_eq!(constraint.groups[0].len(), 2);
        assert!(Constraint::parse(Grammar::Semantic, "1.0.0 ||| 2.0.0", false).is_err());
    }
}
