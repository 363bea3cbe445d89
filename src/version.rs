//! libpq-style version numbers.
//!
//! Versions are encoded as integers: `90603` is 9.6.3 and `120003` is 12.3.
//! From 10 onwards the middle two digits are always zero.

use std::{cmp::Ordering, fmt, str::FromStr};

/// Version of the protocol library a connection will be made with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion(u32);

impl ProtocolVersion {
    /// First version accepting the `hostaddr` parameter.
    pub const HOSTADDR: Self = Self(100_000);

    /// Wraps an encoded version number.
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    /// Gets the encoded version number.
    pub const fn number(self) -> u32 {
        self.0
    }

    /// Gets the major version: `9` for 9.6.3, `12` for 12.3.
    pub const fn major(self) -> u32 {
        self.0 / 10_000
    }

    /// Splits the version into its components: `[12, 3]` for 12.3 and
    /// `[9, 6, 3]` for 9.6.3.
    pub fn parts(self) -> Vec<u32> {
        let (rest, patch) = (self.0 / 100, self.0 % 100);
        let (major, minor) = (rest / 100, rest % 100);
        if major >= 10 {
            vec![major, patch]
        } else {
            vec![major, minor, patch]
        }
    }

    /// Determines if connections made with this version accept `hostaddr`.
    pub fn supports_hostaddr(self) -> bool {
        self >= Self::HOSTADDR
    }

    /// Extracts the version from a CockroachDB version string, such as the
    /// `crdb_version` parameter status.
    ///
    /// The first `vMAJOR.MINOR.PATCH` word is encoded as
    /// `MAJOR * 10000 + MINOR * 100 + PATCH`, whatever the major version.
    ///
    /// ```
    /// use hostaddr_rs::ProtocolVersion;
    /// let version = ProtocolVersion::parse_crdb("CockroachDB CCL v21.2.10 (x86_64-unknown-linux-gnu)");
    /// assert_eq!(version, Some(ProtocolVersion::new(210210)));
    /// ```
    pub fn parse_crdb(version: &str) -> Option<Self> {
        version.match_indices('v').find_map(|(idx, _)| {
            let at_word_start = version[..idx]
                .chars()
                .next_back()
                .map_or(true, |c| !(c.is_alphanumeric() || c == '_'));
            if !at_word_start {
                return None;
            }

            let mut parts = version[idx + 1..].splitn(3, '.');
            let major = number(parts.next()?)?;
            let minor = number(parts.next()?)?;
            let rest = parts.next()?;
            let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            let patch = number(&rest[..end])?;
            major
                .checked_mul(10_000)?
                .checked_add(minor.checked_mul(100)?)?
                .checked_add(patch)
                .map(Self)
        })
    }
}

/// Parses a non-empty run of ASCII digits.
fn number(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl From<u32> for ProtocolVersion {
    fn from(number: u32) -> Self {
        Self(number)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_parts(&self.parts()))
    }
}

fn join_parts(parts: &[u32]) -> String {
    parts
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Errors encountered parsing a [`VersionSpec`].
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum VersionSpecError {
    /// The spec is not of the form `[op] major[.minor[.patch]]`.
    #[error("bad wanted version spec: {0}")]
    Malformed(String),
    /// A three-component version was given for a release numbered with two.
    #[error("bad version in {0}")]
    PatchNotAllowed(String),
}

/// Comparison operator of a [`VersionSpec`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `==`, also used when no operator is written.
    Eq,
}

impl Op {
    const ALL: [(Op, &'static str); 5] = [
        (Op::Ge, ">="),
        (Op::Le, "<="),
        (Op::Gt, ">"),
        (Op::Lt, "<"),
        (Op::Eq, "=="),
    ];

    fn as_str(self) -> &'static str {
        match self {
            Op::Ge => ">=",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Lt => "<",
            Op::Eq => "==",
        }
    }

    /// Operator that holds exactly when this one doesn't.
    fn negated(self) -> &'static str {
        match self {
            Op::Ge => "<",
            Op::Le => ">",
            Op::Gt => "<=",
            Op::Lt => ">=",
            Op::Eq => "!=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Op::Ge => ordering != Ordering::Less,
            Op::Le => ordering != Ordering::Greater,
            Op::Gt => ordering == Ordering::Greater,
            Op::Lt => ordering == Ordering::Less,
            Op::Eq => ordering == Ordering::Equal,
        }
    }
}

/// A version requirement such as `>= 10` or `< 9.6`.
///
/// ```
/// use hostaddr_rs::version::{ProtocolVersion, VersionSpec};
/// let spec: VersionSpec = ">= 13".parse().unwrap();
/// assert!(spec.matches(ProtocolVersion::new(140005)));
/// assert_eq!(
///     spec.check(ProtocolVersion::new(120003), "libpq").as_deref(),
///     Some("libpq version is 12.3 < 13.0")
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionSpec {
    op: Op,
    parts: Vec<u32>,
}

impl VersionSpec {
    /// Gets the comparison operator.
    pub fn op(&self) -> Op {
        self.op
    }

    /// Determines if `version` satisfies the requirement.
    pub fn matches(&self, version: ProtocolVersion) -> bool {
        self.op.holds(version.parts().cmp(&self.parts))
    }

    /// Returns a description of why `version` fails the requirement, naming
    /// it after `whose` (e.g. `"libpq"` or `"server"`), or `None` if it
    /// satisfies it.
    pub fn check(&self, version: ProtocolVersion, whose: &str) -> Option<String> {
        if self.matches(version) {
            return None;
        }
        Some(format!(
            "{whose} version is {version} {} {}",
            self.op.negated(),
            join_parts(&self.parts)
        ))
    }
}

impl FromStr for VersionSpec {
    type Err = VersionSpecError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let malformed = || VersionSpecError::Malformed(spec.to_string());
        let trimmed = spec.trim();
        let (op, rest) = Op::ALL
            .iter()
            .find_map(|&(op, token)| trimmed.strip_prefix(token).map(|rest| (op, rest)))
            .unwrap_or((Op::Eq, trimmed));

        let numbers = rest
            .trim()
            .split('.')
            .map(|part| number(part).ok_or_else(malformed))
            .collect::<Result<Vec<_>, _>>()?;
        if numbers.len() > 3 {
            return Err(malformed());
        }

        let component = |idx: usize| numbers.get(idx).copied().unwrap_or(0);
        let (major, minor, patch) = (component(0), component(1), component(2));
        let parts = if major >= 10 {
            if patch != 0 {
                return Err(VersionSpecError::PatchNotAllowed(spec.to_string()));
            }
            vec![major, minor]
        } else {
            vec![major, minor, patch]
        };
        Ok(Self { op, parts })
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.as_str(), join_parts(&self.parts))
    }
}
