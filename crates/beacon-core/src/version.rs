use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static NUMERIC_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:\.\d+)*").expect("numeric run pattern should compile")
});

// A keyword only counts as a whole word: "source" is not "rc" and "develop"
// is not "dev". Digits may follow it, as in "beta3".
static IDENTIFIER_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z])(snapshot|alpha|beta|pre|rc|dev)(?:$|[^a-z])")
        .expect("identifier keyword pattern should compile")
});

/// Stability tag attached to a version.
///
/// Variants are declared from least to most stable and the derived ordering
/// is the ranking used when two versions share the same numeric segments:
///
/// `Developmental < Snapshot < Alpha < Beta < PreRelease < ReleaseCandidate < Release`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identifier {
    Developmental,
    Snapshot,
    Alpha,
    Beta,
    PreRelease,
    ReleaseCandidate,
    Release,
}

impl Identifier {
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "dev" => Some(Self::Developmental),
            "snapshot" => Some(Self::Snapshot),
            "alpha" => Some(Self::Alpha),
            "beta" => Some(Self::Beta),
            "pre" => Some(Self::PreRelease),
            "rc" => Some(Self::ReleaseCandidate),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Developmental => "dev",
            Self::Snapshot => "snapshot",
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::PreRelease => "pre",
            Self::ReleaseCandidate => "rc",
            Self::Release => "release",
        }
    }

    #[must_use]
    pub fn is_stable(self) -> bool {
        self == Self::Release
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loosely formatted, totally ordered version as published by a marketplace.
///
/// Parsing never fails: the first run of dot-separated digits supplies the
/// numeric segments (a single `0` when there is none) and the first known
/// stability keyword supplies the [`Identifier`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Version {
    segments: Vec<u64>,
    identifier: Identifier,
    raw: String,
}

impl Version {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let segments = NUMERIC_RUN.find(raw).map_or_else(
            || vec![0],
            |run| {
                run.as_str()
                    .split('.')
                    .map(|segment| segment.parse::<u64>().unwrap_or(u64::MAX))
                    .collect()
            },
        );

        let identifier = IDENTIFIER_KEYWORD
            .captures(raw)
            .and_then(|captures| captures.get(1))
            .and_then(|keyword| Identifier::from_keyword(keyword.as_str()))
            .unwrap_or(Identifier::Release);

        Self {
            segments,
            identifier,
            raw: raw.to_string(),
        }
    }

    #[must_use]
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    #[must_use]
    pub fn identifier(&self) -> Identifier {
        self.identifier
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn is_unstable(&self) -> bool {
        !self.identifier.is_stable()
    }

    fn cmp_segments(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        (0..len)
            .map(|index| {
                let left = self.segments.get(index).copied().unwrap_or(0);
                let right = other.segments.get(index).copied().unwrap_or(0);
                left.cmp(&right)
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::parse("0")
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_segments(other)
            .then(self.identifier.cmp(&other.identifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        if self.is_unstable() {
            write!(f, "-{}", self.identifier)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Version {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for Version {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.raw
    }
}
