use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PfamError;

static BARE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^PF[0-9]{5}$").unwrap());
static VERSIONED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(PF[0-9]{5})\.([0-9]+(?:\.[0-9]+)*)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BareIdentifier(String);

impl BareIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn accession_prefix(&self) -> String {
        format!("{}.", self.0)
    }
}

impl fmt::Display for BareIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BareIdentifier {
    type Err = PfamError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !BARE_RE.is_match(trimmed) {
            return Err(PfamError::InvalidIdentifier(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for BareIdentifier {
    type Error = PfamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BareIdentifier> for String {
    fn from(value: BareIdentifier) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionedAccession {
    bare: BareIdentifier,
    version: String,
}

impl VersionedAccession {
    pub fn bare(&self) -> &BareIdentifier {
        &self.bare
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn file_name(&self) -> String {
        format!("{self}.hmm")
    }
}

impl fmt::Display for VersionedAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.bare, self.version)
    }
}

impl FromStr for VersionedAccession {
    type Err = PfamError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let caps = VERSIONED_RE
            .captures(trimmed)
            .ok_or_else(|| PfamError::InvalidAccession(value.to_string()))?;
        Ok(Self {
            bare: BareIdentifier(caps[1].to_string()),
            version: caps[2].to_string(),
        })
    }
}

impl TryFrom<String> for VersionedAccession {
    type Error = PfamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionedAccession> for String {
    fn from(value: VersionedAccession) -> Self {
        value.to_string()
    }
}

impl Ord for VersionedAccession {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bare
            .cmp(&other.bare)
            .then_with(|| compare_versions(&self.version, &other.version))
    }
}

impl PartialOrd for VersionedAccession {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Version-aware comparison of dot-separated version strings.
///
/// Numeric components compare as integers; anything else falls back to
/// string comparison. A version that is a prefix of another sorts first.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let mut lhs = left.split('.');
    let mut rhs = right.split('.');
    loop {
        match (lhs.next(), rhs.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(a), Some(b)) => {
                let ord = match (a.parse::<u64>(), b.parse::<u64>()) {
                    (Ok(na), Ok(nb)) => na.cmp(&nb).then_with(|| a.cmp(b)),
                    _ => a.cmp(b),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    #[default]
    Auto,
    Hmmfetch,
    Builtin,
}

impl fmt::Display for FetcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetcherKind::Auto => write!(f, "auto"),
            FetcherKind::Hmmfetch => write!(f, "hmmfetch"),
            FetcherKind::Builtin => write!(f, "builtin"),
        }
    }
}
