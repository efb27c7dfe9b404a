//! Shared query and result types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Package field a query matches against. Also reported as the tier that
/// produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Command,
    Name,
    Moniker,
}

impl MatchField {
    /// Fallback order used by the resolver.
    pub const TIERS: [MatchField; 3] = [MatchField::Command, MatchField::Name, MatchField::Moniker];

    pub fn as_str(self) -> &'static str {
        match self {
            MatchField::Command => "command",
            MatchField::Name => "name",
            MatchField::Moniker => "moniker",
        }
    }

    /// Match mode each tier uses.
    pub fn tier_match_mode(self) -> MatchMode {
        match self {
            MatchField::Command => MatchMode::EqualsCaseInsensitive,
            MatchField::Name | MatchField::Moniker => MatchMode::ContainsCaseInsensitive,
        }
    }
}

impl fmt::Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    EqualsCaseInsensitive,
    ContainsCaseInsensitive,
}

impl MatchMode {
    pub fn matches(self, candidate: &str, query: &str) -> bool {
        let candidate = candidate.to_lowercase();
        let query = query.to_lowercase();
        match self {
            MatchMode::EqualsCaseInsensitive => candidate == query,
            MatchMode::ContainsCaseInsensitive => candidate.contains(&query),
        }
    }
}

/// One logical package-index query. A `None` field searches without a
/// filter (used by warm-up).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageQuery {
    pub field: Option<MatchField>,
    pub value: String,
    pub match_mode: MatchMode,
    pub source: Option<String>,
    pub count: Option<u32>,
}

impl PackageQuery {
    pub fn tier(field: MatchField, value: &str, source: &str) -> Self {
        Self {
            field: Some(field),
            value: value.to_string(),
            match_mode: field.tier_match_mode(),
            source: Some(source.to_string()),
            count: None,
        }
    }

    /// Minimal count-limited query used to absorb first-call latency.
    pub fn warmup(source: &str) -> Self {
        Self {
            field: None,
            value: String::new(),
            match_mode: MatchMode::ContainsCaseInsensitive,
            source: Some(source.to_string()),
            count: Some(1),
        }
    }
}

/// One row of package-index output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Value of the field that matched, when the index reports it.
    #[serde(default)]
    pub matched: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Marker winget prints in place of the tail of a cell too wide for the
/// console.
pub const TRUNCATION_MARKER: char = '\u{2026}';

impl PackageRecord {
    /// True when the printed id was elided and cannot be installed as-is.
    pub fn is_truncated(&self) -> bool {
        self.id.ends_with(TRUNCATION_MARKER)
    }

    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: String::new(),
            matched: None,
            source: None,
        }
    }
}
