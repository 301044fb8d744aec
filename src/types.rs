//! Core types for identifiers, the cross-reference matrix, and spec documents.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifier namespace, fully determined by the identifier prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Master,
    Api,
    Rule,
    Screen,
    Feature,
    Fix,
    TestScenario,
}

/// Prefix table, longest prefixes first so `SCR-` wins over `S-`.
const PREFIXES: [(&str, Namespace); 7] = [
    ("API-", Namespace::Api),
    ("SCR-", Namespace::Screen),
    ("TS-", Namespace::TestScenario),
    ("M-", Namespace::Master),
    ("R-", Namespace::Rule),
    ("S-", Namespace::Feature),
    ("F-", Namespace::Fix),
];

impl Namespace {
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Master => "M-",
            Namespace::Api => "API-",
            Namespace::Rule => "R-",
            Namespace::Screen => "SCR-",
            Namespace::Feature => "S-",
            Namespace::Fix => "F-",
            Namespace::TestScenario => "TS-",
        }
    }

    /// Human-readable label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            Namespace::Master => "Master",
            Namespace::Api => "API",
            Namespace::Rule => "Rule",
            Namespace::Screen => "Screen",
            Namespace::Feature => "Feature",
            Namespace::Fix => "Fix",
            Namespace::TestScenario => "Test Scenario",
        }
    }

    /// Classify an already canonical (upper-case) token by prefix.
    fn classify(canonical: &str) -> Option<Namespace> {
        PREFIXES.iter().find_map(|(prefix, ns)| {
            let rest = canonical.strip_prefix(prefix)?;
            (!rest.is_empty()).then_some(*ns)
        })
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Canonical form of any identifier-like token: trimmed and upper-cased.
pub fn canonicalize(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// A typed identifier. The canonical form is computed once at construction,
/// so equality and ordering are plain structural comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    namespace: Namespace,
    canonical: String,
}

impl Identifier {
    /// Parse a raw token. Returns `None` when no known prefix matches or the
    /// token has nothing after its prefix.
    pub fn parse(raw: &str) -> Option<Identifier> {
        let canonical = canonicalize(raw);
        let namespace = Namespace::classify(&canonical)?;
        Some(Identifier {
            namespace,
            canonical,
        })
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Base entity name with a trailing `-NNN` numeric suffix removed, e.g.
    /// `M-USER-002` becomes `M-USER`. Only Masters carry sub-numbered variants;
    /// other namespaces are returned unchanged.
    pub fn base(&self) -> Identifier {
        if self.namespace != Namespace::Master {
            return self.clone();
        }
        Identifier {
            namespace: self.namespace,
            canonical: strip_numeric_suffix(&self.canonical).to_string(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Strip one trailing `-<digits>` group, unless that would leave only the prefix.
fn strip_numeric_suffix(id: &str) -> &str {
    let Some((head, tail)) = id.rsplit_once('-') else {
        return id;
    };
    let numeric = !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit());
    let head_has_name = head.contains('-') && !head.ends_with('-');
    if numeric && head_has_name { head } else { id }
}

/// A screen entry in the matrix.
/// Treat an explicit JSON `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub masters: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub apis: Vec<String>,
}

/// A feature entry in the matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub screens: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub masters: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub apis: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rules: Vec<String>,
}

/// The cross-reference matrix: a derived index from screens and features to
/// the identifiers they use, plus API role permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    #[serde(default, deserialize_with = "null_as_default")]
    pub screens: BTreeMap<String, ScreenEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub features: BTreeMap<String, FeatureEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub permissions: BTreeMap<String, Vec<String>>,
}

/// Sort map entries by canonical key, raw key as tie-breaker.
fn sorted_by_canonical<V>(map: &BTreeMap<String, V>) -> Vec<(&String, &V)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|(a, _), (b, _)| canonicalize(a).cmp(&canonicalize(b)).then(a.cmp(b)));
    entries
}

impl Matrix {
    pub fn sorted_screens(&self) -> Vec<(&String, &ScreenEntry)> {
        sorted_by_canonical(&self.screens)
    }

    pub fn sorted_features(&self) -> Vec<(&String, &FeatureEntry)> {
        sorted_by_canonical(&self.features)
    }

    pub fn sorted_permissions(&self) -> Vec<(&String, &Vec<String>)> {
        sorted_by_canonical(&self.permissions)
    }

    /// Distinct Masters referenced by any screen or feature (canonical form).
    pub fn referenced_masters(&self) -> BTreeSet<String> {
        self.screens
            .values()
            .flat_map(|s| s.masters.iter())
            .chain(self.features.values().flat_map(|f| f.masters.iter()))
            .map(|m| canonicalize(m))
            .collect()
    }

    /// Distinct APIs referenced by any screen or feature (canonical form).
    pub fn referenced_apis(&self) -> BTreeSet<String> {
        self.screens
            .values()
            .flat_map(|s| s.apis.iter())
            .chain(self.features.values().flat_map(|f| f.apis.iter()))
            .map(|a| canonicalize(a))
            .collect()
    }

    /// Distinct Rules referenced by any feature (canonical form).
    pub fn referenced_rules(&self) -> BTreeSet<String> {
        self.features
            .values()
            .flat_map(|f| f.rules.iter())
            .map(|r| canonicalize(r))
            .collect()
    }
}

/// Kind of spec document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpecType {
    Vision,
    Domain,
    Screen,
    Feature,
    Fix,
    TestScenario,
    #[default]
    Unknown,
}

impl fmt::Display for SpecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpecType::Vision => "vision",
            SpecType::Domain => "domain",
            SpecType::Screen => "screen",
            SpecType::Feature => "feature",
            SpecType::Fix => "fix",
            SpecType::TestScenario => "test-scenario",
            SpecType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for SpecType {
    type Err = String;

    /// Accepts the canonical names plus the common aliases found in spec
    /// front matter (`overview`, `bugfix`, `*-spec`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vision" | "vision-spec" => Ok(SpecType::Vision),
            "domain" | "domain-spec" | "overview" => Ok(SpecType::Domain),
            "screen" | "screen-spec" => Ok(SpecType::Screen),
            "feature" | "feature-spec" => Ok(SpecType::Feature),
            "fix" | "fix-spec" | "bugfix" => Ok(SpecType::Fix),
            "test-scenario" | "test-scenario-spec" | "test-scenarios" => {
                Ok(SpecType::TestScenario)
            }
            "unknown" | "" => Ok(SpecType::Unknown),
            other => Err(format!("Invalid spec type: {}", other)),
        }
    }
}
