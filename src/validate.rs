//! Consistency checking between the screen/domain specs and the matrix.
//!
//! Each category is a set difference `declared \ indexed` over canonical
//! identifiers. Categories are independent: one failing never hides another.

use crate::graph::API_SECTION;
use crate::markdown::{extract_declarations, extract_table_first_column};
use crate::types::{Matrix, Namespace, canonicalize};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Table in the screen spec listing every screen.
pub const SCREEN_INDEX_SECTION: &str = "Screen Index";
/// Table in the domain spec listing every feature.
pub const FEATURE_INDEX_SECTION: &str = "Feature Index";

const SCREEN_PLACEHOLDER: &str = "[TODO: Add screen name]";
const FEATURE_PLACEHOLDER: &str = "[TODO: Add feature title]";
const ROLES_PLACEHOLDER: &str = "[TODO: Add roles]";

static SCREEN_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^SCR-\d+$").expect("valid"));
static FEATURE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^S-[A-Z]+-\d+$").expect("valid"));

/// Identifiers the specs declare, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecInventory {
    pub screens: Vec<String>,
    pub features: Vec<String>,
    pub masters: Vec<String>,
    pub apis: Vec<String>,
}

/// Identifiers the matrix indexes, canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixInventory {
    pub screens: BTreeSet<String>,
    pub features: BTreeSet<String>,
    pub masters: BTreeSet<String>,
    pub apis: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

/// Declared/indexed counts, shown in the validator header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InventoryCounts {
    pub screens: usize,
    pub features: usize,
    pub masters: usize,
    pub apis: usize,
}

impl SpecInventory {
    pub fn counts(&self) -> InventoryCounts {
        InventoryCounts {
            screens: self.screens.len(),
            features: self.features.len(),
            masters: self.masters.len(),
            apis: self.apis.len(),
        }
    }
}

impl MatrixInventory {
    pub fn counts(&self) -> InventoryCounts {
        InventoryCounts {
            screens: self.screens.len(),
            features: self.features.len(),
            masters: self.masters.len(),
            apis: self.apis.len(),
        }
    }
}

fn push_unique(out: &mut Vec<String>, id: String) {
    if !out.contains(&id) {
        out.push(id);
    }
}

fn table_ids(text: &str, section: &str, shape: &Regex) -> Vec<String> {
    let mut ids = Vec::new();
    for cell in extract_table_first_column(text, section) {
        let id = canonicalize(&cell);
        if shape.is_match(&id) {
            push_unique(&mut ids, id);
        }
    }
    ids
}

/// Collect declared identifiers from the screen and domain specs.
///
/// Masters are reduced to their base name, so `M-USER-001` and `M-USER-002`
/// declare a single `M-USER`. APIs count only inside the API Contracts
/// section.
pub fn extract_spec_inventory(screen: &str, domain: &str) -> SpecInventory {
    let mut masters = Vec::new();
    for id in extract_declarations(domain, None, Namespace::Master) {
        push_unique(&mut masters, id.base().to_string());
    }

    let inventory = SpecInventory {
        screens: table_ids(screen, SCREEN_INDEX_SECTION, &SCREEN_ID),
        features: table_ids(domain, FEATURE_INDEX_SECTION, &FEATURE_ID),
        masters,
        apis: extract_declarations(domain, Some(API_SECTION), Namespace::Api)
            .into_iter()
            .map(|id| id.to_string())
            .collect(),
    };
    log::debug!("declared inventory: {:?}", inventory.counts());
    inventory
}

/// Collect what the matrix indexes. Masters and APIs are the union of
/// screen and feature references; they are upper-cased, not base-normalized.
pub fn extract_matrix_inventory(matrix: &Matrix) -> MatrixInventory {
    MatrixInventory {
        screens: matrix.screens.keys().map(|k| canonicalize(k)).collect(),
        features: matrix.features.keys().map(|k| canonicalize(k)).collect(),
        masters: matrix.referenced_masters(),
        apis: matrix.referenced_apis(),
        permissions: matrix.permissions.keys().map(|k| canonicalize(k)).collect(),
    }
}

/// A drift category, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    MissingScreens,
    MissingFeatures,
    MissingMasters,
    MissingApis,
    MissingPermissions,
}

impl IssueCategory {
    pub const ALL: [IssueCategory; 5] = [
        IssueCategory::MissingScreens,
        IssueCategory::MissingFeatures,
        IssueCategory::MissingMasters,
        IssueCategory::MissingApis,
        IssueCategory::MissingPermissions,
    ];

    /// Heading printed above the category's items.
    pub fn title(self) -> &'static str {
        match self {
            IssueCategory::MissingScreens => "Missing Screens in Matrix",
            IssueCategory::MissingFeatures => "Missing Features in Matrix",
            IssueCategory::MissingMasters => "Masters in Spec but not referenced in Matrix",
            IssueCategory::MissingApis => "APIs in Spec but not referenced in Matrix",
            IssueCategory::MissingPermissions => "APIs without permissions in Matrix",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Outcome of a validation run. Only non-empty categories are stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub declared: InventoryCounts,
    pub indexed: InventoryCounts,
    pub issues: BTreeMap<IssueCategory, Vec<String>>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn missing(&self, category: IssueCategory) -> &[String] {
        self.issues.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn difference(declared: &[String], indexed: &BTreeSet<String>) -> Vec<String> {
    declared
        .iter()
        .filter(|id| !indexed.contains(&canonicalize(id)))
        .cloned()
        .collect()
}

/// Compare declared against indexed identifiers.
pub fn validate_matrix(spec: &SpecInventory, matrix: &MatrixInventory) -> ValidationReport {
    let candidates = [
        (IssueCategory::MissingScreens, difference(&spec.screens, &matrix.screens)),
        (IssueCategory::MissingFeatures, difference(&spec.features, &matrix.features)),
        (IssueCategory::MissingMasters, difference(&spec.masters, &matrix.masters)),
        (IssueCategory::MissingApis, difference(&spec.apis, &matrix.apis)),
        (
            IssueCategory::MissingPermissions,
            difference(&spec.apis, &matrix.permissions),
        ),
    ];

    let issues: BTreeMap<_, _> = candidates
        .into_iter()
        .filter(|(_, ids)| !ids.is_empty())
        .collect();

    for (category, ids) in &issues {
        log::debug!("{}: {}", category, ids.join(", "));
    }

    ValidationReport {
        declared: spec.counts(),
        indexed: matrix.counts(),
        issues,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenSuggestion {
    pub name: String,
    pub masters: Vec<String>,
    pub apis: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSuggestion {
    pub title: String,
    pub screens: Vec<String>,
    pub masters: Vec<String>,
    pub apis: Vec<String>,
    pub rules: Vec<String>,
}

/// Placeholder matrix entries that would close screen, feature, and
/// permission gaps. Serializes to a fragment that merges into the matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixSuggestions {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub screens: BTreeMap<String, ScreenSuggestion>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, FeatureSuggestion>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub permissions: BTreeMap<String, Vec<String>>,
}

impl FixSuggestions {
    pub fn is_empty(&self) -> bool {
        self.screens.is_empty() && self.features.is_empty() && self.permissions.is_empty()
    }
}

/// Build `--fix` suggestions. Missing Masters and APIs have no placeholder:
/// where they belong is a design decision.
pub fn suggest_fixes(report: &ValidationReport) -> FixSuggestions {
    let mut fixes = FixSuggestions::default();

    for id in report.missing(IssueCategory::MissingScreens) {
        fixes.screens.insert(
            id.clone(),
            ScreenSuggestion {
                name: SCREEN_PLACEHOLDER.to_string(),
                masters: Vec::new(),
                apis: Vec::new(),
            },
        );
    }

    for id in report.missing(IssueCategory::MissingFeatures) {
        fixes.features.insert(
            id.clone(),
            FeatureSuggestion {
                title: FEATURE_PLACEHOLDER.to_string(),
                screens: Vec::new(),
                masters: Vec::new(),
                apis: Vec::new(),
                rules: Vec::new(),
            },
        );
    }

    for id in report.missing(IssueCategory::MissingPermissions) {
        fixes
            .permissions
            .insert(id.clone(), vec![ROLES_PLACEHOLDER.to_string()]);
    }

    fixes
}
