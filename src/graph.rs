//! Reverse reference index over the matrix, and the queries built on it:
//! who uses an identifier, what a change to it affects, and which declared
//! domain elements nothing uses.
//!
//! The index is a pure function of the matrix and is rebuilt on every run.

use crate::markdown::extract_declarations;
use crate::types::{Identifier, Matrix, Namespace, canonicalize};
use serde::Serialize;
use std::collections::BTreeMap;

/// Section of the domain spec that owns API declarations.
pub const API_SECTION: &str = "API Contracts";
/// Section of the domain spec that owns Rule declarations.
pub const RULE_SECTION: &str = "Business Rules";

/// Screens and features referencing one identifier, keyed by their ID with
/// the display name or title as value. Keys are unique, so repeated
/// references collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub screens: BTreeMap<String, String>,
    pub features: BTreeMap<String, String>,
}

impl Usage {
    pub fn is_empty(&self) -> bool {
        self.screens.is_empty() && self.features.is_empty()
    }
}

/// Reverse reference index: canonical identifier -> usage, per namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceIndex {
    pub masters: BTreeMap<String, Usage>,
    pub apis: BTreeMap<String, Usage>,
    pub rules: BTreeMap<String, Usage>,
}

fn record_screen(map: &mut BTreeMap<String, Usage>, key: &str, id: &str, name: &str) {
    map.entry(canonicalize(key))
        .or_default()
        .screens
        .insert(id.to_string(), name.to_string());
}

fn record_feature(map: &mut BTreeMap<String, Usage>, key: &str, id: &str, title: &str) {
    map.entry(canonicalize(key))
        .or_default()
        .features
        .insert(id.to_string(), title.to_string());
}

fn warn_on_prefix(owner: &str, raw: &str, expected: Namespace) {
    if Identifier::parse(raw).map(|id| id.namespace()) != Some(expected) {
        log::warn!(
            "{} lists '{}' among its {} references, expected prefix {}",
            owner,
            raw,
            expected.label(),
            expected.prefix()
        );
    }
}

/// Build the reverse index in one pass over the matrix entries.
///
/// Entries are indexed under whatever list they appear in; a prefix that
/// does not match the list is logged, not rejected.
pub fn build_reference_index(matrix: &Matrix) -> ReferenceIndex {
    let mut index = ReferenceIndex::default();

    for (id, screen) in &matrix.screens {
        for m in &screen.masters {
            warn_on_prefix(id, m, Namespace::Master);
            record_screen(&mut index.masters, m, id, &screen.name);
        }
        for api in &screen.apis {
            warn_on_prefix(id, api, Namespace::Api);
            record_screen(&mut index.apis, api, id, &screen.name);
        }
    }

    for (id, feature) in &matrix.features {
        for m in &feature.masters {
            warn_on_prefix(id, m, Namespace::Master);
            record_feature(&mut index.masters, m, id, &feature.title);
        }
        for api in &feature.apis {
            warn_on_prefix(id, api, Namespace::Api);
            record_feature(&mut index.apis, api, id, &feature.title);
        }
        for rule in &feature.rules {
            warn_on_prefix(id, rule, Namespace::Rule);
            record_feature(&mut index.rules, rule, id, &feature.title);
        }
    }

    log::debug!(
        "reference index: {} masters, {} apis, {} rules",
        index.masters.len(),
        index.apis.len(),
        index.rules.len()
    );
    index
}

/// What namespace a query resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Master,
    Api,
    Rule,
    /// Prefix not Master/API/Rule: all three maps were searched.
    Element,
}

impl QueryKind {
    pub fn label(self) -> &'static str {
        match self {
            QueryKind::Master => "Master",
            QueryKind::Api => "API",
            QueryKind::Rule => "Rule",
            QueryKind::Element => "Element",
        }
    }
}

/// Result of a successful `refs` lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct References<'a> {
    pub identifier: String,
    pub kind: QueryKind,
    pub usage: &'a Usage,
}

/// Classify a query by prefix.
pub fn classify_query(query: &str) -> QueryKind {
    match Identifier::parse(query).map(|id| id.namespace()) {
        Some(Namespace::Master) => QueryKind::Master,
        Some(Namespace::Api) => QueryKind::Api,
        Some(Namespace::Rule) => QueryKind::Rule,
        _ => QueryKind::Element,
    }
}

/// Look up who references `query`. Case-insensitive. `None` means nothing in
/// the matrix references it.
pub fn find_references<'a>(index: &'a ReferenceIndex, query: &str) -> Option<References<'a>> {
    let key = canonicalize(query);
    let kind = classify_query(&key);
    let usage = match kind {
        QueryKind::Master => index.masters.get(&key),
        QueryKind::Api => index.apis.get(&key),
        QueryKind::Rule => index.rules.get(&key),
        QueryKind::Element => index
            .masters
            .get(&key)
            .or_else(|| index.apis.get(&key))
            .or_else(|| index.rules.get(&key)),
    }?;
    Some(References {
        identifier: key,
        kind,
        usage,
    })
}

/// A referencing screen or feature, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Referrer {
    pub id: String,
    pub label: String,
}

fn referrers(map: &BTreeMap<String, String>) -> Vec<Referrer> {
    map.iter()
        .map(|(id, label)| Referrer {
            id: id.clone(),
            label: label.clone(),
        })
        .collect()
}

/// Outcome of an impact analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactReport {
    pub identifier: String,
    pub kind: QueryKind,
    pub affected_features: Vec<Referrer>,
    pub affected_screens: Vec<Referrer>,
    /// Advisory follow-ups; not verified against anything.
    pub actions: Vec<String>,
}

impl ImpactReport {
    /// Feature impact is warning-level: those features need regression tests.
    pub fn has_feature_impact(&self) -> bool {
        !self.affected_features.is_empty()
    }
}

/// Analyse what changing `query` would affect. `None` means no impact.
pub fn analyze_impact(index: &ReferenceIndex, query: &str) -> Option<ImpactReport> {
    let refs = find_references(index, query)?;
    let affected_features = referrers(&refs.usage.features);
    let affected_screens = referrers(&refs.usage.screens);

    let mut actions = Vec::new();
    match refs.kind {
        QueryKind::Master => {
            actions.push("Check data migration requirements".to_string());
            actions.push("Update related API contracts if needed".to_string());
        }
        QueryKind::Api => {
            actions.push(format!(
                "Review request/response compatibility for consumers of {}",
                refs.identifier
            ));
            actions.push(format!(
                "Confirm permission matrix entries for {}",
                refs.identifier
            ));
        }
        QueryKind::Rule => {
            actions.push("Re-check validation logic in the affected features".to_string());
        }
        QueryKind::Element => {}
    }
    if !affected_features.is_empty() {
        let ids: Vec<&str> = affected_features.iter().map(|f| f.id.as_str()).collect();
        actions.push(format!("Run regression tests for: {}", ids.join(", ")));
    }
    if affected_features.is_empty() && !affected_screens.is_empty() {
        actions.push("Review affected screens for display changes".to_string());
    }

    Some(ImpactReport {
        identifier: refs.identifier,
        kind: refs.kind,
        affected_features,
        affected_screens,
        actions,
    })
}

/// Masters, APIs and Rules declared in the domain spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainDeclarations {
    pub masters: Vec<Identifier>,
    pub apis: Vec<Identifier>,
    pub rules: Vec<Identifier>,
}

/// Extract declarations from the domain spec: Masters from `### M-*`
/// headings anywhere, APIs only under "API Contracts", Rules only under
/// "Business Rules".
pub fn extract_domain_declarations(domain: &str) -> DomainDeclarations {
    DomainDeclarations {
        masters: extract_declarations(domain, None, Namespace::Master),
        apis: extract_declarations(domain, Some(API_SECTION), Namespace::Api),
        rules: extract_declarations(domain, Some(RULE_SECTION), Namespace::Rule),
    }
}

/// Declared elements that nothing in the matrix references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnusedReport {
    pub masters: Vec<String>,
    pub apis: Vec<String>,
    pub rules: Vec<String>,
    pub declared_masters: usize,
    pub declared_apis: usize,
    pub declared_rules: usize,
}

impl UnusedReport {
    pub fn is_empty(&self) -> bool {
        self.masters.is_empty() && self.apis.is_empty() && self.rules.is_empty()
    }
}

fn unused_in(declared: &[Identifier], used: &BTreeMap<String, Usage>) -> Vec<String> {
    declared
        .iter()
        .filter(|id| !used.contains_key(id.as_str()))
        .map(|id| id.to_string())
        .collect()
}

/// Set difference: declared minus referenced, per namespace.
pub fn find_unused(declared: &DomainDeclarations, index: &ReferenceIndex) -> UnusedReport {
    UnusedReport {
        masters: unused_in(&declared.masters, &index.masters),
        apis: unused_in(&declared.apis, &index.apis),
        rules: unused_in(&declared.rules, &index.rules),
        declared_masters: declared.masters.len(),
        declared_apis: declared.apis.len(),
        declared_rules: declared.rules.len(),
    }
}
