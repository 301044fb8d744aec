//! Spec document metadata: front-matter-like `Key: value` lines, title,
//! clarification markers, open questions, and spec type detection.

use crate::markdown::{Document, extract_section};
use crate::types::SpecType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Literal marker for an unresolved question inside a spec.
pub const CLARIFICATION_MARKER: &str = "[NEEDS CLARIFICATION]";

/// Heading under which open questions are listed.
pub const OPEN_QUESTIONS_HEADING: &str = "Open Questions";

static VISION_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^S-VISION-\d{3}$").expect("valid"));
static DOMAIN_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^S-DOMAIN-\d{3}$").expect("valid"));
static SCREEN_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^S-SCREEN-\d{3}$").expect("valid"));
static FEATURE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^S-[A-Z]+-\d{3}$").expect("valid"));
static FIX_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^F-[A-Z]+-\d{3}$").expect("valid"));
static TEST_SCENARIO_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^TS-[A-Z]+-\d{3}$").expect("valid"));

/// Metadata extracted from a single spec document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpecMetadata {
    pub path: PathBuf,
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub spec_type: SpecType,
    pub status: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub related_vision: Option<String>,
    pub related_domain: Option<String>,
    pub related_issue: Option<String>,
    pub needs_clarification: Vec<String>,
    pub open_questions: Vec<String>,
}

fn value_of(line: &str, key: &str) -> Option<Option<String>> {
    let value = line.strip_prefix(key)?.trim();
    Some((!value.is_empty()).then(|| value.to_string()))
}

/// Parse a spec document in a single pass over its lines.
///
/// Keys are matched exactly (case-sensitive) at the start of a trimmed line,
/// and a repeated key overwrites the earlier value. Lines carrying
/// [`CLARIFICATION_MARKER`] are collected trimmed, in document order, unless
/// the line is itself a key line.
pub fn parse_spec(text: &str, path: &Path) -> SpecMetadata {
    let mut spec = SpecMetadata {
        path: path.to_path_buf(),
        title: Document::parse(text).title().map(str::to_string),
        ..Default::default()
    };

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some(v) = value_of(trimmed, "Spec ID:") {
            spec.id = v;
        } else if let Some(v) = value_of(trimmed, "Status:") {
            spec.status = v.map(|s| s.to_lowercase());
        } else if let Some(v) = value_of(trimmed, "Author:") {
            spec.author = v;
        } else if let Some(v) =
            value_of(trimmed, "Date:").or_else(|| value_of(trimmed, "Created:"))
        {
            spec.date = v;
        } else if let Some(v) = value_of(trimmed, "Related Vision:") {
            spec.related_vision = v;
        } else if let Some(v) = value_of(trimmed, "Related Domain:") {
            spec.related_domain = v;
        } else if let Some(v) = value_of(trimmed, "Related Issue:")
            .or_else(|| value_of(trimmed, "Related Issue(s):"))
        {
            spec.related_issue = v;
        } else if trimmed.contains(CLARIFICATION_MARKER) {
            spec.needs_clarification.push(trimmed.to_string());
        }
    }

    spec.spec_type = detect_spec_type(spec.id.as_deref(), path);
    spec.open_questions = extract_section(text, OPEN_QUESTIONS_HEADING)
        .into_iter()
        .map(str::to_string)
        .collect();

    log::debug!(
        "parsed {} as {} (id: {:?}, {} clarification marker(s))",
        path.display(),
        spec.spec_type,
        spec.id,
        spec.needs_clarification.len()
    );

    spec
}

/// Detect the spec type from its declared ID, falling back to path heuristics.
pub fn detect_spec_type(id: Option<&str>, path: &Path) -> SpecType {
    if let Some(id) = id {
        let id = id.trim().to_uppercase();
        if id.starts_with("S-VISION") {
            return SpecType::Vision;
        }
        if id.starts_with("S-DOMAIN") {
            return SpecType::Domain;
        }
        if id.starts_with("S-SCREEN") {
            return SpecType::Screen;
        }
        if id.starts_with("F-") {
            return SpecType::Fix;
        }
        if id.starts_with("TS-") {
            return SpecType::TestScenario;
        }
        if id.starts_with("S-") {
            return SpecType::Feature;
        }
    }

    // Normalise Windows separators so one set of needles covers both styles.
    let lowered = path.to_string_lossy().to_lowercase().replace('\\', "/");
    let segments = [
        ("/vision/", SpecType::Vision),
        ("/domain/", SpecType::Domain),
        ("/screen/", SpecType::Screen),
        ("/fixes/", SpecType::Fix),
        ("/features/", SpecType::Feature),
    ];
    for (needle, spec_type) in segments {
        if lowered.contains(needle) {
            return spec_type;
        }
    }
    if lowered.contains("test-scenario") {
        return SpecType::TestScenario;
    }

    SpecType::Unknown
}

/// Check a spec ID against the pattern for its type. Unknown types always pass.
pub fn validate_spec_id(id: &str, spec_type: SpecType) -> bool {
    let pattern = match spec_type {
        SpecType::Vision => &*VISION_ID,
        SpecType::Domain => &*DOMAIN_ID,
        SpecType::Screen => &*SCREEN_ID,
        SpecType::Feature => &*FEATURE_ID,
        SpecType::Fix => &*FIX_ID,
        SpecType::TestScenario => &*TEST_SCENARIO_ID,
        SpecType::Unknown => return true,
    };
    pattern.is_match(id)
}

/// Something worth a reader's attention in a parsed spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecWarning {
    InvalidId { id: String, spec_type: SpecType },
    UnresolvedClarifications(usize),
    OpenQuestions(usize),
}

impl fmt::Display for SpecWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecWarning::InvalidId { id, spec_type } => {
                write!(f, "Spec ID '{}' does not match the {} pattern", id, spec_type)
            }
            SpecWarning::UnresolvedClarifications(n) => {
                write!(f, "{} unresolved {} marker(s)", n, CLARIFICATION_MARKER)
            }
            SpecWarning::OpenQuestions(n) => write!(f, "{} open question line(s)", n),
        }
    }
}

/// Collect warnings for a parsed spec.
pub fn inspect_spec(spec: &SpecMetadata) -> Vec<SpecWarning> {
    let mut warnings = Vec::new();

    if let Some(id) = &spec.id
        && !validate_spec_id(id, spec.spec_type)
    {
        warnings.push(SpecWarning::InvalidId {
            id: id.clone(),
            spec_type: spec.spec_type,
        });
    }
    if !spec.needs_clarification.is_empty() {
        warnings.push(SpecWarning::UnresolvedClarifications(
            spec.needs_clarification.len(),
        ));
    }
    if !spec.open_questions.is_empty() {
        warnings.push(SpecWarning::OpenQuestions(spec.open_questions.len()));
    }

    warnings
}
