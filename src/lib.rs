//! Specmesh - cross-reference extraction and consistency checking for
//! structured spec corpora.
//!
//! This library scans screen and domain spec documents for declared
//! identifiers, indexes the cross-reference matrix that ties screens and
//! features to the Masters, APIs, and Rules they use, and detects drift
//! between the two.

pub mod graph;
pub mod markdown;
pub mod metadata;
pub mod report;
pub mod storage;
pub mod types;
pub mod validate;

pub use graph::{
    DomainDeclarations, ImpactReport, QueryKind, ReferenceIndex, References, Referrer,
    UnusedReport, Usage, analyze_impact, build_reference_index, extract_domain_declarations,
    find_references, find_unused,
};
pub use markdown::{
    Document, Section, extract_declarations, extract_identifiers, extract_section,
    extract_table_first_column,
};
pub use metadata::{SpecMetadata, SpecWarning, detect_spec_type, inspect_spec, parse_spec};
pub use report::{MatrixSummary, render_report};
pub use storage::{
    Project, ProjectConfig, StorageError, load_all_specs, load_matrix, read_document,
    report_path, write_report,
};
pub use types::{FeatureEntry, Identifier, Matrix, Namespace, ScreenEntry, SpecType};
pub use validate::{
    FixSuggestions, IssueCategory, ValidationReport, extract_matrix_inventory,
    extract_spec_inventory, suggest_fixes, validate_matrix,
};
