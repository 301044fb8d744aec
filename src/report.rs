//! Markdown report rendering for the cross-reference matrix.
//!
//! Output depends only on matrix content, never on JSON key order or the
//! clock, so regenerating from an unchanged matrix is byte-identical.

use crate::graph::{ReferenceIndex, Usage, build_reference_index};
use crate::types::Matrix;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Marker placed in permission cells where the role is granted.
const GRANTED: &str = "✓";
const EMPTY_CELL: &str = "-";

/// Counts shown at the end of the report and after `generate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatrixSummary {
    pub screens: usize,
    pub features: usize,
    pub permissions: usize,
    pub masters: usize,
    pub apis: usize,
    pub rules: usize,
}

impl MatrixSummary {
    pub fn of(matrix: &Matrix) -> MatrixSummary {
        MatrixSummary {
            screens: matrix.screens.len(),
            features: matrix.features.len(),
            permissions: matrix.permissions.len(),
            masters: matrix.referenced_masters().len(),
            apis: matrix.referenced_apis().len(),
            rules: matrix.referenced_rules().len(),
        }
    }
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        EMPTY_CELL.to_string()
    } else {
        cell(&items.join(", "))
    }
}

fn screen_table(matrix: &Matrix) -> String {
    if matrix.screens.is_empty() {
        return "*No screens defined*\n".to_string();
    }
    let mut md = String::from("| Screen ID | Name | Masters | APIs |\n");
    md.push_str("|-----------|------|---------|------|\n");
    for (id, s) in matrix.sorted_screens() {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            cell(id),
            cell(&s.name),
            join_or_dash(&s.masters),
            join_or_dash(&s.apis)
        ));
    }
    md
}

fn feature_table(matrix: &Matrix) -> String {
    if matrix.features.is_empty() {
        return "*No features defined*\n".to_string();
    }
    let mut md = String::from("| Feature ID | Title | Screens | Masters | APIs | Rules |\n");
    md.push_str("|------------|-------|---------|---------|------|-------|\n");
    for (id, f) in matrix.sorted_features() {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            cell(id),
            cell(&f.title),
            join_or_dash(&f.screens),
            join_or_dash(&f.masters),
            join_or_dash(&f.apis),
            join_or_dash(&f.rules)
        ));
    }
    md
}

fn ids_or_dash(map: &BTreeMap<String, String>) -> String {
    let ids: Vec<String> = map.keys().cloned().collect();
    join_or_dash(&ids)
}

fn reverse_table(usages: &BTreeMap<String, Usage>, column: &str, empty: &str) -> String {
    if usages.is_empty() {
        return format!("*{}*\n", empty);
    }
    let mut md = format!("| {} | Used by Screens | Used by Features |\n", column);
    md.push_str(&format!(
        "|{}|-----------------|------------------|\n",
        "-".repeat(column.len() + 2)
    ));
    for (id, usage) in usages {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            cell(id),
            ids_or_dash(&usage.screens),
            ids_or_dash(&usage.features)
        ));
    }
    md
}

fn permission_table(matrix: &Matrix) -> String {
    if matrix.permissions.is_empty() {
        return "*No permissions defined*\n".to_string();
    }

    let roles: Vec<&String> = matrix
        .permissions
        .values()
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if roles.is_empty() {
        let mut md = String::from("| API | Roles |\n|-----|-------|\n");
        for (api, _) in matrix.sorted_permissions() {
            md.push_str(&format!("| {} | {} |\n", cell(api), EMPTY_CELL));
        }
        return md;
    }

    let header: Vec<String> = roles.iter().map(|r| cell(r)).collect();
    let mut md = format!("| API | {} |\n", header.join(" | "));
    md.push_str(&format!(
        "|-----|{}|\n",
        roles.iter().map(|_| "---").collect::<Vec<_>>().join("|")
    ));
    for (api, granted) in matrix.sorted_permissions() {
        let cells: Vec<&str> = roles
            .iter()
            .map(|role| {
                if granted.contains(role) {
                    GRANTED
                } else {
                    EMPTY_CELL
                }
            })
            .collect();
        md.push_str(&format!("| {} | {} |\n", cell(api), cells.join(" | ")));
    }
    md
}

fn statistics_table(summary: &MatrixSummary) -> String {
    format!(
        "| Metric | Count |\n\
         |--------|-------|\n\
         | Total Screens | {} |\n\
         | Total Features | {} |\n\
         | Total Masters Referenced | {} |\n\
         | Total APIs Referenced | {} |\n\
         | Total Rules Referenced | {} |\n",
        summary.screens, summary.features, summary.masters, summary.apis, summary.rules
    )
}

/// Render the full report. `source` is the matrix path as shown to readers.
pub fn render_report(matrix: &Matrix, source: &str) -> String {
    let index: ReferenceIndex = build_reference_index(matrix);
    let summary = MatrixSummary::of(matrix);
    let file_name = source.rsplit(['/', '\\']).next().unwrap_or(source);

    let mut lines = Vec::new();
    lines.push("# Cross Reference Matrix".to_string());
    lines.push(String::new());
    lines.push(format!(
        "> ⚠️ **AUTO-GENERATED** from `{}`. Do not edit directly.",
        file_name
    ));
    lines.push(">".to_string());
    lines.push(format!("> Source: `{}`", source));
    lines.push("> Regenerate: `specmesh generate`".to_string());
    lines.push(String::new());

    let sections = [
        (
            "1. Screen → Domain",
            "Which Masters and APIs each screen uses.",
            screen_table(matrix),
        ),
        (
            "2. Feature → Domain",
            "Which Screens, Masters, APIs, and Rules each feature uses.",
            feature_table(matrix),
        ),
        (
            "3. Reverse Lookup: Master → Usage",
            "Find all screens and features that use a specific Master.",
            reverse_table(&index.masters, "Master", "No masters defined"),
        ),
        (
            "4. Reverse Lookup: API → Usage",
            "Find all screens and features that use a specific API.",
            reverse_table(&index.apis, "API", "No APIs defined"),
        ),
        (
            "5. Permission Matrix",
            "Role-based API permissions.",
            permission_table(matrix),
        ),
        ("6. Statistics", "", statistics_table(&summary)),
    ];

    for (heading, blurb, body) in sections {
        lines.push("---".to_string());
        lines.push(String::new());
        lines.push(format!("## {}", heading));
        lines.push(String::new());
        if !blurb.is_empty() {
            lines.push(blurb.to_string());
            lines.push(String::new());
        }
        lines.push(body);
    }

    lines.push("---".to_string());
    lines.push(String::new());
    lines.push(format!(
        "*This file is auto-generated. To update, edit `{}` and run `specmesh generate`.*",
        file_name
    ));
    lines.push(String::new());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(json: &str) -> Matrix {
        serde_json::from_str(json).unwrap()
    }

    const SAMPLE: &str = r#"{
        "screens": {
            "SCR-002": {"name": "Home", "masters": ["M-USER"], "apis": ["API-FEED"]},
            "SCR-001": {"name": "Login", "masters": ["M-USER"], "apis": ["API-LOGIN"]}
        },
        "features": {
            "S-AUTH-001": {"title": "Sign in", "screens": ["SCR-001"], "masters": ["M-USER"], "apis": ["API-LOGIN"], "rules": ["R-LOCKOUT"]}
        },
        "permissions": {
            "API-LOGIN": ["guest"],
            "API-FEED": ["admin", "member"]
        }
    }"#;

    #[test]
    fn test_render_is_idempotent() {
        let m = matrix(SAMPLE);
        assert_eq!(render_report(&m, "x.json"), render_report(&m, "x.json"));
    }

    #[test]
    fn test_render_independent_of_key_order() {
        let reordered = r#"{
            "permissions": {"API-FEED": ["member", "admin"], "API-LOGIN": ["guest"]},
            "features": {
                "S-AUTH-001": {"title": "Sign in", "screens": ["SCR-001"], "masters": ["M-USER"], "apis": ["API-LOGIN"], "rules": ["R-LOCKOUT"]}
            },
            "screens": {
                "SCR-001": {"name": "Login", "masters": ["M-USER"], "apis": ["API-LOGIN"]},
                "SCR-002": {"name": "Home", "masters": ["M-USER"], "apis": ["API-FEED"]}
            }
        }"#;
        assert_eq!(
            render_report(&matrix(SAMPLE), "x.json"),
            render_report(&matrix(reordered), "x.json")
        );
    }

    #[test]
    fn test_render_sorts_screens() {
        let md = render_report(&matrix(SAMPLE), "x.json");
        let first = md.find("| SCR-001 | Login").unwrap();
        let second = md.find("| SCR-002 | Home").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_render_reverse_lookup() {
        let md = render_report(&matrix(SAMPLE), "x.json");
        assert!(md.contains("| M-USER | SCR-001, SCR-002 | S-AUTH-001 |"));
        assert!(md.contains("| API-FEED | SCR-002 | - |"));
    }

    #[test]
    fn test_render_permission_matrix() {
        let md = render_report(&matrix(SAMPLE), "x.json");
        assert!(md.contains("| API | admin | guest | member |"));
        assert!(md.contains("| API-FEED | ✓ | - | ✓ |"));
        assert!(md.contains("| API-LOGIN | - | ✓ | - |"));
    }

    #[test]
    fn test_render_statistics() {
        let md = render_report(&matrix(SAMPLE), "x.json");
        assert!(md.contains("| Total Screens | 2 |"));
        assert!(md.contains("| Total Masters Referenced | 1 |"));
        assert!(md.contains("| Total APIs Referenced | 2 |"));
        assert!(md.contains("| Total Rules Referenced | 1 |"));
    }

    #[test]
    fn test_render_empty_matrix() {
        let md = render_report(&Matrix::default(), "dir/cross-reference.json");
        assert!(md.contains("AUTO-GENERATED** from `cross-reference.json`"));
        assert!(md.contains("*No screens defined*"));
        assert!(md.contains("*No features defined*"));
        assert!(md.contains("*No masters defined*"));
        assert!(md.contains("*No APIs defined*"));
        assert!(md.contains("*No permissions defined*"));
    }

    #[test]
    fn test_render_escapes_pipes() {
        let m = matrix(r#"{"screens": {"SCR-001": {"name": "A | B"}}}"#);
        let md = render_report(&m, "x.json");
        assert!(md.contains("| SCR-001 | A \\| B | - | - |"));
    }
}
