//! Structural scanning of semi-structured markdown specs.
//!
//! This is deliberately shallow: headings are tracked with a stack of open
//! section levels, and everything else is plain line and token matching.
//! No markdown AST is built.

use crate::types::{Identifier, Namespace};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

/// Any identifier-shaped token, prefix matched case-insensitively.
/// Alternation order matters: `SCR-` must be tried before `S-`.
static IDENTIFIER_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?i:API|SCR|TS|M|R|S|F)-[A-Za-z0-9_]+(?:-[A-Za-z0-9_]+)*")
        .expect("identifier token pattern is valid")
});

/// A declaration heading title: prefix (any case), then a name starting
/// with a letter.
static DECLARATION_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:API|SCR|TS|M|R|S|F)-[A-Za-z][A-Za-z0-9_-]*")
        .expect("declaration title pattern is valid")
});

/// Shallowest heading level that counts as a declaration (`### M-USER`).
const DECLARATION_LEVEL: usize = 3;

/// A parsed ATX heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: usize,
    pub title: String,
}

/// Parse a `#`..`######` heading line. Requires whitespace after the hashes
/// and a non-empty title.
pub fn parse_heading(line: &str) -> Option<Heading> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let title = rest.trim();
    if title.is_empty() {
        return None;
    }
    Some(Heading {
        level,
        title: title.to_string(),
    })
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// One heading and the line range it owns.
#[derive(Debug, Clone)]
pub struct Section {
    pub heading: Heading,
    /// Index of the heading line.
    pub line: usize,
    /// First line after the section (next heading of equal or shallower level, or EOF).
    pub end: usize,
    /// First line of the first sub-heading, or `end` when there is none.
    pub body_end: usize,
}

/// A markdown document split into lines and sections.
#[derive(Debug, Clone)]
pub struct Document<'a> {
    lines: Vec<&'a str>,
    sections: Vec<Section>,
}

impl<'a> Document<'a> {
    pub fn parse(text: &'a str) -> Document<'a> {
        let lines: Vec<&str> = text.lines().collect();
        let mut sections: Vec<Section> = Vec::new();
        // Indices into `sections` that are still open, shallowest first.
        let mut open: Vec<usize> = Vec::new();
        let mut in_fence = false;

        for (i, line) in lines.iter().enumerate() {
            if is_fence(line) {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            let Some(heading) = parse_heading(line) else {
                continue;
            };

            while let Some(&top) = open.last() {
                if sections[top].heading.level < heading.level {
                    break;
                }
                sections[top].end = i;
                sections[top].body_end = sections[top].body_end.min(i);
                open.pop();
            }
            if let Some(&parent) = open.last()
                && sections[parent].body_end > i
            {
                sections[parent].body_end = i;
            }

            sections.push(Section {
                heading,
                line: i,
                end: lines.len(),
                body_end: lines.len(),
            });
            open.push(sections.len() - 1);
        }

        Document { lines, sections }
    }

    /// First section whose heading title contains `name`, case-insensitively.
    pub fn find_section(&self, name: &str) -> Option<&Section> {
        let needle = name.to_lowercase();
        self.sections
            .iter()
            .find(|s| s.heading.title.to_lowercase().contains(&needle))
    }

    /// Non-empty lines owned by a section, excluding its heading line.
    pub fn section_lines(&self, section: &Section) -> Vec<&'a str> {
        self.lines[section.line + 1..section.end]
            .iter()
            .copied()
            .filter(|l| !l.trim().is_empty())
            .collect()
    }

    /// Lines of a section up to its first sub-heading.
    pub fn body_lines(&self, section: &Section) -> Vec<&'a str> {
        self.lines[section.line + 1..section.body_end].to_vec()
    }

    /// The first level-1 heading title, if any.
    pub fn title(&self) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.heading.level == 1)
            .map(|s| s.heading.title.as_str())
    }

    /// Sections nested strictly inside `scope`, or every section when `scope`
    /// is `None`.
    fn sections_within(&self, scope: Option<&Section>) -> impl Iterator<Item = &Section> {
        let (start, end) = scope.map_or((0, self.lines.len()), |s| (s.line + 1, s.end));
        self.sections
            .iter()
            .filter(move |s| s.line >= start && s.line < end)
    }
}

/// Return the non-empty lines owned by the first heading (any level) whose
/// title contains `heading_name`. Collection stops at the next heading of
/// equal or shallower level. Empty when no heading matches.
pub fn extract_section<'a>(text: &'a str, heading_name: &str) -> Vec<&'a str> {
    let doc = Document::parse(text);
    match doc.find_section(heading_name) {
        Some(section) => doc.section_lines(section),
        None => Vec::new(),
    }
}

/// All identifiers of the given namespace mentioned anywhere in `text`.
pub fn extract_identifiers(text: &str, namespace: Namespace) -> BTreeSet<Identifier> {
    IDENTIFIER_TOKEN
        .find_iter(text)
        .filter_map(|m| Identifier::parse(m.as_str()))
        .filter(|id| id.namespace() == namespace)
        .collect()
}

/// Identifiers declared as sub-headings (`### PREFIX-NAME`) of the given
/// namespace. When `section` is given, only headings nested inside the first
/// section matching that name count; a missing section yields nothing.
/// Order is first-seen, duplicates dropped.
pub fn extract_declarations(
    text: &str,
    section: Option<&str>,
    namespace: Namespace,
) -> Vec<Identifier> {
    let doc = Document::parse(text);
    let scope = match section {
        Some(name) => match doc.find_section(name) {
            Some(s) => Some(s),
            None => return Vec::new(),
        },
        None => None,
    };

    let mut seen = HashSet::new();
    doc.sections_within(scope)
        .filter(|s| s.heading.level >= DECLARATION_LEVEL)
        .filter_map(|s| DECLARATION_TITLE.find(&s.heading.title))
        .filter_map(|m| Identifier::parse(m.as_str().trim_end_matches(['-', '_'])))
        .filter(|id| id.namespace() == namespace)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// True for a table separator row such as `|---|:--:|`.
fn is_separator_row(cells: &[&str]) -> bool {
    cells
        .iter()
        .all(|c| c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')))
}

/// First-column cells of the table rows in a section's own body (before any
/// sub-heading). Header and separator rows are included only if they look
/// like data; callers filter by the identifier shape they expect.
pub fn extract_table_first_column(text: &str, heading_name: &str) -> Vec<String> {
    let doc = Document::parse(text);
    let Some(section) = doc.find_section(heading_name) else {
        return Vec::new();
    };

    doc.body_lines(section)
        .into_iter()
        .map(str::trim)
        .filter(|l| l.starts_with('|'))
        .filter_map(|row| {
            let cells: Vec<&str> = row
                .split('|')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect();
            if cells.is_empty() || is_separator_row(&cells) {
                return None;
            }
            Some(cells[0].to_string())
        })
        .collect()
}
