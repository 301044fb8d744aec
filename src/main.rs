//! Specmesh CLI - generate, validate, and query the cross-reference matrix.

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use specmesh::graph::classify_query;
use specmesh::types::canonicalize;
use specmesh::{
    IssueCategory, MatrixSummary, Project, QueryKind, SpecType, StorageError, analyze_impact,
    build_reference_index, extract_domain_declarations, extract_matrix_inventory,
    extract_spec_inventory, find_references, find_unused, inspect_spec, load_all_specs,
    load_matrix, read_document, render_report, report_path, suggest_fixes, validate_matrix,
    write_report,
};
use std::env;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "specmesh")]
#[command(about = "Cross-reference extraction and consistency checking for spec corpora")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the matrix JSON into its sibling markdown report
    Generate {
        /// Matrix JSON path (defaults to the project matrix)
        json_path: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Check that every declared screen, feature, Master and API is in the matrix
    Validate {
        /// Screen spec path
        #[arg(long)]
        screen: Option<PathBuf>,

        /// Domain spec path
        #[arg(long)]
        domain: Option<PathBuf>,

        /// Matrix JSON path
        #[arg(long)]
        matrix: Option<PathBuf>,

        /// Print placeholder matrix entries for missing screens, features and permissions
        #[arg(long)]
        fix: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// List the screens and features referencing an identifier
    Refs {
        /// Identifier (e.g., M-USER, API-LOGIN, R-LOCKOUT)
        identifier: String,

        /// Matrix JSON path
        #[arg(long)]
        matrix: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Show what changing an identifier would affect
    Impact {
        /// Identifier (e.g., M-USER, API-LOGIN, R-LOCKOUT)
        identifier: String,

        /// Matrix JSON path
        #[arg(long)]
        matrix: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// List Masters, APIs and Rules declared in the domain spec but never referenced
    Unused {
        /// Matrix JSON path
        #[arg(long)]
        matrix: Option<PathBuf>,

        /// Domain spec path
        #[arg(long)]
        domain: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// List spec documents with their metadata and warnings
    Specs {
        /// Spec directory (defaults to the project spec tree)
        dir: Option<PathBuf>,

        /// Only list specs of this type (vision, domain, screen, feature, fix, test-scenario)
        #[arg(short = 't', long = "type")]
        spec_type: Option<SpecType>,

        /// Exit non-zero when any spec has warnings
        #[arg(long)]
        strict: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
}

const BOX_WIDTH: usize = 60;

fn init_logging(verbose: bool, quiet: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn is_json(format: &str) -> bool {
    format == "json"
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Report a fatal input error and exit with code 2.
fn fail(format: &str, code: &str, detail: &str) -> ! {
    if is_json(format) {
        eprintln!("{}", json!({"error": code, "detail": detail}));
    } else {
        eprintln!("{}", format!("Error: {}", detail).red());
    }
    process::exit(2);
}

fn fail_storage(format: &str, err: &StorageError) -> ! {
    fail(format, err.code(), &err.to_string())
}

fn get_project(format: &str) -> (PathBuf, Project) {
    let cwd = match env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => fail(format, "io_error", &format!("Cannot read working directory: {}", e)),
    };
    match Project::discover(&cwd) {
        Ok(project) => (cwd, project),
        Err(e) => fail_storage(format, &e),
    }
}

/// Path as shown to users: relative to `base` when inside it.
fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn fit_line(line: &str) -> String {
    let inner = BOX_WIDTH - 1;
    let text = if line.chars().count() > BOX_WIDTH - 2 {
        let head: String = line.chars().take(BOX_WIDTH - 5).collect();
        format!("{}...", head)
    } else {
        line.to_string()
    };
    format!("{:<width$}", text, width = inner)
}

fn print_box(title: &str, lines: &[String]) {
    let border = "─".repeat(BOX_WIDTH);
    println!("┌{}┐", border);
    println!("│ {}│", fit_line(title).bold());
    println!("├{}┤", border);
    for line in lines {
        println!("│ {}│", fit_line(line));
    }
    println!("└{}┘", border);
}

fn trim_trailing_blank(lines: &mut Vec<String>) {
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
}

fn run_generate(json_path: Option<PathBuf>, format: &str) {
    let (cwd, project) = get_project(format);
    let matrix_path = project.matrix_path(json_path.as_deref());
    let matrix = match load_matrix(&matrix_path) {
        Ok(m) => m,
        Err(e) => fail_storage(format, &e),
    };

    let md_path = report_path(&matrix_path);
    let source = display_path(&matrix_path, &project.root).replace('\\', "/");
    if let Err(e) = write_report(&md_path, &render_report(&matrix, &source)) {
        fail_storage(format, &e);
    }

    let summary = MatrixSummary::of(&matrix);
    if is_json(format) {
        print_json(&json!({
            "report": md_path.display().to_string(),
            "screens": summary.screens,
            "features": summary.features,
            "permissions": summary.permissions,
        }));
        return;
    }

    println!("Reading: {}", display_path(&matrix_path, &cwd));
    println!(
        "{}",
        format!("Generated: {}", display_path(&md_path, &cwd)).green()
    );
    println!();
    println!("{}", "=== Summary ===".bold());
    println!("Screens: {}", summary.screens);
    println!("Features: {}", summary.features);
    println!("Permissions: {} APIs", summary.permissions);
}

fn run_validate(
    screen: Option<PathBuf>,
    domain: Option<PathBuf>,
    matrix: Option<PathBuf>,
    fix: bool,
    format: &str,
) {
    let (cwd, project) = get_project(format);
    let screen_path = project.screen_path(screen.as_deref());
    let domain_path = project.domain_path(domain.as_deref());
    let matrix_path = project.matrix_path(matrix.as_deref());

    let screen_doc = read_document(&screen_path).unwrap_or_else(|e| fail_storage(format, &e));
    let domain_doc = read_document(&domain_path).unwrap_or_else(|e| fail_storage(format, &e));
    let matrix = load_matrix(&matrix_path).unwrap_or_else(|e| fail_storage(format, &e));

    let report = validate_matrix(
        &extract_spec_inventory(&screen_doc, &domain_doc),
        &extract_matrix_inventory(&matrix),
    );
    let suggestions = (fix && !report.passed()).then(|| suggest_fixes(&report));

    if is_json(format) {
        print_json(&json!({
            "passed": report.passed(),
            "declared": report.declared,
            "indexed": report.indexed,
            "issues": report.issues,
            "suggestions": suggestions,
        }));
        if !report.passed() {
            process::exit(1);
        }
        return;
    }

    println!("{}", "=== Cross-Reference Matrix Validator ===".bold());
    println!();
    println!("  Screen: {}", display_path(&screen_path, &cwd));
    println!("  Domain: {}", display_path(&domain_path, &cwd));
    println!("  Matrix: {}", display_path(&matrix_path, &cwd));
    println!();
    println!("Declared in Spec:");
    println!("  Screens: {}", report.declared.screens);
    println!("  Masters: {}", report.declared.masters);
    println!("  APIs: {}", report.declared.apis);
    println!("  Features: {}", report.declared.features);
    println!();
    println!("Indexed in Matrix:");
    println!("  Screens: {}", report.indexed.screens);
    println!("  Features: {}", report.indexed.features);
    println!("  Masters referenced: {}", report.indexed.masters);
    println!("  APIs referenced: {}", report.indexed.apis);
    println!();

    if report.passed() {
        println!("{}", "All Spec items are reflected in Matrix.".green());
        println!("{}", "Validation PASSED.".green().bold());
        return;
    }

    for category in IssueCategory::ALL {
        let missing = report.missing(category);
        if missing.is_empty() {
            continue;
        }
        println!("{}", format!("{}:", category).yellow());
        for id in missing {
            println!("  - {}", id);
        }
        println!();
    }

    println!("---");
    println!("{}", "Validation FAILED - Matrix is incomplete.".red().bold());
    println!();
    println!("Recommendations:");
    println!("  1. Update the matrix to add the missing items");
    println!("  2. Use --fix to see suggested additions");

    if let Some(fixes) = suggestions {
        println!();
        println!("{}", "=== Suggested Additions (--fix) ===".bold());
        println!();
        println!(
            "{}",
            serde_json::to_string_pretty(&fixes).unwrap_or_else(|_| "{}".to_string())
        );
        println!();
        println!("Merge these into the matrix JSON and fill in the TODOs.");
    }

    process::exit(1);
}

fn run_refs(identifier: &str, matrix: Option<PathBuf>, format: &str) {
    let (_, project) = get_project(format);
    let matrix_path = project.matrix_path(matrix.as_deref());
    let matrix = load_matrix(&matrix_path).unwrap_or_else(|e| fail_storage(format, &e));
    let index = build_reference_index(&matrix);
    let found = find_references(&index, identifier);

    if is_json(format) {
        let (id, kind, screens, features): (String, QueryKind, Vec<_>, Vec<_>) = match &found {
            Some(refs) => (
                refs.identifier.clone(),
                refs.kind,
                refs.usage
                    .screens
                    .iter()
                    .map(|(id, name)| json!({"id": id, "name": name}))
                    .collect(),
                refs.usage
                    .features
                    .iter()
                    .map(|(id, title)| json!({"id": id, "title": title}))
                    .collect(),
            ),
            None => (
                canonicalize(identifier),
                classify_query(identifier),
                Vec::new(),
                Vec::new(),
            ),
        };
        print_json(&json!({
            "identifier": id,
            "kind": kind,
            "found": found.is_some(),
            "screens": screens,
            "features": features,
        }));
        if found.is_none() {
            process::exit(1);
        }
        return;
    }

    let Some(refs) = found else {
        println!();
        println!("{}", format!("No references found for: {}", identifier).yellow());
        println!();
        println!("Possible reasons:");
        println!("  - Element does not exist in Matrix");
        println!("  - Element is not referenced by any Screen/Feature");
        println!();
        println!("Try: specmesh unused");
        process::exit(1);
    };

    let mut lines = Vec::new();
    if !refs.usage.screens.is_empty() {
        lines.push("Screens:".to_string());
        for (id, name) in &refs.usage.screens {
            lines.push(format!("  {} ({})", id, name));
        }
        lines.push(String::new());
    }
    if !refs.usage.features.is_empty() {
        lines.push("Features:".to_string());
        for (id, title) in &refs.usage.features {
            lines.push(format!("  {} ({})", id, title));
        }
    }
    trim_trailing_blank(&mut lines);

    print_box(
        &format!("References to {} ({})", refs.identifier, refs.kind.label()),
        &lines,
    );
    println!();
    println!(
        "Total: {} screens, {} features",
        refs.usage.screens.len(),
        refs.usage.features.len()
    );
}

fn run_impact(identifier: &str, matrix: Option<PathBuf>, format: &str) {
    let (_, project) = get_project(format);
    let matrix_path = project.matrix_path(matrix.as_deref());
    let matrix = load_matrix(&matrix_path).unwrap_or_else(|e| fail_storage(format, &e));
    let index = build_reference_index(&matrix);
    let report = analyze_impact(&index, identifier);
    let feature_impact = report.as_ref().is_some_and(|r| r.has_feature_impact());

    if is_json(format) {
        let value = match &report {
            Some(r) => json!({
                "identifier": r.identifier,
                "kind": r.kind,
                "impact": true,
                "feature_impact": r.has_feature_impact(),
                "affected_features": r.affected_features
                    .iter()
                    .map(|f| json!({"id": f.id, "title": f.label}))
                    .collect::<Vec<_>>(),
                "affected_screens": r.affected_screens
                    .iter()
                    .map(|s| json!({"id": s.id, "name": s.label}))
                    .collect::<Vec<_>>(),
                "actions": r.actions,
            }),
            None => json!({
                "identifier": canonicalize(identifier),
                "kind": classify_query(identifier),
                "impact": false,
                "feature_impact": false,
                "affected_features": [],
                "affected_screens": [],
                "actions": [],
            }),
        };
        print_json(&value);
        if feature_impact {
            process::exit(1);
        }
        return;
    }

    let Some(report) = report else {
        println!();
        println!("No impact analysis available for: {}", identifier);
        println!("Element is not referenced in the Matrix.");
        return;
    };

    let mut lines = Vec::new();
    if report.has_feature_impact() {
        lines.push(format!(
            "⚠ WARNING: {} Feature(s) will be affected",
            report.affected_features.len()
        ));
        lines.push(String::new());
        lines.push("Affected Features:".to_string());
        for f in &report.affected_features {
            lines.push(format!("  {} ({}) → regression test recommended", f.id, f.label));
        }
        lines.push(String::new());
    }
    if !report.affected_screens.is_empty() {
        let ids: Vec<&str> = report.affected_screens.iter().map(|s| s.id.as_str()).collect();
        lines.push("Affected Screens:".to_string());
        lines.push(format!("  {}", ids.join(", ")));
        lines.push(String::new());
    }
    if !report.actions.is_empty() {
        lines.push("Required Actions:".to_string());
        for action in &report.actions {
            lines.push(format!("  - {}", action));
        }
    }
    trim_trailing_blank(&mut lines);

    print_box(&format!("Impact Analysis: {}", report.identifier), &lines);

    if feature_impact {
        process::exit(1);
    }
}

fn run_unused(matrix: Option<PathBuf>, domain: Option<PathBuf>, format: &str) {
    let (_, project) = get_project(format);
    let matrix_path = project.matrix_path(matrix.as_deref());
    let domain_path = project.domain_path(domain.as_deref());

    let matrix = load_matrix(&matrix_path).unwrap_or_else(|e| fail_storage(format, &e));
    let domain_doc = read_document(&domain_path).unwrap_or_else(|e| fail_storage(format, &e));

    let declared = extract_domain_declarations(&domain_doc);
    let report = find_unused(&declared, &build_reference_index(&matrix));

    if is_json(format) {
        print_json(&json!({
            "masters": report.masters,
            "apis": report.apis,
            "rules": report.rules,
            "declared": {
                "masters": report.declared_masters,
                "apis": report.declared_apis,
                "rules": report.declared_rules,
            },
        }));
        if !report.is_empty() {
            process::exit(1);
        }
        return;
    }

    println!("{}", "=== Unused Domain Elements ===".bold());
    println!();

    let groups = [
        ("Unused Masters (not referenced by any Screen/Feature):", &report.masters),
        ("Unused APIs (not referenced by any Screen/Feature):", &report.apis),
        ("Unused Rules (not referenced by any Feature):", &report.rules),
    ];
    for (heading, ids) in groups {
        if ids.is_empty() {
            continue;
        }
        println!("{}", heading.yellow());
        for id in ids {
            println!("  - {}", id);
        }
        println!();
    }

    if report.is_empty() {
        println!("{}", "All Domain elements are referenced. ✓".green());
        println!();
    }

    println!("---");
    println!(
        "Total in Spec: {} Masters, {} APIs, {} Rules",
        report.declared_masters, report.declared_apis, report.declared_rules
    );
    println!(
        "Unused: {} Masters, {} APIs, {} Rules",
        report.masters.len(),
        report.apis.len(),
        report.rules.len()
    );

    if !report.is_empty() {
        process::exit(1);
    }
}

fn run_specs(dir: Option<PathBuf>, spec_type: Option<SpecType>, strict: bool, format: &str) {
    let (cwd, project) = get_project(format);
    let specs_dir = project.specs_dir(dir.as_deref());
    let mut specs = load_all_specs(&specs_dir).unwrap_or_else(|e| fail_storage(format, &e));
    if let Some(wanted) = spec_type {
        specs.retain(|s| s.spec_type == wanted);
    }

    let inspected: Vec<_> = specs
        .iter()
        .map(|spec| (spec, inspect_spec(spec)))
        .collect();
    let warning_count: usize = inspected.iter().map(|(_, w)| w.len()).sum();

    if is_json(format) {
        let entries: Vec<_> = inspected
            .iter()
            .map(|(spec, warnings)| {
                let mut value = serde_json::to_value(spec).unwrap_or_else(|_| json!({}));
                value["path"] = json!(display_path(&spec.path, &cwd));
                value["warnings"] =
                    json!(warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>());
                value
            })
            .collect();
        print_json(&json!({
            "count": entries.len(),
            "warnings": warning_count,
            "specs": entries,
        }));
    } else {
        if specs.is_empty() {
            println!("No specs found in {}", display_path(&specs_dir, &cwd));
            return;
        }

        for (spec, warnings) in &inspected {
            let id = spec.id.as_deref().unwrap_or("-");
            let status = spec.status.as_deref().unwrap_or("-");
            let title = spec.title.as_deref().unwrap_or("(untitled)");
            println!(
                "{} [{}] {} {}",
                id.cyan(),
                spec.spec_type,
                status.dimmed(),
                title
            );
            println!("  {}", display_path(&spec.path, &cwd).dimmed());
            if !spec.needs_clarification.is_empty() {
                println!("  clarifications: {}", spec.needs_clarification.len());
            }
            for warning in warnings {
                println!("  {}", format!("! {}", warning).yellow());
            }
        }
        println!();
        println!(
            "{}",
            format!("{} spec(s), {} warning(s)", specs.len(), warning_count).bold()
        );
    }

    if strict && warning_count > 0 {
        process::exit(1);
    }
}

fn main() {
    // Usage errors exit 1; 2 is reserved for missing or unreadable input.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                process::exit(1);
            }
        },
    };
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Generate { json_path, format } => run_generate(json_path, &format),
        Commands::Validate {
            screen,
            domain,
            matrix,
            fix,
            format,
        } => run_validate(screen, domain, matrix, fix, &format),
        Commands::Refs {
            identifier,
            matrix,
            format,
        } => run_refs(&identifier, matrix, &format),
        Commands::Impact {
            identifier,
            matrix,
            format,
        } => run_impact(&identifier, matrix, &format),
        Commands::Unused {
            matrix,
            domain,
            format,
        } => run_unused(matrix, domain, &format),
        Commands::Specs {
            dir,
            spec_type,
            strict,
            format,
        } => run_specs(dir, spec_type, strict, &format),
    }
}
