//! End-to-end tests for the specmesh CLI against a throwaway project tree.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SCREEN: &str = include_str!("fixtures/screen.md");
const DOMAIN: &str = include_str!("fixtures/domain.md");
const MATRIX: &str = include_str!("fixtures/matrix.json");
const FEATURE: &str = include_str!("fixtures/feature.md");

const MATRIX_PATH: &str = ".specify/specs/overview/matrix/cross-reference.json";
const REPORT_PATH: &str = ".specify/specs/overview/matrix/cross-reference.md";
const SCREEN_PATH: &str = ".specify/specs/overview/screen/spec.md";
const DOMAIN_PATH: &str = ".specify/specs/overview/domain/spec.md";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A project with consistent screen spec, domain spec and matrix.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), SCREEN_PATH, SCREEN);
    write(dir.path(), DOMAIN_PATH, DOMAIN);
    write(dir.path(), MATRIX_PATH, MATRIX);
    dir
}

fn run_json(dir: &TempDir, args: &[&str]) -> (Option<i32>, serde_json::Value) {
    let output = cargo_bin_cmd!("specmesh")
        .args(args)
        .args(["--format", "json"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    let json = serde_json::from_slice(&output.stdout).expect("Should be valid JSON");
    (output.status.code(), json)
}

// --- generate ---

#[test]
fn test_generate_writes_report_and_summary() {
    let dir = project();
    cargo_bin_cmd!("specmesh")
        .arg("generate")
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Screens: 2"))
        .stdout(predicate::str::contains("Permissions: 2 APIs"));

    let report = fs::read_to_string(dir.path().join(REPORT_PATH)).unwrap();
    assert!(report.starts_with("# Cross Reference Matrix"));
    assert!(report.contains("Do not edit directly"));
    assert!(report.contains("| M-USER | SCR-001, SCR-002 | S-AUTH-001, S-ORDER-001 |"));
}

#[test]
fn test_generate_is_idempotent() {
    let dir = project();
    cargo_bin_cmd!("specmesh")
        .arg("generate")
        .current_dir(dir.path())
        .assert()
        .success();
    let first = fs::read(dir.path().join(REPORT_PATH)).unwrap();

    cargo_bin_cmd!("specmesh")
        .arg("generate")
        .current_dir(dir.path())
        .assert()
        .success();
    let second = fs::read(dir.path().join(REPORT_PATH)).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_generate_explicit_path() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "custom/matrix.json", MATRIX);

    let (code, json) = run_json(&dir, &["generate", "custom/matrix.json"]);
    assert_eq!(code, Some(0));
    assert_eq!(json["screens"], 2);
    assert_eq!(json["features"], 2);
    assert!(dir.path().join("custom/matrix.md").exists());
}

#[test]
fn test_generate_missing_matrix_exits_2() {
    let dir = TempDir::new().unwrap();
    cargo_bin_cmd!("specmesh")
        .arg("generate")
        .current_dir(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_generate_malformed_matrix_exits_2() {
    let dir = project();
    write(dir.path(), MATRIX_PATH, "{ not json");

    let output = cargo_bin_cmd!("specmesh")
        .args(["generate", "--format", "json"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let err: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["error"], "invalid_json");
}

// --- validate ---

#[test]
fn test_validate_consistent_project_passes() {
    let dir = project();
    cargo_bin_cmd!("specmesh")
        .arg("validate")
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation PASSED."));
}

#[test]
fn test_validate_reports_missing_screen() {
    let dir = project();
    let matrix = MATRIX.replace("\"SCR-002\": {", "\"SCR-OLD\": {");
    write(dir.path(), MATRIX_PATH, &matrix);

    cargo_bin_cmd!("specmesh")
        .arg("validate")
        .current_dir(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Missing Screens in Matrix"))
        .stdout(predicate::str::contains("  - SCR-002"));
}

#[test]
fn test_validate_missing_permission_fix_fragment() {
    let dir = project();
    let matrix = MATRIX.replace(
        "\"API-ORDER-LIST\": [\"member\", \"admin\"]",
        "\"API-UNRELATED\": []",
    );
    write(dir.path(), MATRIX_PATH, &matrix);

    let (code, json) = run_json(&dir, &["validate", "--fix"]);
    assert_eq!(code, Some(1));
    assert_eq!(json["passed"], false);
    assert_eq!(
        json["issues"],
        serde_json::json!({"missing_permissions": ["API-ORDER-LIST"]})
    );
    assert_eq!(
        json["suggestions"],
        serde_json::json!({"permissions": {"API-ORDER-LIST": ["[TODO: Add roles]"]}})
    );
}

#[test]
fn test_validate_fix_text_mode_prints_fragment() {
    let dir = project();
    let matrix = MATRIX.replace(
        "\"API-ORDER-LIST\": [\"member\", \"admin\"]",
        "\"API-UNRELATED\": []",
    );
    write(dir.path(), MATRIX_PATH, &matrix);

    cargo_bin_cmd!("specmesh")
        .args(["validate", "--fix"])
        .current_dir(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("APIs without permissions in Matrix"))
        .stdout(predicate::str::contains("\"[TODO: Add roles]\""));
}

#[test]
fn test_validate_missing_domain_exits_2() {
    let dir = project();
    fs::remove_file(dir.path().join(DOMAIN_PATH)).unwrap();

    cargo_bin_cmd!("specmesh")
        .arg("validate")
        .current_dir(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("domain"));
}

#[test]
fn test_validate_missing_matrix_exits_2() {
    let dir = project();
    cargo_bin_cmd!("specmesh")
        .args(["validate", "--matrix", "nowhere.json"])
        .current_dir(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nowhere.json"));
}

#[test]
fn test_validate_uses_legacy_domain_location() {
    let dir = project();
    fs::remove_file(dir.path().join(DOMAIN_PATH)).unwrap();
    write(dir.path(), ".specify/specs/domain/spec.md", DOMAIN);

    cargo_bin_cmd!("specmesh")
        .arg("validate")
        .current_dir(dir.path())
        .assert()
        .success();
}

#[test]
fn test_config_file_overrides_matrix_location() {
    let dir = project();
    fs::remove_file(dir.path().join(MATRIX_PATH)).unwrap();
    write(dir.path(), "data/xref.json", MATRIX);
    write(dir.path(), ".specify/specmesh.yaml", "matrix: data/xref.json\n");

    cargo_bin_cmd!("specmesh")
        .arg("validate")
        .current_dir(dir.path())
        .assert()
        .success();
}

// --- refs ---

#[test]
fn test_refs_single_screen() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        MATRIX_PATH,
        r#"{"screens":{"SCR-001":{"name":"Login","masters":["M-USER"],"apis":["API-LOGIN"]}},"features":{},"permissions":{}}"#,
    );

    cargo_bin_cmd!("specmesh")
        .args(["refs", "M-USER"])
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("SCR-001 (Login)"))
        .stdout(predicate::str::contains("Total: 1 screens, 0 features"));
}

#[test]
fn test_refs_is_case_insensitive() {
    let dir = project();
    let (upper_code, upper) = run_json(&dir, &["refs", "M-USER"]);
    let (lower_code, lower) = run_json(&dir, &["refs", "m-user"]);

    assert_eq!(upper_code, Some(0));
    assert_eq!(lower_code, Some(0));
    assert_eq!(upper, lower);
    assert_eq!(upper["kind"], "master");
    assert_eq!(upper["screens"].as_array().unwrap().len(), 2);
}

#[test]
fn test_refs_not_found_exits_1() {
    let dir = project();
    cargo_bin_cmd!("specmesh")
        .args(["refs", "M-GHOST"])
        .current_dir(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("No references found for: M-GHOST"))
        .stdout(predicate::str::contains("specmesh unused"));
}

#[test]
fn test_usage_error_exits_1() {
    let dir = project();
    cargo_bin_cmd!("specmesh")
        .arg("refs")
        .current_dir(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IDENTIFIER"));

    cargo_bin_cmd!("specmesh")
        .args(["generate", "--format", "yaml"])
        .current_dir(dir.path())
        .assert()
        .code(1);

    cargo_bin_cmd!("specmesh")
        .current_dir(dir.path())
        .assert()
        .code(1);
}

#[test]
fn test_help_exits_0() {
    cargo_bin_cmd!("specmesh")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("refs"));
}

#[test]
fn test_refs_tolerates_null_matrix_fields() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        MATRIX_PATH,
        r#"{"screens":null,"features":{"S-AUTH-001":{"title":null,"masters":["M-USER"],"apis":null}},"permissions":null}"#,
    );

    let (code, json) = run_json(&dir, &["refs", "M-USER"]);
    assert_eq!(code, Some(0));
    assert_eq!(json["features"].as_array().unwrap().len(), 1);
}

#[test]
fn test_refs_missing_matrix_exits_2() {
    let dir = TempDir::new().unwrap();
    cargo_bin_cmd!("specmesh")
        .args(["refs", "M-USER"])
        .current_dir(dir.path())
        .assert()
        .code(2);
}

// --- impact ---

#[test]
fn test_impact_with_feature_impact_exits_1() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        MATRIX_PATH,
        r#"{
            "screens": {"SCR-001": {"name": "Login", "masters": ["M-USER"]}},
            "features": {
                "S-AUTH-001": {"title": "Sign in", "masters": ["M-USER"]},
                "S-PROFILE-001": {"title": "Profile", "masters": ["m-user"]}
            }
        }"#,
    );

    cargo_bin_cmd!("specmesh")
        .args(["impact", "M-USER"])
        .current_dir(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("2 Feature(s) will be affected"))
        .stdout(predicate::str::contains("S-AUTH-001 (Sign in)"))
        .stdout(predicate::str::contains("S-PROFILE-001 (Profile)"))
        .stdout(predicate::str::contains("Run regression tests for: S-AUTH-001, S-PROFILE-001"))
        .stdout(predicate::str::contains("Affected Screens:"));
}

#[test]
fn test_impact_screens_only_exits_0() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        MATRIX_PATH,
        r#"{"screens": {"SCR-001": {"name": "Login", "apis": ["API-LOGIN"]}}}"#,
    );

    let (code, json) = run_json(&dir, &["impact", "api-login"]);
    assert_eq!(code, Some(0));
    assert_eq!(json["impact"], true);
    assert_eq!(json["feature_impact"], false);
    assert_eq!(json["affected_screens"][0]["id"], "SCR-001");
}

#[test]
fn test_impact_unreferenced_exits_0() {
    let dir = project();
    cargo_bin_cmd!("specmesh")
        .args(["impact", "M-GHOST"])
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("not referenced in the Matrix"));
}

// --- unused ---

#[test]
fn test_unused_reports_unreferenced_master() {
    let dir = project();
    write(
        dir.path(),
        MATRIX_PATH,
        r#"{
            "screens": {"SCR-001": {"name": "Login", "masters": ["M-USER"], "apis": ["API-LOGIN", "API-ORDER-LIST"]}},
            "features": {"S-AUTH-001": {"title": "Sign in", "rules": ["R-LOCKOUT"]}}
        }"#,
    );

    let (code, json) = run_json(&dir, &["unused"]);
    assert_eq!(code, Some(1));
    assert_eq!(json["masters"], serde_json::json!(["M-ORDER"]));
    assert_eq!(json["apis"], serde_json::json!([]));
    assert_eq!(json["rules"], serde_json::json!([]));
    assert_eq!(json["declared"]["masters"], 2);
}

#[test]
fn test_unused_ignores_rules_outside_business_rules() {
    let dir = project();
    cargo_bin_cmd!("specmesh")
        .arg("unused")
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("All Domain elements are referenced."))
        .stdout(predicate::str::contains("R-PROSE-ONLY").not());
}

#[test]
fn test_unused_missing_domain_exits_2() {
    let dir = project();
    cargo_bin_cmd!("specmesh")
        .args(["unused", "--domain", "missing.md"])
        .current_dir(dir.path())
        .assert()
        .code(2);
}

// --- specs ---

#[test]
fn test_specs_lists_metadata_and_warnings() {
    let dir = project();
    write(dir.path(), ".specify/specs/features/auth/spec.md", FEATURE);

    let (code, json) = run_json(&dir, &["specs"]);
    assert_eq!(code, Some(0));
    assert_eq!(json["count"], 3);

    let specs = json["specs"].as_array().unwrap();
    let feature = specs
        .iter()
        .find(|s| s["id"] == "S-AUTH-001")
        .expect("feature spec listed");
    assert_eq!(feature["type"], "feature");
    assert_eq!(feature["status"], "draft");
    assert_eq!(feature["title"], "Feature: Sign in");
    assert_eq!(feature["warnings"].as_array().unwrap().len(), 2);
}

#[test]
fn test_specs_type_filter_accepts_aliases() {
    let dir = project();
    write(dir.path(), ".specify/specs/features/auth/spec.md", FEATURE);

    let (code, json) = run_json(&dir, &["specs", "--type", "overview"]);
    assert_eq!(code, Some(0));
    assert_eq!(json["count"], 1);
    assert_eq!(json["specs"][0]["id"], "S-DOMAIN-001");
}

#[test]
fn test_specs_strict_fails_on_warnings() {
    let dir = project();
    write(
        dir.path(),
        ".specify/specs/features/bad/spec.md",
        "# Feature: Bad\n\nSpec ID: S-BAD-1\n",
    );

    cargo_bin_cmd!("specmesh")
        .arg("specs")
        .current_dir(dir.path())
        .assert()
        .success();

    cargo_bin_cmd!("specmesh")
        .args(["specs", "--strict"])
        .current_dir(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("S-BAD-1"));
}

#[test]
fn test_specs_skips_hidden_directories() {
    let dir = project();
    write(dir.path(), ".specify/specs/.drafts/spec.md", "Spec ID: S-BAD-1\n");

    let (code, json) = run_json(&dir, &["specs", "--strict"]);
    assert_eq!(code, Some(0));
    assert_eq!(json["count"], 2);
}

#[test]
fn test_specs_missing_dir_exits_2() {
    let dir = TempDir::new().unwrap();
    cargo_bin_cmd!("specmesh")
        .args(["specs", "no-such-dir"])
        .current_dir(dir.path())
        .assert()
        .code(2);
}
