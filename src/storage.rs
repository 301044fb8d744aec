//! File access for spec documents, the matrix JSON, and the generated report.
//!
//! Inputs are read fresh on every call; nothing is cached between runs.

use crate::metadata::{SpecMetadata, parse_spec};
use crate::types::Matrix;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const SPECIFY_DIR: &str = ".specify";
pub const CONFIG_FILE: &str = ".specify/specmesh.yaml";

pub const DEFAULT_MATRIX_PATH: &str = ".specify/specs/overview/matrix/cross-reference.json";
pub const DEFAULT_SCREEN_PATH: &str = ".specify/specs/overview/screen/spec.md";
pub const DEFAULT_DOMAIN_PATH: &str = ".specify/specs/overview/domain/spec.md";
pub const DEFAULT_SPECS_DIR: &str = ".specify/specs";

const LEGACY_MATRIX_PATHS: &[&str] = &[".specify/matrix/cross-reference.json"];
const LEGACY_SCREEN_PATHS: &[&str] = &[".specify/specs/screen/spec.md"];
const LEGACY_DOMAIN_PATHS: &[&str] = &[
    ".specify/specs/domain/spec.md",
    ".specify/specs/overview/spec.md",
];

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl StorageError {
    /// Stable machine-readable code for JSON error output.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::NotFound(_) => "not_found",
            StorageError::Io { .. } => "io_error",
            StorageError::Json { .. } => "invalid_json",
            StorageError::Config { .. } => "invalid_config",
        }
    }
}

/// Optional per-project overrides read from `.specify/specmesh.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub matrix: Option<PathBuf>,
    #[serde(default)]
    pub screen: Option<PathBuf>,
    #[serde(default)]
    pub domain: Option<PathBuf>,
    #[serde(default)]
    pub specs_dir: Option<PathBuf>,
}

/// Resolved project layout: where each input lives.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

/// Find the project root by searching upward for a `.specify` directory.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(SPECIFY_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Read the project config. A missing file yields the defaults; a malformed
/// one is an error.
pub fn load_config(root: &Path) -> Result<ProjectConfig, StorageError> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    let content = fs::read_to_string(&path).map_err(|source| StorageError::Io {
        path: path.clone(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(ProjectConfig::default());
    }
    serde_yaml::from_str(&content).map_err(|source| StorageError::Config { path, source })
}

impl Project {
    /// Locate the project from a working directory: nearest `.specify`
    /// ancestor, else the directory itself.
    pub fn discover(cwd: &Path) -> Result<Project, StorageError> {
        let root = find_project_root(cwd).unwrap_or_else(|| cwd.to_path_buf());
        let config = load_config(&root)?;
        log::debug!("project root: {} ({:?})", root.display(), config);
        Ok(Project { root, config })
    }

    pub fn matrix_path(&self, explicit: Option<&Path>) -> PathBuf {
        self.resolve(
            explicit,
            self.config.matrix.as_deref(),
            DEFAULT_MATRIX_PATH,
            LEGACY_MATRIX_PATHS,
        )
    }

    pub fn screen_path(&self, explicit: Option<&Path>) -> PathBuf {
        self.resolve(
            explicit,
            self.config.screen.as_deref(),
            DEFAULT_SCREEN_PATH,
            LEGACY_SCREEN_PATHS,
        )
    }

    pub fn domain_path(&self, explicit: Option<&Path>) -> PathBuf {
        self.resolve(
            explicit,
            self.config.domain.as_deref(),
            DEFAULT_DOMAIN_PATH,
            LEGACY_DOMAIN_PATHS,
        )
    }

    pub fn specs_dir(&self, explicit: Option<&Path>) -> PathBuf {
        self.resolve(explicit, self.config.specs_dir.as_deref(), DEFAULT_SPECS_DIR, &[])
    }

    /// Explicit flag, then config, then the first existing of default and
    /// legacy locations, then the default (so errors name the expected path).
    /// Explicit paths are taken as given; the others are relative to the root.
    fn resolve(
        &self,
        explicit: Option<&Path>,
        configured: Option<&Path>,
        default: &str,
        legacy: &[&str],
    ) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Some(path) = configured {
            return self.root.join(path);
        }
        std::iter::once(default)
            .chain(legacy.iter().copied())
            .map(|p| self.root.join(p))
            .find(|p| p.exists())
            .unwrap_or_else(|| self.root.join(default))
    }
}

/// Read a UTF-8 document, distinguishing a missing file from other IO errors.
pub fn read_document(path: &Path) -> Result<String, StorageError> {
    if !path.exists() {
        return Err(StorageError::NotFound(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and decode the matrix JSON.
pub fn load_matrix(path: &Path) -> Result<Matrix, StorageError> {
    let content = read_document(path)?;
    let matrix: Matrix = serde_json::from_str(&content).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!(
        "loaded matrix {}: {} screens, {} features, {} permission entries",
        path.display(),
        matrix.screens.len(),
        matrix.features.len(),
        matrix.permissions.len()
    );
    Ok(matrix)
}

/// Sibling report path for a matrix file: `.json` replaced by `.md`.
pub fn report_path(matrix_path: &Path) -> PathBuf {
    matrix_path.with_extension("md")
}

/// Overwrite the report in a single write.
pub fn write_report(path: &Path, content: &str) -> Result<(), StorageError> {
    fs::write(path, content).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Find markdown files under `dir`, skipping hidden directories and
/// `node_modules`. Sorted for stable output.
pub fn find_spec_files(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    if !dir.is_dir() {
        return Err(StorageError::NotFound(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            let skipped = name.starts_with('.') || name == "node_modules";
            e.depth() == 0 || !(e.file_type().is_dir() && skipped)
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("md"))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    Ok(files)
}

/// Parse every spec under `dir`. Unreadable files are skipped with a warning.
pub fn load_all_specs(dir: &Path) -> Result<Vec<SpecMetadata>, StorageError> {
    let mut specs = Vec::new();
    for path in find_spec_files(dir)? {
        match read_document(&path) {
            Ok(content) => specs.push(parse_spec(&content, &path)),
            Err(e) => log::warn!("skipping {}: {}", path.display(), e),
        }
    }
    Ok(specs)
}
