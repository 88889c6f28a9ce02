//! Output directory configuration and shared file plumbing.
//!
//! One [`OutputDirectory`] value is passed explicitly to every exporter
//! rather than living in ambient static state. The directory is created on
//! demand and defaults to `GeneralSQLReporterOutputs/` next to the
//! executable.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use sqlreporter_core::{ReportError, Result};
use uuid::Uuid;

/// Characters rejected in output directory paths.
const INVALID_PATH_CHARS: &[char] = &['\0', '<', '>', '"', '|', '?', '*'];

/// Where exported report files land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirectory {
    path: PathBuf,
}

impl Default for OutputDirectory {
    fn default() -> Self {
        Self {
            path: default_location(),
        }
    }
}

/// `<app base dir>/GeneralSQLReporterOutputs/`, falling back to the
/// current directory when the executable path is unavailable.
fn default_location() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("GeneralSQLReporterOutputs")
}

impl OutputDirectory {
    /// Creates the default output directory value.
    pub fn new() -> Self {
        Self::default()
    }

    /// The configured directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sets the output directory, creating it if missing.
    ///
    /// A blank path resets to the default location.
    ///
    /// # Errors
    /// Returns a configuration error if the path contains invalid
    /// characters, or an I/O error if the directory cannot be created.
    pub fn set(&mut self, path: &str) -> Result<()> {
        let trimmed = path.trim();

        if trimmed.is_empty() {
            self.path = default_location();
            return self.ensure_exists();
        }

        if trimmed.contains(INVALID_PATH_CHARS) {
            return Err(ReportError::configuration(
                "Output directory path contains invalid characters",
            ));
        }

        self.path = PathBuf::from(trimmed);
        self.ensure_exists()
    }

    /// Creates the directory if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.path).map_err(|e| {
            ReportError::io(
                format!("Failed to create output directory {}", self.path.display()),
                e,
            )
        })
    }

    /// Resolves the target file path for an export.
    ///
    /// A blank or missing file name becomes `{uuid}.{extension}`. With
    /// `overwrite` set, an existing file at the target is deleted first;
    /// without it the stale file is left in place and the subsequent
    /// create fails at the file-system layer.
    pub(crate) fn resolve_target(
        &self,
        file_name: Option<&str>,
        extension: &str,
        overwrite: bool,
    ) -> Result<PathBuf> {
        self.ensure_exists()?;

        let name = match file_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => format!("{}.{}", Uuid::new_v4(), extension),
        };

        let target = self.path.join(name);

        if overwrite && target.exists() {
            std::fs::remove_file(&target).map_err(|e| {
                ReportError::io(
                    format!("Failed to remove existing file {}", target.display()),
                    e,
                )
            })?;
        }

        Ok(target)
    }
}

/// Opens a brand-new file for writing; fails if one already exists.
pub(crate) fn create_new_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| ReportError::io(format!("Failed to create {}", path.display()), e))
}

/// Writes contents into a brand-new file.
pub(crate) fn write_new(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = create_new_file(path)?;
    file.write_all(contents)
        .map_err(|e| ReportError::io(format!("Failed to write {}", path.display()), e))
}
