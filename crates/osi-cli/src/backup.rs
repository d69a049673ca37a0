//! Backups of files merged in place
//!
//! Before an in-place write, the original is copied next to it with the
//! `.sp-backup` suffix. A file that did not exist gets an empty
//! `.sp-backup-nonexist` marker instead, so that restoring removes it.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub const BACKUP_SUFFIX: &str = ".sp-backup";
pub const NONEXIST_SUFFIX: &str = ".sp-backup-nonexist";

/// `path` with `suffix` appended to its file name
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// `path` with `suffix` removed from its file name, if present
fn strip_suffix(path: &Path, suffix: &str) -> Option<PathBuf> {
    path.to_str()
        .and_then(|s| s.strip_suffix(suffix))
        .map(PathBuf::from)
}

/// Backup manager for in-place merges
pub struct BackupManager {
    /// Whether backups are enabled
    enabled: bool,
    /// Backups and markers written in this session
    created: Vec<PathBuf>,
}

impl BackupManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            created: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Refuse to proceed if any of `paths` was already backed up
    ///
    /// Merging over an already merged file would overwrite the pristine
    /// backup with merged content.
    pub fn ensure_no_backups(&self, paths: &[PathBuf]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let existing: Vec<PathBuf> = paths
            .iter()
            .flat_map(|p| [with_suffix(p, BACKUP_SUFFIX), with_suffix(p, NONEXIST_SUFFIX)])
            .filter(|b| b.exists())
            .collect();

        if !existing.is_empty() {
            let listing: Vec<String> = existing.iter().map(|p| p.display().to_string()).collect();
            bail!(
                "StorPool backups already exist, run `sp-osi restore` first:\n  {}",
                listing.join("\n  ")
            );
        }
        Ok(())
    }

    /// Back up a file before it is overwritten
    pub fn backup_file(&mut self, path: &Path) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }

        let backup_path = if path.exists() {
            let backup_path = with_suffix(path, BACKUP_SUFFIX);
            info!("Backing up {} to {}", path.display(), backup_path.display());
            fs::copy(path, &backup_path).with_context(|| {
                format!(
                    "Failed to backup file: {} -> {}",
                    path.display(),
                    backup_path.display()
                )
            })?;
            backup_path
        } else {
            let marker = with_suffix(path, NONEXIST_SUFFIX);
            info!("Non-existent file {} marked at {}", path.display(), marker.display());
            if let Some(parent) = marker.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
            fs::write(&marker, "")
                .with_context(|| format!("Failed to create marker: {}", marker.display()))?;
            marker
        };

        self.created.push(backup_path.clone());
        Ok(Some(backup_path))
    }

    /// Backups and markers written so far
    pub fn created(&self) -> &[PathBuf] {
        &self.created
    }
}

/// Files under `dir` whose names end in `suffix`
pub fn find_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(suffix))
        .map(|e| e.into_path())
        .collect();
    found.sort();
    found
}

/// What `restore` did
#[derive(Debug, Default)]
pub struct RestoreSummary {
    /// Originals copied back into place
    pub restored: Vec<PathBuf>,
    /// Files the merge had created, now deleted
    pub removed: Vec<PathBuf>,
}

impl RestoreSummary {
    pub fn is_empty(&self) -> bool {
        self.restored.is_empty() && self.removed.is_empty()
    }
}

/// Put every backed-up original under `dir` back and drop the backups
pub fn restore(dir: &Path) -> Result<RestoreSummary> {
    let mut summary = RestoreSummary::default();

    for backup in find_with_suffix(dir, BACKUP_SUFFIX) {
        let Some(original) = strip_suffix(&backup, BACKUP_SUFFIX) else {
            continue;
        };
        debug!("Copying {} to {}", backup.display(), original.display());
        fs::copy(&backup, &original).with_context(|| {
            format!(
                "Failed to restore file: {} -> {}",
                backup.display(),
                original.display()
            )
        })?;
        fs::remove_file(&backup)
            .with_context(|| format!("Failed to remove backup: {}", backup.display()))?;
        summary.restored.push(original);
    }

    for marker in find_with_suffix(dir, NONEXIST_SUFFIX) {
        let Some(created) = strip_suffix(&marker, NONEXIST_SUFFIX) else {
            continue;
        };
        if created.exists() {
            debug!("Removing {} (marked by {})", created.display(), marker.display());
            fs::remove_file(&created)
                .with_context(|| format!("Failed to remove file: {}", created.display()))?;
        }
        fs::remove_file(&marker)
            .with_context(|| format!("Failed to remove marker: {}", marker.display()))?;
        summary.removed.push(created);
    }

    Ok(summary)
}
