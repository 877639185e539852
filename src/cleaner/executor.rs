//! Cleanup execution: analysis, dry runs, and real deletion passes.
//!
//! A pass walks each selected target, deletes eligible files one at a
//! time, and prunes directories left empty. Per-file failures are recorded
//! in the outcome and never abort the pass. Dry runs report the full
//! recursive size of each target rather than simulating per-file
//! eligibility; the preview is an upper bound.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use super::targets::{default_targets, CleanupCategory, CleanupTarget};

const SECS_PER_DAY: u64 = 24 * 3600;

/// What one target's pass produced.
#[derive(Debug, Clone)]
pub struct CleanupOutcome {
    pub target: PathBuf,
    pub category: CleanupCategory,
    pub description: &'static str,
    pub bytes_freed: u64,
    pub files_deleted: u64,
    pub errors: Vec<String>,
    /// Target path did not exist
    pub skipped: bool,
    pub dry_run: bool,
}

/// Disk cleanup driver over the target catalog.
pub struct DiskCleaner {
    targets: Vec<CleanupTarget>,
    total_freed: u64,
    total_files: u64,
}

impl DiskCleaner {
    pub fn new(home: &Path) -> Self {
        Self::with_targets(default_targets(home))
    }

    /// Custom catalog, used by tests and callers with their own policy.
    pub fn with_targets(targets: Vec<CleanupTarget>) -> Self {
        Self {
            targets,
            total_freed: 0,
            total_files: 0,
        }
    }

    pub fn targets(&self) -> &[CleanupTarget] {
        &self.targets
    }

    /// Recursive size of the safe targets, grouped by category. Unsafe
    /// targets are left out so the report only shows what a default clean
    /// could touch.
    pub fn analyze(
        &self,
        categories: Option<&[CleanupCategory]>,
    ) -> BTreeMap<CleanupCategory, u64> {
        let mut sizes = BTreeMap::new();
        for target in &self.targets {
            if let Some(wanted) = categories {
                if !wanted.contains(&target.category) {
                    continue;
                }
            }
            if !target.safe_to_delete {
                continue;
            }
            *sizes.entry(target.category).or_insert(0) += dir_size(&target.path);
        }
        sizes
    }

    /// Run a cleanup pass over the selected targets.
    ///
    /// `categories = None` means every category. Unsafe targets need
    /// `include_unsafe`; sudo-gated targets are excluded unconditionally.
    pub fn clean(
        &mut self,
        categories: Option<&[CleanupCategory]>,
        dry_run: bool,
        include_unsafe: bool,
    ) -> Vec<CleanupOutcome> {
        let selected: Vec<CleanupTarget> = self
            .targets
            .iter()
            .filter(|t| categories.map_or(true, |wanted| wanted.contains(&t.category)))
            .filter(|t| include_unsafe || t.safe_to_delete)
            .filter(|t| !t.requires_sudo)
            .cloned()
            .collect();

        let mut outcomes = Vec::with_capacity(selected.len());
        for target in selected {
            if !target.path.exists() {
                outcomes.push(CleanupOutcome {
                    target: target.path.clone(),
                    category: target.category,
                    description: target.description,
                    bytes_freed: 0,
                    files_deleted: 0,
                    errors: Vec::new(),
                    skipped: true,
                    dry_run,
                });
                continue;
            }

            let outcome = if dry_run {
                CleanupOutcome {
                    bytes_freed: dir_size(&target.path),
                    files_deleted: 0,
                    errors: Vec::new(),
                    skipped: false,
                    dry_run: true,
                    target: target.path.clone(),
                    category: target.category,
                    description: target.description,
                }
            } else {
                let (bytes_freed, files_deleted, errors) = delete_eligible(
                    &target.path,
                    target.min_age_days,
                    target.exclude_patterns,
                );
                self.total_freed += bytes_freed;
                self.total_files += files_deleted;
                debug!(
                    target_path = %target.path.display(),
                    bytes_freed,
                    files_deleted,
                    "cleanup pass finished"
                );
                CleanupOutcome {
                    bytes_freed,
                    files_deleted,
                    errors,
                    skipped: false,
                    dry_run: false,
                    target: target.path.clone(),
                    category: target.category,
                    description: target.description,
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Bytes freed across all real passes this session.
    pub fn total_freed(&self) -> u64 {
        self.total_freed
    }

    /// Files deleted across all real passes this session.
    pub fn total_files(&self) -> u64 {
        self.total_files
    }
}

/// Recursive size of everything under `path`, skipping symlinks.
/// Unreadable entries contribute nothing.
pub fn dir_size(path: &Path) -> u64 {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => return 0,
    };
    if meta.is_file() {
        return meta.len();
    }
    if !meta.is_dir() {
        return 0;
    }

    let mut total = 0;
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    for entry in entries.flatten() {
        let Ok(meta) = entry.metadata() else { continue };
        let file_type = entry.file_type();
        if file_type.as_ref().map_or(false, |t| t.is_symlink()) {
            continue;
        }
        if meta.is_dir() {
            total += dir_size(&entry.path());
        } else if meta.is_file() {
            total += meta.len();
        }
    }
    total
}

/// Whether a file passes the target's policy. The exclusion check runs
/// before the age check, so excluded paths survive regardless of age.
/// A failed mtime read makes the file ineligible, not an error.
fn eligible(path: &Path, min_age_days: u32, exclude_patterns: &[&str]) -> bool {
    let path_str = path.to_string_lossy();
    if exclude_patterns.iter().any(|p| path_str.contains(p)) {
        return false;
    }

    if min_age_days > 0 {
        let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
            return false;
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age < Duration::from_secs(u64::from(min_age_days) * SECS_PER_DAY) {
            return false;
        }
    }
    true
}

/// Delete eligible files under `root`, then prune emptied directories
/// deepest-first. Returns (bytes freed, files deleted, errors).
fn delete_eligible(
    root: &Path,
    min_age_days: u32,
    exclude_patterns: &[&str],
) -> (u64, u64, Vec<String>) {
    let mut bytes_freed = 0;
    let mut files_deleted = 0;
    let mut errors = Vec::new();

    if let Ok(meta) = fs::symlink_metadata(root) {
        if meta.is_file() {
            if eligible(root, min_age_days, exclude_patterns) {
                match fs::remove_file(root) {
                    Ok(()) => return (meta.len(), 1, errors),
                    Err(e) => errors.push(format!("error deleting {}: {e}", root.display())),
                }
            }
            return (0, 0, errors);
        }
    }

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    walk(root, &mut files, &mut dirs);

    for file in files {
        if !eligible(&file, min_age_days, exclude_patterns) {
            continue;
        }
        let size = fs::metadata(&file).map(|m| m.len()).unwrap_or(0);
        match fs::remove_file(&file) {
            Ok(()) => {
                bytes_freed += size;
                files_deleted += 1;
            }
            Err(e) => errors.push(format!("error deleting {}: {e}", file.display())),
        }
    }

    // Deepest paths first so children go before their parents. Removal
    // fails harmlessly on directories that still hold files.
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    for dir in dirs {
        if fs::read_dir(&dir).map_or(false, |mut it| it.next().is_none()) {
            if let Err(e) = fs::remove_dir(&dir) {
                warn!(dir = %dir.display(), error = %e, "could not prune empty directory");
            }
        }
    }

    (bytes_freed, files_deleted, errors)
}

/// Collect regular files and subdirectories under `root`, skipping
/// symlinks. `root` itself is not included in `dirs`.
fn walk(root: &Path, files: &mut Vec<PathBuf>, dirs: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_symlink() {
            continue;
        }
        let path = entry.path();
        if file_type.is_dir() {
            dirs.push(path.clone());
            walk(&path, files, dirs);
        } else if file_type.is_file() {
            files.push(path);
        }
    }
}

/// Human-readable byte count, 1024-based, one decimal.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} PB")
}
