//! Cache reconciliation against a version-control working tree.
//!
//! After the document has been written, every `<32 hex>.png` in the cache
//! directory is compared with the [`IncludedSet`] of the run: referenced
//! entries are registered with the tracker, everything else is deleted and
//! its removal staged. This is a full sweep, so a formula dropped from the
//! document loses its artefact on the next run.
//!
//! Files that do not match the naming pattern (hand-placed images, staging
//! files of an interrupted render) are never touched.

use crate::error::TexCacheError;
use crate::output::{IncludedSet, ReconcileReport};
use crate::pipeline::address::is_cache_file_name;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// An external artifact tracker (a version-control system).
pub trait ArtifactTracker {
    /// Probe whether a tracked working tree is available. Not an error when
    /// it is not: reconciliation is simply skipped.
    fn is_available(&self) -> bool;

    /// Register `paths` with the tracker. Idempotent.
    fn add(&self, paths: &[PathBuf]) -> Result<(), TexCacheError>;

    /// Record that `paths` (already deleted from disk) are gone.
    fn remove(&self, paths: &[PathBuf]) -> Result<(), TexCacheError>;
}

/// [`ArtifactTracker`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitTracker {
    workdir: PathBuf,
    program: String,
}

impl GitTracker {
    /// A tracker rooted at `workdir` (any directory inside the working tree).
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            program: "git".to_string(),
        }
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-C").arg(&self.workdir);
        cmd
    }

    /// `git -C` resolves pathspecs against `workdir`, while callers hand in
    /// paths as seen from the current directory.
    fn pathspec(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.workdir) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) if path.is_relative() => std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf()),
            Err(_) => path.to_path_buf(),
        }
    }

    fn run(&self, subcommand: &[&str], paths: &[PathBuf]) -> Result<(), TexCacheError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut cmd = self.git();
        cmd.args(subcommand)
            .arg("--")
            .args(paths.iter().map(|p| self.pathspec(p)));
        debug!("Running {:?}", cmd);

        let command = format!("{} {}", self.program, subcommand.join(" "));
        let output = cmd.output().map_err(|e| TexCacheError::TrackerFailed {
            command: command.clone(),
            output: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(TexCacheError::TrackerFailed {
                command,
                output: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

impl ArtifactTracker for GitTracker {
    fn is_available(&self) -> bool {
        self.git()
            .args(["status", "--porcelain"])
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn add(&self, paths: &[PathBuf]) -> Result<(), TexCacheError> {
        self.run(&["add"], paths)
    }

    fn remove(&self, paths: &[PathBuf]) -> Result<(), TexCacheError> {
        self.run(&["rm", "--cached", "--quiet", "--ignore-unmatch"], paths)
    }
}

/// Aligns the on-disk cache with the entries referenced by the current run.
pub struct CacheReconciler<R> {
    tracker: R,
}

impl<R: ArtifactTracker> CacheReconciler<R> {
    pub fn new(tracker: R) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &R {
        &self.tracker
    }

    /// Sweep `cache_dir`. A missing directory means there is nothing to do.
    pub fn reconcile(
        &self,
        cache_dir: &Path,
        included: &IncludedSet,
    ) -> Result<ReconcileReport, TexCacheError> {
        let mut report = ReconcileReport::default();
        let entries = match list_cache_entries(cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => {
                return Err(TexCacheError::CacheIo {
                    path: cache_dir.to_path_buf(),
                    source: e,
                })
            }
        };

        let (kept, orphaned): (Vec<String>, Vec<String>) =
            entries.into_iter().partition(|name| included.contains(name));

        // Register first: a tracker failure must not cost any files on disk.
        let keep: Vec<PathBuf> = kept.iter().map(|name| cache_dir.join(name)).collect();
        self.tracker.add(&keep)?;
        report.added = kept;

        let mut gone = Vec::with_capacity(orphaned.len());
        for name in &orphaned {
            let path = cache_dir.join(name);
            std::fs::remove_file(&path).map_err(|e| TexCacheError::CacheIo {
                path: path.clone(),
                source: e,
            })?;
            info!("Pruned orphaned cache entry {}", path.display());
            gone.push(path);
        }
        self.tracker.remove(&gone)?;
        report.removed = orphaned;
        debug!(
            "Reconciled {}: {} kept, {} pruned",
            cache_dir.display(),
            report.added.len(),
            report.removed.len()
        );
        Ok(report)
    }
}

/// Sorted names of the files in `dir` that follow the cache naming pattern.
fn list_cache_entries(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if is_cache_file_name(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort_unstable();
    Ok(names)
}
