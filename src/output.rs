//! Result types produced by a run.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Basenames of the cache entries referenced during the current run.
///
/// Built while the document is rewritten and consumed once by
/// [`crate::pipeline::reconcile::CacheReconciler`]. Ordered so reports and
/// tracker invocations are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IncludedSet(BTreeSet<String>);

impl IncludedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a referenced basename. Returns `false` if it was already present.
    pub fn insert(&mut self, file_name: impl Into<String>) -> bool {
        self.0.insert(file_name.into())
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.0.contains(file_name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for IncludedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A freshly rendered artefact.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedEntry {
    pub file_name: String,
    pub formula: String,
    /// Pixel dimensions, when the artefact could be decoded as an image.
    pub dimensions: Option<(u32, u32)>,
}

/// Outcome of [`crate::rewrite::DocumentRewriter::process`].
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub document: PathBuf,
    /// Resolved cache directory the artefacts live in.
    pub cache_dir: PathBuf,
    /// Whether the document file was rewritten.
    pub changed: bool,
    /// Number of formula occurrences found.
    pub occurrences: usize,
    /// Occurrences whose artefact already existed.
    pub cache_hits: usize,
    /// Artefacts produced by the external pipeline during this run.
    pub rendered: Vec<RenderedEntry>,
    /// Every cache entry the rewritten document references.
    pub included: IncludedSet,
}

/// Outcome of one reconciliation sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Entries registered with the tracker.
    pub added: Vec<String>,
    /// Orphaned entries deleted from disk.
    pub removed: Vec<String>,
}

/// Everything a run did, as printed by `texcache --json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub process: ProcessOutcome,
    /// `None` when tracking was disabled or no tracker was found.
    pub reconcile: Option<ReconcileReport>,
}
