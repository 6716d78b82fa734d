//! Document rewriting and the top-level run.
//!
//! One run is one pass over one document:
//!
//! 1. scan the document for formula markers,
//! 2. address and render each occurrence in document order,
//! 3. substitute the new `src` values and write the document back if it
//!    changed,
//! 4. reconcile the cache directory with the tracker.
//!
//! The document is written only after every formula rendered, and
//! reconciliation only starts after the document is on disk, so a failure
//! at any point leaves the original document untouched and never prunes an
//! artefact the document still needs.

use crate::config::Config;
use crate::error::TexCacheError;
use crate::output::{IncludedSet, ProcessOutcome, RenderedEntry, RunSummary};
use crate::pipeline::address::ContentAddresser;
use crate::pipeline::extract::extract;
use crate::pipeline::reconcile::{ArtifactTracker, CacheReconciler, GitTracker};
use crate::pipeline::render::{RenderPipeline, RenderStatus, Templates};
use crate::pipeline::toolchain::{ExternalToolchain, Toolchain};
use crate::progress::ProgressCallback;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Rewritten text plus what was learned while producing it.
#[derive(Debug, Clone)]
pub struct Rewrite {
    pub text: String,
    pub included: IncludedSet,
    pub occurrences: usize,
    pub cache_hits: usize,
    pub rendered: Vec<RenderedEntry>,
}

/// Fold over the occurrences of `text`, ensuring each artefact exists via
/// `render` and pointing its `src` at the addressed cache entry.
///
/// `render` is called in document order and the first error aborts the fold.
pub fn rewrite_text<F>(
    text: &str,
    addresser: &ContentAddresser,
    progress: Option<&ProgressCallback>,
    mut render: F,
) -> Result<Rewrite, TexCacheError>
where
    F: FnMut(&str, &Path) -> Result<RenderStatus, TexCacheError>,
{
    let total = extract(text).count();
    if let Some(cb) = progress {
        cb.on_run_start(total);
    }

    let mut out = Rewrite {
        text: String::with_capacity(text.len()),
        included: IncludedSet::new(),
        occurrences: total,
        cache_hits: 0,
        rendered: Vec::new(),
    };
    let mut last = 0;

    for (i, occurrence) in extract(text).enumerate() {
        let index = i + 1;
        let formula = occurrence.formula_text;
        if let Some(cb) = progress {
            cb.on_formula_start(index, total, formula);
        }

        let entry = addresser.address_of(formula);
        let file_name = entry.file_name();
        match render(formula, &entry.path)? {
            RenderStatus::CacheHit => {
                out.cache_hits += 1;
                if let Some(cb) = progress {
                    cb.on_cache_hit(index, total, &file_name);
                }
            }
            RenderStatus::Rendered { dimensions } => {
                if let Some(cb) = progress {
                    cb.on_render_complete(index, total, &file_name);
                }
                out.rendered.push(RenderedEntry {
                    file_name: file_name.clone(),
                    formula: formula.to_string(),
                    dimensions,
                });
            }
        }
        out.included.insert(file_name);

        out.text.push_str(&text[last..occurrence.span.start]);
        out.text.push_str(&occurrence.with_src(&entry.src));
        last = occurrence.span.end;
    }
    out.text.push_str(&text[last..]);

    if let Some(cb) = progress {
        cb.on_run_complete(out.rendered.len(), out.cache_hits);
    }
    Ok(out)
}

/// Directory a document's relative references resolve against.
pub fn document_base(document: &Path) -> PathBuf {
    match document.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Rewrites one document against a render pipeline.
pub struct DocumentRewriter<T> {
    pipeline: RenderPipeline<T>,
    cache_dir: PathBuf,
    progress: Option<ProgressCallback>,
}

impl<T: Toolchain> DocumentRewriter<T> {
    pub fn new(pipeline: RenderPipeline<T>, config: &Config) -> Self {
        Self {
            pipeline,
            cache_dir: config.cache_dir.clone(),
            progress: config.progress_callback.clone(),
        }
    }

    pub fn pipeline(&self) -> &RenderPipeline<T> {
        &self.pipeline
    }

    /// Render every formula of `document` and rewrite it if any `src` changed.
    pub fn process(&self, document: &Path) -> Result<ProcessOutcome, TexCacheError> {
        let original =
            std::fs::read_to_string(document).map_err(|e| TexCacheError::DocumentRead {
                path: document.to_path_buf(),
                source: e,
            })?;

        let addresser = ContentAddresser::new(&document_base(document), &self.cache_dir);
        let rewrite = rewrite_text(
            &original,
            &addresser,
            self.progress.as_ref(),
            |formula, path| self.pipeline.render(formula, path),
        )?;

        let changed = rewrite.text != original;
        if changed {
            write_document(document, &rewrite.text)?;
            info!("Rewrote {}", document.display());
        } else {
            debug!("{} unchanged", document.display());
        }

        Ok(ProcessOutcome {
            document: document.to_path_buf(),
            cache_dir: addresser.cache_root().to_path_buf(),
            changed,
            occurrences: rewrite.occurrences,
            cache_hits: rewrite.cache_hits,
            rendered: rewrite.rendered,
            included: rewrite.included,
        })
    }
}

/// Replace `document` atomically, keeping its permissions.
fn write_document(document: &Path, text: &str) -> Result<(), TexCacheError> {
    let write_err = |e: std::io::Error| TexCacheError::DocumentWrite {
        path: document.to_path_buf(),
        source: e,
    };

    let permissions = std::fs::metadata(document).map_err(write_err)?.permissions();
    let mut tmp = tempfile::Builder::new()
        .prefix(".texcache-")
        .suffix(".tmp")
        .tempfile_in(document_base(document))
        .map_err(write_err)?;
    tmp.write_all(text.as_bytes()).map_err(write_err)?;
    tmp.as_file().set_permissions(permissions).map_err(write_err)?;
    tmp.persist(document).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Run texcache on `document` with the real toolchain and `git`.
///
/// # Errors
/// Any template, render, document or tracker failure is fatal. When an
/// error is returned before the rewrite step the document is untouched.
pub fn run(document: impl AsRef<Path>, config: &Config) -> Result<RunSummary, TexCacheError> {
    let document = document.as_ref();
    let templates = Templates::from_config(config)?;
    let toolchain = ExternalToolchain::from_config(config);
    let tracker = GitTracker::new(document_base(document));
    run_with(document, config, templates, toolchain, tracker)
}

/// [`run`] with caller-supplied collaborators.
pub fn run_with<T: Toolchain, R: ArtifactTracker>(
    document: &Path,
    config: &Config,
    templates: Templates,
    toolchain: T,
    tracker: R,
) -> Result<RunSummary, TexCacheError> {
    let start = Instant::now();
    info!("Processing {}", document.display());

    let pipeline = RenderPipeline::new(toolchain, templates, config.dpi, config.verbosity);
    let process = DocumentRewriter::new(pipeline, config).process(document)?;

    let reconcile = if config.no_tracking {
        debug!("Tracking disabled; skipping reconciliation");
        None
    } else if !tracker.is_available() {
        debug!("No tracked working tree; skipping reconciliation");
        None
    } else {
        let reconciler = CacheReconciler::new(tracker);
        Some(reconciler.reconcile(&process.cache_dir, &process.included)?)
    };

    info!(
        "Done in {}ms: {} formulas, {} rendered, {} cached, document {}",
        start.elapsed().as_millis(),
        process.occurrences,
        process.rendered.len(),
        process.cache_hits,
        if process.changed { "rewritten" } else { "unchanged" }
    );

    Ok(RunSummary { process, reconcile })
}
