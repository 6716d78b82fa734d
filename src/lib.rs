//! # texcache
//!
//! Render LaTeX formulas embedded in HTML into a content-addressed PNG cache.
//!
//! A formula marker is an image element whose `alt` carries the formula:
//!
//! ```html
//! <img src="old.png" alt="latex:x^2+y^2=z^2">
//! ```
//!
//! texcache renders each distinct formula once, stores it as
//! `tex/<md5(formula)>.png` next to the document, points every `src` at its
//! entry and, inside a git working tree, keeps the cache directory in sync
//! with what the document actually references.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document.html
//!  │
//!  ├─ 1. Extract    find <img alt="latex:…" src="…"> markers, in order
//!  ├─ 2. Address    md5(formula) → tex/<hex>.png
//!  ├─ 3. Render     pdflatex → pdftoppm → convert -trim   (skipped on cache hit)
//!  ├─ 4. Rewrite    substitute src values, write back only if changed
//!  └─ 5. Reconcile  git add referenced entries, delete orphans
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use texcache::{run, Config};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::builder().dpi(150).build()?;
//!     let summary = run("site/index.html", &config)?;
//!     eprintln!(
//!         "{} formulas, {} rendered, document {}",
//!         summary.process.occurrences,
//!         summary.process.rendered.len(),
//!         if summary.process.changed { "rewritten" } else { "unchanged" },
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `texcache` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod rewrite;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Config, ConfigBuilder};
pub use error::{Stage, TexCacheError, ToolError};
pub use output::{IncludedSet, ProcessOutcome, ReconcileReport, RenderedEntry, RunSummary};
pub use pipeline::address::{CacheEntry, CacheKey, ContentAddresser};
pub use pipeline::extract::{extract, FormulaOccurrence, Formulas};
pub use pipeline::reconcile::{ArtifactTracker, CacheReconciler, GitTracker};
pub use pipeline::render::{RenderPipeline, RenderStatus, Templates};
pub use pipeline::toolchain::{ExternalToolchain, Toolchain};
pub use progress::{NoopProgressCallback, ProgressCallback, RenderProgressCallback};
pub use rewrite::{rewrite_text, run, run_with, DocumentRewriter, Rewrite};
