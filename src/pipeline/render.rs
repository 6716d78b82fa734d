//! Formula rendering: LaTeX text → trimmed grayscale PNG at a cache path.
//!
//! ## Three stages, each fail-fast
//!
//! ```text
//! header + formula + footer ──▶ compile ──▶ rasterize ──▶ convert ──▶ <key>.png
//!        (temp .tex)             (PDF)      (page 1 PNG)   (trimmed)
//! ```
//!
//! Each stage is a separate [`Toolchain`] call so a failure names the exact
//! step that broke ([`Stage`]). All intermediates live in a [`TempDir`] that
//! is removed when `render` returns, on success and on failure alike.
//!
//! ## Why persist instead of writing in place?
//!
//! The converter writes into a temp file inside the cache directory, which
//! is then renamed onto the content-addressed path. A crashed or failed
//! converter therefore never leaves a half-written `<key>.png` behind that a
//! later run would mistake for a cache hit. The temp name never matches the
//! cache naming pattern, so reconciliation ignores it.

use crate::config::Config;
use crate::error::{Stage, TexCacheError, ToolError};
use crate::pipeline::toolchain::Toolchain;
use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

const BUILTIN_HEADER: &str = include_str!("../../templates/header.tex");
const BUILTIN_FOOTER: &str = include_str!("../../templates/footer.tex");

/// LaTeX text wrapped around every formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templates {
    pub header: String,
    pub footer: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            header: BUILTIN_HEADER.to_string(),
            footer: BUILTIN_FOOTER.to_string(),
        }
    }
}

impl Templates {
    /// Load the templates named by `config`, falling back to the built-in
    /// ones. An override that cannot be read is fatal.
    pub fn from_config(config: &Config) -> Result<Self, TexCacheError> {
        let builtin = Self::default();
        Ok(Self {
            header: read_override(config.header_template.as_deref())?.unwrap_or(builtin.header),
            footer: read_override(config.footer_template.as_deref())?.unwrap_or(builtin.footer),
        })
    }

    /// A complete compilable document for `formula`.
    pub fn document(&self, formula: &str) -> String {
        let body = decode_entities(formula);
        let mut doc = String::with_capacity(self.header.len() + body.len() + self.footer.len() + 2);
        doc.push_str(&self.header);
        if !self.header.ends_with('\n') {
            doc.push('\n');
        }
        doc.push_str(&body);
        doc.push('\n');
        doc.push_str(&self.footer);
        doc
    }
}

fn read_override(path: Option<&Path>) -> Result<Option<String>, TexCacheError> {
    path.map(|p| {
        std::fs::read_to_string(p).map_err(|e| TexCacheError::MissingTemplate {
            path: p.to_path_buf(),
            source: e,
        })
    })
    .transpose()
}

/// Undo the XML escaping an `alt` attribute needs (`&lt;` etc.).
fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
    )
}

/// What [`RenderPipeline::render`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// The artefact already existed; no tool was run.
    CacheHit,
    /// The external pipeline produced the artefact.
    Rendered { dimensions: Option<(u32, u32)> },
}

/// Drives a [`Toolchain`] to materialise formula artefacts.
pub struct RenderPipeline<T> {
    toolchain: T,
    templates: Templates,
    dpi: u32,
    verbosity: u8,
}

impl<T: Toolchain> RenderPipeline<T> {
    pub fn new(toolchain: T, templates: Templates, dpi: u32, verbosity: u8) -> Self {
        Self {
            toolchain,
            templates,
            dpi,
            verbosity,
        }
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Ensure an artefact for `formula` exists at `output`.
    ///
    /// Idempotent: an existing file is trusted as-is, because the path is
    /// derived from the formula text.
    pub fn render(&self, formula: &str, output: &Path) -> Result<RenderStatus, TexCacheError> {
        if output.exists() {
            debug!("Cache hit: {}", output.display());
            return Ok(RenderStatus::CacheHit);
        }

        if self.verbosity >= 1 {
            info!("Rendering `{}` → {}", formula, output.display());
        } else {
            debug!("Rendering `{}` → {}", formula, output.display());
        }

        let cache_dir = output.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(cache_dir).map_err(|e| TexCacheError::CacheIo {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;

        let workdir = tempfile::Builder::new()
            .prefix("texcache-")
            .tempdir()
            .map_err(|e| TexCacheError::CacheIo {
                path: std::env::temp_dir(),
                source: e,
            })?;

        let pdf = self.compile(formula, &workdir)?;

        let raster = self
            .toolchain
            .rasterize(&pdf, self.dpi, &workdir.path().join("raster"))
            .map_err(|e| stage_error(Stage::Rasterize, formula, e))?;

        let staging = tempfile::Builder::new()
            .prefix(".texcache-")
            .suffix(".part")
            .tempfile_in(cache_dir)
            .map_err(|e| TexCacheError::CacheIo {
                path: cache_dir.to_path_buf(),
                source: e,
            })?;
        self.toolchain
            .convert(&raster, staging.path())
            .map_err(|e| stage_error(Stage::Convert, formula, e))?;
        staging.persist(output).map_err(|e| TexCacheError::CacheIo {
            path: output.to_path_buf(),
            source: e.error,
        })?;

        let dimensions = match image::image_dimensions(output) {
            Ok(dims) => {
                debug!("Rendered {} ({}x{} px)", output.display(), dims.0, dims.1);
                Some(dims)
            }
            Err(e) => {
                warn!("Rendered artefact {} is not a readable image: {}", output.display(), e);
                None
            }
        };

        Ok(RenderStatus::Rendered { dimensions })
    }

    /// Write the synthesised source into `workdir` and compile it.
    fn compile(&self, formula: &str, workdir: &TempDir) -> Result<PathBuf, TexCacheError> {
        let io_error = |e: std::io::Error| {
            stage_error(
                Stage::Compile,
                formula,
                ToolError::Io {
                    program: "source writer".to_string(),
                    source: e,
                },
            )
        };

        let mut source = tempfile::Builder::new()
            .prefix("formula-")
            .suffix(".tex")
            .tempfile_in(workdir.path())
            .map_err(io_error)?;
        source
            .write_all(self.templates.document(formula).as_bytes())
            .and_then(|_| source.flush())
            .map_err(io_error)?;

        self.toolchain
            .compile(source.path(), workdir.path())
            .map_err(|e| stage_error(Stage::Compile, formula, e))
    }
}

fn stage_error(stage: Stage, formula: &str, source: ToolError) -> TexCacheError {
    TexCacheError::RenderFailed {
        stage,
        formula: formula.to_string(),
        source,
    }
}
