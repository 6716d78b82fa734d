//! Error types for the texcache library.
//!
//! Two error types reflect two layers of failure:
//!
//! * [`TexCacheError`] — **Fatal**: the run cannot proceed (document
//!   unreadable, template missing, a formula failed to render). Returned as
//!   `Err(TexCacheError)` from [`crate::rewrite::run`] and friends. There is
//!   no partial-success mode: the document is only written after every
//!   formula in it has rendered.
//!
//! * [`ToolError`] — a single external-tool invocation failed. Produced by
//!   [`crate::pipeline::toolchain::Toolchain`] implementations and wrapped
//!   into [`TexCacheError::RenderFailed`] together with the formula text and
//!   the [`Stage`] that broke, so a diagnostic can point at the exact step.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// One of the three external stages a formula passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// LaTeX source → PDF.
    Compile,
    /// PDF → intermediate grayscale raster.
    Rasterize,
    /// Intermediate raster → trimmed final PNG.
    Convert,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Compile => "compile",
            Stage::Rasterize => "rasterize",
            Stage::Convert => "convert",
        })
    }
}

/// All fatal errors returned by the texcache library.
#[derive(Debug, Error)]
pub enum TexCacheError {
    // ── Document errors ───────────────────────────────────────────────────
    /// The input document could not be read.
    #[error("Failed to read document '{path}': {source}")]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rewritten document could not be written back.
    #[error("Failed to write document '{path}': {source}")]
    DocumentWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Render errors ─────────────────────────────────────────────────────
    /// A header/footer template override could not be read.
    #[error("LaTeX template '{path}' is unreadable: {source}")]
    MissingTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external tool failed while rendering a formula.
    #[error("Rendering failed at the {stage} stage for formula `{formula}`: {source}")]
    RenderFailed {
        stage: Stage,
        formula: String,
        #[source]
        source: ToolError,
    },

    // ── Cache errors ──────────────────────────────────────────────────────
    /// Filesystem operation on the cache directory failed.
    #[error("Cache I/O failed for '{path}': {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact tracker was available but an add/remove call failed.
    #[error("Artifact tracker command `{command}` failed:\n{output}")]
    TrackerFailed { command: String, output: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A failure of one external-tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program could not be started at all (not installed, not executable).
    #[error("could not launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully. `output` is empty when
    /// the toolchain ran quiet (verbosity 0).
    #[error("`{program}` exited with {status}{}", tool_output(.output))]
    Failed {
        program: String,
        status: String,
        output: String,
    },

    /// The program exited successfully but the expected artefact is absent.
    #[error("`{program}` succeeded but produced no file at '{expected}'")]
    MissingOutput { program: String, expected: PathBuf },

    /// Preparing or collecting a tool's files failed.
    #[error("I/O error around `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

fn tool_output(output: &str) -> String {
    if output.trim().is_empty() {
        " (rerun with -v to see the tool output)".to_string()
    } else {
        format!("\n{output}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_failed_names_stage_and_formula() {
        let e = TexCacheError::RenderFailed {
            stage: Stage::Rasterize,
            formula: r"\frac{a}{b}".into(),
            source: ToolError::Failed {
                program: "pdftoppm".into(),
                status: "exit status: 99".into(),
                output: "Syntax Error".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("rasterize"), "got: {msg}");
        assert!(msg.contains(r"\frac{a}{b}"), "got: {msg}");
        assert!(msg.contains("Syntax Error"), "got: {msg}");
    }

    #[test]
    fn tool_failed_display() {
        let e = ToolError::Failed {
            program: "pdflatex".into(),
            status: "exit status: 1".into(),
            output: "! Undefined control sequence.".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("pdflatex"));
        assert!(msg.contains("Undefined control sequence"));
    }

    #[test]
    fn quiet_tool_failure_points_at_verbose_flag() {
        let e = ToolError::Failed {
            program: "convert".into(),
            status: "exit status: 1".into(),
            output: String::new(),
        };
        let msg = e.to_string();
        assert_eq!(
            msg,
            "`convert` exited with exit status: 1 (rerun with -v to see the tool output)"
        );
    }

    #[test]
    fn stage_display_is_lowercase() {
        assert_eq!(Stage::Compile.to_string(), "compile");
        assert_eq!(Stage::Convert.to_string(), "convert");
    }

    #[test]
    fn tracker_failed_display() {
        let e = TexCacheError::TrackerFailed {
            command: "git add".into(),
            output: "fatal: not a git repository".into(),
        };
        assert!(e.to_string().contains("git add"));
    }
}
