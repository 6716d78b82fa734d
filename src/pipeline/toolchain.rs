//! External tool invocation behind a narrow capability interface.
//!
//! [`Toolchain`] exposes exactly the three operations the render pipeline
//! needs. [`ExternalToolchain`] shells out to real programs; tests substitute
//! deterministic stubs.

use crate::config::Config;
use crate::error::ToolError;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info};

/// The three external capabilities of the render pipeline.
///
/// Every method blocks until the tool exits. Implementations must not leave
/// a file at the requested output location unless they succeeded.
pub trait Toolchain {
    /// Compile the LaTeX `source` into a PDF inside `workdir`, returning its path.
    fn compile(&self, source: &Path, workdir: &Path) -> Result<PathBuf, ToolError>;

    /// Rasterise the first page of `pdf` in grayscale at `dpi`. The raster
    /// is written next to `out_stem` and its path returned.
    fn rasterize(&self, pdf: &Path, dpi: u32, out_stem: &Path) -> Result<PathBuf, ToolError>;

    /// Trim whitespace margins off `raster` and write the final PNG to `output`.
    fn convert(&self, raster: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Real toolchain: `pdflatex` → `pdftoppm` → ImageMagick `convert` by default.
#[derive(Debug, Clone)]
pub struct ExternalToolchain {
    latex: String,
    rasterizer: String,
    converter: String,
    verbosity: u8,
}

impl ExternalToolchain {
    pub fn new(
        latex: impl Into<String>,
        rasterizer: impl Into<String>,
        converter: impl Into<String>,
        verbosity: u8,
    ) -> Self {
        Self {
            latex: latex.into(),
            rasterizer: rasterizer.into(),
            converter: converter.into(),
            verbosity,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.latex_program,
            &config.rasterizer_program,
            &config.converter_program,
            config.verbosity,
        )
    }

    /// Run `cmd`, capturing its output. At verbosity 2+ the captured output
    /// is surfaced through the log even on success; at verbosity 0 it is
    /// left out of the failure as well.
    fn run(&self, program: &str, cmd: &mut Command) -> Result<Output, ToolError> {
        debug!("Running {:?}", cmd);
        let output = cmd.output().map_err(|e| ToolError::Spawn {
            program: program.to_string(),
            source: e,
        })?;

        if self.verbosity >= 2 {
            let text = combined_output(&output);
            if !text.trim().is_empty() {
                info!("{program} output:\n{text}");
            }
        }

        if !output.status.success() {
            let diagnostics = if self.verbosity >= 1 {
                combined_output(&output)
            } else {
                String::new()
            };
            return Err(ToolError::Failed {
                program: program.to_string(),
                status: output.status.to_string(),
                output: diagnostics,
            });
        }
        Ok(output)
    }
}

impl Toolchain for ExternalToolchain {
    fn compile(&self, source: &Path, workdir: &Path) -> Result<PathBuf, ToolError> {
        let mut cmd = Command::new(&self.latex);
        cmd.arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg(format!("-output-directory={}", workdir.display()))
            .arg(source)
            .current_dir(workdir);
        self.run(&self.latex, &mut cmd)?;

        let pdf = workdir.join(stem_of(source)).with_extension("pdf");
        expect_file(&self.latex, pdf)
    }

    fn rasterize(&self, pdf: &Path, dpi: u32, out_stem: &Path) -> Result<PathBuf, ToolError> {
        let mut cmd = Command::new(&self.rasterizer);
        cmd.arg("-r")
            .arg(dpi.to_string())
            .arg("-gray")
            .args(["-f", "1", "-l", "1", "-singlefile", "-png"])
            .arg(pdf)
            .arg(out_stem);
        self.run(&self.rasterizer, &mut cmd)?;

        expect_file(&self.rasterizer, out_stem.with_extension("png"))
    }

    fn convert(&self, raster: &Path, output: &Path) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.converter);
        cmd.arg(raster).arg("-trim").arg("+repage");
        // Explicit format prefix: the destination may be a temp name.
        cmd.arg(format!("png:{}", output.display()));
        self.run(&self.converter, &mut cmd)?;

        expect_file(&self.converter, output.to_path_buf()).map(|_| ())
    }
}

fn stem_of(path: &Path) -> &std::ffi::OsStr {
    path.file_stem().unwrap_or(path.as_os_str())
}

fn expect_file(program: &str, path: PathBuf) -> Result<PathBuf, ToolError> {
    match std::fs::metadata(&path) {
        Ok(meta) if meta.len() > 0 => Ok(path),
        _ => Err(ToolError::MissingOutput {
            program: program.to_string(),
            expected: path,
        }),
    }
}

fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, true) => String::new(),
        (false, true) => stdout.into_owned(),
        (true, false) => stderr.into_owned(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}
