//! Configuration types for a texcache run.
//!
//! All run behaviour is controlled through [`Config`], built via its
//! [`ConfigBuilder`]. Defaults mirror the command-line defaults: 128 DPI,
//! a `tex` cache directory next to the document, tracker integration on,
//! tool output suppressed.

use crate::error::TexCacheError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Configuration for one pass over one document.
///
/// # Example
/// ```rust
/// use texcache::Config;
///
/// let config = Config::builder()
///     .dpi(200)
///     .cache_dir("img/math")
///     .no_tracking(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct Config {
    /// Rasterisation resolution in dots per inch. Range: 16–2400. Default: 128.
    pub dpi: u32,

    /// Cache subdirectory, relative to the document's parent directory.
    /// Also the prefix of every rewritten `src`. Default: `tex`.
    pub cache_dir: PathBuf,

    /// Skip artifact-tracker integration entirely. Default: false.
    pub no_tracking: bool,

    /// 0 = tool output suppressed, 1 = log each render, 2+ = surface tool output.
    pub verbosity: u8,

    /// Override for the LaTeX preamble placed before each formula.
    pub header_template: Option<PathBuf>,

    /// Override for the LaTeX postamble placed after each formula.
    pub footer_template: Option<PathBuf>,

    /// LaTeX compiler producing a PDF. Default: `pdflatex`.
    pub latex_program: String,

    /// PDF-to-raster converter. Default: `pdftoppm`.
    pub rasterizer_program: String,

    /// Trim/format converter. Default: `convert` (ImageMagick).
    pub converter_program: String,

    /// Optional per-formula progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dpi: 128,
            cache_dir: PathBuf::from("tex"),
            no_tracking: false,
            verbosity: 0,
            header_template: None,
            footer_template: None,
            latex_program: "pdflatex".to_string(),
            rasterizer_program: "pdftoppm".to_string(),
            converter_program: "convert".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("dpi", &self.dpi)
            .field("cache_dir", &self.cache_dir)
            .field("no_tracking", &self.no_tracking)
            .field("verbosity", &self.verbosity)
            .field("header_template", &self.header_template)
            .field("footer_template", &self.footer_template)
            .field("latex_program", &self.latex_program)
            .field("rasterizer_program", &self.rasterizer_program)
            .field("converter_program", &self.converter_program)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RenderProgressCallback>"),
            )
            .finish()
    }
}

impl Config {
    /// Create a new builder for `Config`.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`Config`].
#[derive(Debug)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = dir.into();
        self
    }

    pub fn no_tracking(mut self, v: bool) -> Self {
        self.config.no_tracking = v;
        self
    }

    pub fn verbosity(mut self, level: u8) -> Self {
        self.config.verbosity = level;
        self
    }

    pub fn header_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.header_template = Some(path.into());
        self
    }

    pub fn footer_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.footer_template = Some(path.into());
        self
    }

    pub fn latex_program(mut self, program: impl Into<String>) -> Self {
        self.config.latex_program = program.into();
        self
    }

    pub fn rasterizer_program(mut self, program: impl Into<String>) -> Self {
        self.config.rasterizer_program = program.into();
        self
    }

    pub fn converter_program(mut self, program: impl Into<String>) -> Self {
        self.config.converter_program = program.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<Config, TexCacheError> {
        let c = &self.config;
        if !(16..=2400).contains(&c.dpi) {
            return Err(TexCacheError::InvalidConfig(format!(
                "DPI must be 16–2400, got {}",
                c.dpi
            )));
        }
        validate_cache_dir(&c.cache_dir)?;
        for (name, program) in [
            ("latex", &c.latex_program),
            ("rasterizer", &c.rasterizer_program),
            ("converter", &c.converter_program),
        ] {
            if program.trim().is_empty() {
                return Err(TexCacheError::InvalidConfig(format!(
                    "{name} program must not be empty"
                )));
            }
        }
        Ok(self.config)
    }
}

/// The cache directory doubles as a URL prefix, so it must name at least one
/// directory strictly below the document's own.
fn validate_cache_dir(dir: &Path) -> Result<(), TexCacheError> {
    if !dir.components().any(|c| matches!(c, Component::Normal(_))) {
        return Err(TexCacheError::InvalidConfig(format!(
            "cache directory must name a subdirectory of the document's directory, got '{}'",
            dir.display()
        )));
    }
    for component in dir.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(TexCacheError::InvalidConfig(format!(
                    "cache directory must be a relative path below the document, got '{}'",
                    dir.display()
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let c = Config::default();
        assert_eq!(c.dpi, 128);
        assert_eq!(c.cache_dir, PathBuf::from("tex"));
        assert!(!c.no_tracking);
        assert_eq!(c.verbosity, 0);
        assert_eq!(c.latex_program, "pdflatex");
    }

    #[test]
    fn builder_rejects_out_of_range_dpi() {
        let err = Config::builder().dpi(5).build().unwrap_err();
        assert!(err.to_string().contains("DPI"), "got: {err}");
    }

    #[test]
    fn builder_rejects_escaping_cache_dir() {
        assert!(Config::builder().cache_dir("../tex").build().is_err());
        assert!(Config::builder().cache_dir("/tmp/tex").build().is_err());
        assert!(Config::builder().cache_dir("").build().is_err());
        assert!(Config::builder().cache_dir("assets/tex").build().is_ok());
    }

    #[test]
    fn builder_rejects_document_directory_as_cache_dir() {
        for dir in [".", "./.", "./"] {
            let err = Config::builder().cache_dir(dir).build().unwrap_err();
            assert!(matches!(err, TexCacheError::InvalidConfig(_)), "{dir}: {err:?}");
        }
        assert!(Config::builder().cache_dir("./tex").build().is_ok());
    }

    #[test]
    fn builder_rejects_blank_program() {
        assert!(Config::builder().converter_program("  ").build().is_err());
    }

    #[test]
    fn debug_hides_callback() {
        let c = Config::builder()
            .progress_callback(std::sync::Arc::new(crate::progress::NoopProgressCallback))
            .build()
            .unwrap();
        assert!(format!("{c:?}").contains("<dyn RenderProgressCallback>"));
    }
}
