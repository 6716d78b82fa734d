//! Content addressing: formula text → cache key → cache path.
//!
//! The key is the MD5 digest of the UTF-8 bytes of the formula text, exactly
//! as it appears in the `alt` attribute. No whitespace or LaTeX normalisation
//! is applied, so `x^2` and `x^{2}` are two different entries.

use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};

/// Extension of every rendered artefact.
pub const CACHE_EXTENSION: &str = "png";

static RE_CACHE_FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{32}\.png$").unwrap());

/// Whether `name` looks like a cache artefact (`<32 hex>.png`).
pub fn is_cache_file_name(name: &str) -> bool {
    RE_CACHE_FILE_NAME.is_match(name)
}

/// 128-bit content digest of a formula, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn of(formula_text: &str) -> Self {
        Self(format!("{:x}", Md5::digest(formula_text.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<key>.png`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, CACHE_EXTENSION)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a formula's artefact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// Filesystem location of the artefact.
    pub path: PathBuf,
    /// Reference written into the document's `src`, relative to the document.
    pub src: String,
}

impl CacheEntry {
    pub fn file_name(&self) -> String {
        self.key.file_name()
    }
}

/// Maps formula text to cache entries under one cache directory.
#[derive(Debug, Clone)]
pub struct ContentAddresser {
    /// Directory the artefacts are written to.
    cache_root: PathBuf,
    /// `/`-joined form of the configured cache directory, used in `src`.
    src_prefix: String,
}

impl ContentAddresser {
    /// `base` is the directory the document lives in; `cache_dir` is the
    /// configured relative cache subdirectory.
    pub fn new(base: &Path, cache_dir: &Path) -> Self {
        let src_prefix = cache_dir
            .components()
            .filter_map(|c| match c {
                std::path::Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        Self {
            cache_root: base.join(cache_dir),
            src_prefix,
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Deterministic address of `formula_text`.
    pub fn address_of(&self, formula_text: &str) -> CacheEntry {
        let key = CacheKey::of(formula_text);
        let file_name = key.file_name();
        CacheEntry {
            path: self.cache_root.join(&file_name),
            src: format!("{}/{}", self.src_prefix, file_name),
            key,
        }
    }
}
