//! Runs against a document given as a path relative to the current directory,
//! the way the CLI is usually invoked (`texcache site/index.html`).
//!
//! These tests change the process working directory, so they live in their
//! own test binary and serialise on [`CWD`].

use image::{GrayImage, Luma};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use texcache::rewrite::document_base;
use texcache::{
    run_with, ArtifactTracker, CacheKey, Config, GitTracker, Templates, TexCacheError, ToolError,
    Toolchain,
};

static CWD: Mutex<()> = Mutex::new(());

/// Restores the previous working directory on drop.
struct CwdGuard {
    previous: PathBuf,
}

impl CwdGuard {
    fn enter(dir: &Path) -> Self {
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        Self { previous }
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.previous);
    }
}

struct StubTools;

impl Toolchain for StubTools {
    fn compile(&self, source: &Path, workdir: &Path) -> Result<PathBuf, ToolError> {
        let pdf = workdir.join("formula.pdf");
        std::fs::copy(source, &pdf).unwrap();
        Ok(pdf)
    }

    fn rasterize(&self, pdf: &Path, _dpi: u32, out_stem: &Path) -> Result<PathBuf, ToolError> {
        let png = out_stem.with_extension("png");
        std::fs::copy(pdf, &png).unwrap();
        Ok(png)
    }

    fn convert(&self, _raster: &Path, output: &Path) -> Result<(), ToolError> {
        GrayImage::from_pixel(2, 2, Luma([0u8]))
            .save_with_format(output, image::ImageFormat::Png)
            .unwrap();
        Ok(())
    }
}

#[derive(Default)]
struct RecordingTracker {
    added: RefCell<Vec<PathBuf>>,
    removed: RefCell<Vec<PathBuf>>,
}

impl ArtifactTracker for &RecordingTracker {
    fn is_available(&self) -> bool {
        true
    }

    fn add(&self, paths: &[PathBuf]) -> Result<(), TexCacheError> {
        self.added.borrow_mut().extend_from_slice(paths);
        Ok(())
    }

    fn remove(&self, paths: &[PathBuf]) -> Result<(), TexCacheError> {
        self.removed.borrow_mut().extend_from_slice(paths);
        Ok(())
    }
}

fn png_name(formula: &str) -> String {
    format!("{}.png", CacheKey::of(formula))
}

fn git(dir: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new("git").arg("-C").arg(dir).args(args).output().ok()?;
    assert!(out.status.success(), "git {args:?} failed: {out:?}");
    Some(String::from_utf8_lossy(&out.stdout).into_owned())
}

/// A `site/index.html` below a fresh temporary root.
fn site_tree(html: &str) -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("site")).unwrap();
    std::fs::write(root.path().join("site/index.html"), html).unwrap();
    root
}

#[test]
fn relative_document_rewrites_src_and_reports_cwd_relative_paths() {
    let _lock = CWD.lock().unwrap_or_else(|e| e.into_inner());
    let root = site_tree(r#"<img src="" alt="latex:a"><img src="" alt="latex:b">"#);
    let _cwd = CwdGuard::enter(root.path());

    let doc = Path::new("site/index.html");
    let config = Config::builder().cache_dir("tex").build().unwrap();
    let tracker = RecordingTracker::default();
    run_with(doc, &config, Templates::default(), StubTools, &tracker).unwrap();

    let (a, b) = (png_name("a"), png_name("b"));
    assert_eq!(
        std::fs::read_to_string(doc).unwrap(),
        format!(r#"<img src="tex/{a}" alt="latex:a"><img src="tex/{b}" alt="latex:b">"#)
    );
    let mut expected = vec![Path::new("site/tex").join(&a), Path::new("site/tex").join(&b)];
    expected.sort();
    assert_eq!(*tracker.added.borrow(), expected);

    std::fs::write(doc, format!(r#"<img src="tex/{a}" alt="latex:a">"#)).unwrap();
    let tracker = RecordingTracker::default();
    let summary = run_with(doc, &config, Templates::default(), StubTools, &tracker).unwrap();

    assert_eq!(summary.process.cache_dir, PathBuf::from("site/tex"));
    assert_eq!(*tracker.added.borrow(), vec![Path::new("site/tex").join(&a)]);
    assert_eq!(*tracker.removed.borrow(), vec![Path::new("site/tex").join(&b)]);
    assert!(!Path::new("site/tex").join(&b).exists());
}

#[test]
fn relative_document_is_staged_in_git() {
    let _lock = CWD.lock().unwrap_or_else(|e| e.into_inner());
    let root = site_tree(r#"<img src="" alt="latex:a"><img src="" alt="latex:b">"#);
    if git(root.path(), &["init", "--quiet"]).is_none() {
        println!("SKIP — git is not installed");
        return;
    }
    let _cwd = CwdGuard::enter(root.path());

    let doc = Path::new("site/index.html");
    let config = Config::default();
    let summary = run_with(
        doc,
        &config,
        Templates::default(),
        StubTools,
        GitTracker::new(document_base(doc)),
    )
    .expect("first run");
    assert!(summary.reconcile.is_some());

    let (a, b) = (png_name("a"), png_name("b"));
    let staged = git(Path::new("."), &["diff", "--cached", "--name-only"]).unwrap();
    assert!(staged.lines().any(|l| l == format!("site/tex/{a}")), "staged: {staged}");
    assert!(staged.lines().any(|l| l == format!("site/tex/{b}")), "staged: {staged}");

    std::fs::write(doc, format!(r#"<img src="tex/{a}" alt="latex:a">"#)).unwrap();
    let summary = run_with(
        doc,
        &config,
        Templates::default(),
        StubTools,
        GitTracker::new(document_base(doc)),
    )
    .expect("second run");
    assert_eq!(summary.reconcile.unwrap().removed, vec![b.clone()]);

    let staged = git(Path::new("."), &["diff", "--cached", "--name-only"]).unwrap();
    assert!(staged.lines().any(|l| l == format!("site/tex/{a}")), "staged: {staged}");
    assert!(!staged.contains(&b), "staged: {staged}");
}
