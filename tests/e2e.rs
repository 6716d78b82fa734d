//! End-to-end tests against the real LaTeX toolchain and git.
//!
//! They need `pdflatex`, `pdftoppm`, ImageMagick `convert` and `git` on the
//! PATH and are gated behind the `E2E_ENABLED` environment variable so they
//! do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use std::path::Path;
use std::process::Command;
use texcache::{run, CacheKey, Config};

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("git should be installed");
    assert!(out.status.success(), "git {args:?} failed: {out:?}");
    String::from_utf8_lossy(&out.stdout).into_owned()
}

#[test]
fn renders_real_formula_to_trimmed_grayscale_png() {
    e2e_skip_unless_ready!();

    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("index.html");
    std::fs::write(&doc, r#"<p><img src="old.png" alt="latex:x^2+y^2=z^2"></p>"#).unwrap();

    let config = Config::builder().no_tracking(true).build().unwrap();
    let summary = run(&doc, &config).expect("run should succeed");

    let name = format!("{}.png", CacheKey::of("x^2+y^2=z^2"));
    let png = dir.path().join("tex").join(&name);
    assert!(summary.process.changed);
    assert!(png.exists());

    let img = image::open(&png).expect("output should be a PNG");
    assert!(img.width() > 0 && img.height() > 0);
    // Trimmed: a single short formula is far smaller than a page.
    assert!(img.width() < 1000, "not trimmed: {}px wide", img.width());
    println!("{name}: {}x{} px", img.width(), img.height());
}

#[test]
fn broken_formula_fails_at_compile_stage() {
    e2e_skip_unless_ready!();

    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("index.html");
    let html = r#"<img src="" alt="latex:\notacommand{">"#;
    std::fs::write(&doc, html).unwrap();

    let config = Config::builder().no_tracking(true).build().unwrap();
    let err = run(&doc, &config).unwrap_err();
    assert!(err.to_string().contains("compile"), "got: {err}");
    assert_eq!(std::fs::read_to_string(&doc).unwrap(), html);
}

#[test]
fn git_working_tree_is_reconciled() {
    e2e_skip_unless_ready!();

    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "--quiet"]);
    let doc = dir.path().join("index.html");
    std::fs::write(&doc, r#"<img src="" alt="latex:a"><img src="" alt="latex:b">"#).unwrap();

    let config = Config::default();
    run(&doc, &config).expect("first run");
    let staged = git(dir.path(), &["diff", "--cached", "--name-only"]);
    assert!(staged.contains(&CacheKey::of("a").to_string()));
    assert!(staged.contains(&CacheKey::of("b").to_string()));

    std::fs::write(&doc, r#"<img src="" alt="latex:a">"#).unwrap();
    let summary = run(&doc, &config).expect("second run");
    let report = summary.reconcile.expect("git repo is available");
    assert_eq!(report.removed, vec![format!("{}.png", CacheKey::of("b"))]);

    let staged = git(dir.path(), &["diff", "--cached", "--name-only"]);
    assert!(!staged.contains(&CacheKey::of("b").to_string()));
}
