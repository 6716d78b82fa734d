//! CLI binary for texcache.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `Config` and prints a run summary.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use texcache::{run, Config, ProgressCallback, RenderProgressCallback, RunSummary};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar over the formula occurrences, with one
/// log line per fresh render.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} formulas  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Rendering");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl RenderProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_formula_start(&self, _index: usize, _total: usize, formula: &str) {
        let shown: String = formula.chars().take(40).collect();
        self.bar.set_message(shown);
    }

    fn on_cache_hit(&self, _index: usize, _total: usize, _file_name: &str) {
        self.bar.inc(1);
    }

    fn on_render_complete(&self, index: usize, total: usize, file_name: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            green("✓"),
            index,
            total,
            dim(file_name)
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _rendered: usize, _cache_hits: usize) {
        self.bar.finish_and_clear();
    }
}

/// Render LaTeX formulas embedded in an HTML document to cached PNG images.
#[derive(Parser, Debug)]
#[command(
    name = "texcache",
    version,
    about = "Render LaTeX formulas embedded in HTML to a content-addressed PNG cache",
    long_about = "Scan an HTML document for <img alt=\"latex:...\" src=\"...\"> markers, render \
each distinct formula once to <cache-dir>/<md5>.png, point every src at its image and, inside a \
git working tree, stage referenced images and delete orphaned ones.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// HTML document to process in place.
    document: PathBuf,

    /// Rasterisation resolution in dots per inch.
    #[arg(long, env = "TEXCACHE_DPI", default_value_t = 128,
          value_parser = clap::value_parser!(u32).range(16..=2400))]
    dpi: u32,

    /// Cache subdirectory, relative to the document.
    #[arg(long, env = "TEXCACHE_CACHE_DIR", default_value = "tex")]
    cache_dir: PathBuf,

    /// Do not stage or prune cache entries with git.
    #[arg(long, env = "TEXCACHE_NO_TRACKING")]
    no_tracking: bool,

    /// Verbosity: -v logs each render, -vv also shows tool output.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// LaTeX preamble placed before each formula.
    #[arg(long, env = "TEXCACHE_HEADER")]
    header: Option<PathBuf>,

    /// LaTeX postamble placed after each formula.
    #[arg(long, env = "TEXCACHE_FOOTER")]
    footer: Option<PathBuf>,

    /// LaTeX compiler producing PDF.
    #[arg(long, env = "TEXCACHE_LATEX", default_value = "pdflatex")]
    latex: String,

    /// PDF-to-raster converter.
    #[arg(long, env = "TEXCACHE_RASTERIZER", default_value = "pdftoppm")]
    rasterizer: String,

    /// Image trim/convert tool.
    #[arg(long, env = "TEXCACHE_CONVERTER", default_value = "convert")]
    converter: String,

    /// Print the run summary as JSON on stdout.
    #[arg(long, env = "TEXCACHE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TEXCACHE_NO_PROGRESS")]
    no_progress: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // Log lines and the bar would interleave; the bar only runs when quiet.
    let show_progress = cli.verbose == 0 && !cli.no_progress && !cli.json;
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RenderProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress)?;
    let summary = run(&cli.document, &config)
        .with_context(|| format!("Failed to process {}", cli.document.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else {
        print_summary(&summary);
    }

    Ok(())
}

/// Map CLI args to `Config`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<Config> {
    let mut builder = Config::builder()
        .dpi(cli.dpi)
        .cache_dir(&cli.cache_dir)
        .no_tracking(cli.no_tracking)
        .verbosity(cli.verbose)
        .latex_program(&cli.latex)
        .rasterizer_program(&cli.rasterizer)
        .converter_program(&cli.converter);

    if let Some(ref header) = cli.header {
        builder = builder.header_template(header);
    }
    if let Some(ref footer) = cli.footer {
        builder = builder.footer_template(footer);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(summary: &RunSummary) {
    let p = &summary.process;
    eprintln!(
        "{}  {} formulas  {} rendered  {} cached  →  {}",
        green("✔"),
        p.occurrences,
        p.rendered.len(),
        p.cache_hits,
        if p.changed {
            bold(&p.document.display().to_string())
        } else {
            dim("unchanged")
        },
    );
    if let Some(ref r) = summary.reconcile {
        if !r.removed.is_empty() {
            eprintln!("   {} orphaned images pruned", dim(&r.removed.len().to_string()));
        }
    }
}
