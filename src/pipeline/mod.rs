//! Pipeline stages of a texcache run.
//!
//! Each submodule implements exactly one responsibility, so each is testable
//! on its own and the external collaborators (LaTeX toolchain, version
//! control) sit behind traits that tests replace with stubs.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ address ──▶ render ──▶ (rewrite) ──▶ reconcile
//! (markers)   (md5 path)  (toolchain)  (document)    (tracker)
//! ```
//!
//! 1. [`extract`]   — lazily scan the document for `<img alt="latex:…">` markers
//! 2. [`address`]   — map formula text to its content-addressed cache entry
//! 3. [`render`]    — materialise the entry via the three-stage toolchain,
//!    skipping work when it already exists
//! 4. [`toolchain`] — the compile / rasterize / convert capability and its
//!    subprocess implementation
//! 5. [`reconcile`] — register referenced entries, prune orphans

pub mod address;
pub mod extract;
pub mod reconcile;
pub mod render;
pub mod toolchain;
