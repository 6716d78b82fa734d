//! Formula marker extraction.
//!
//! A marker is an `<img>` element whose `alt` attribute reads
//! `latex:<formula>` and which carries a `src` attribute. Attribute order
//! does not matter. Elements without both attributes are not markers and are
//! never touched.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

// Quoted attribute values may contain `>`.
static RE_IMG_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<img\b(?:[^>"']|"[^"]*"|'[^']*')*>"#).unwrap());

static RE_LATEX_ALT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s(?i:alt)\s*=\s*"latex:([^"]*)""#).unwrap());

static RE_SRC: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\s(?i:src)\s*=\s*"([^"]*)""#).unwrap());

/// One marker inside the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaOccurrence<'a> {
    /// The whole `<img …>` element as it appears in the document.
    pub raw_markup: &'a str,
    /// Formula body after the `latex:` prefix, verbatim.
    pub formula_text: &'a str,
    /// Current `src` value, possibly stale.
    pub original_image_ref: &'a str,
    /// Byte range of `raw_markup` in the document.
    pub span: Range<usize>,
    /// Byte range of the `src` value, relative to `raw_markup`.
    src_span: Range<usize>,
}

impl FormulaOccurrence<'_> {
    /// The element with its `src` value replaced; everything else is kept.
    pub fn with_src(&self, new_src: &str) -> String {
        let mut out = String::with_capacity(self.raw_markup.len() + new_src.len());
        out.push_str(&self.raw_markup[..self.src_span.start]);
        out.push_str(new_src);
        out.push_str(&self.raw_markup[self.src_span.end..]);
        out
    }
}

/// Lazy, left-to-right, non-overlapping scan over a document.
///
/// Cloning yields an independent scan from the same position, so a fresh
/// [`extract`] (or a clone taken before iterating) restarts the sequence.
#[derive(Debug, Clone)]
pub struct Formulas<'a> {
    text: &'a str,
    pos: usize,
}

/// Scan `text` for formula markers.
pub fn extract(text: &str) -> Formulas<'_> {
    Formulas { text, pos: 0 }
}

impl<'a> Iterator for Formulas<'a> {
    type Item = FormulaOccurrence<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos <= self.text.len() {
            let tag = RE_IMG_TAG.find_at(self.text, self.pos)?;
            self.pos = tag.end();
            if let Some(occurrence) = parse_marker(tag.as_str(), tag.start()) {
                return Some(occurrence);
            }
        }
        None
    }
}

fn parse_marker(markup: &str, offset: usize) -> Option<FormulaOccurrence<'_>> {
    let alt = RE_LATEX_ALT.captures(markup)?.get(1)?;
    let src = RE_SRC.captures(markup)?.get(1)?;
    Some(FormulaOccurrence {
        raw_markup: markup,
        formula_text: alt.as_str(),
        original_image_ref: src.as_str(),
        span: offset..offset + markup.len(),
        src_span: src.range(),
    })
}
