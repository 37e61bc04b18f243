//! Pagination: normalised text → wrapped lines → fixed-size pages.
//!
//! The work is split in two so the arithmetic can be tested without a font
//! file or a filesystem:
//!
//! 1. [`compute_layout`] — pure geometry. Given the usable area and two font
//!    measurements it derives characters per line, line height and lines per
//!    page, then wraps the text with [`wrap_text`].
//! 2. [`paginate`] — draws each `lines_per_page` chunk onto a canvas with a
//!    real [`PageFont`] and returns an in-memory [`Document`].
//!
//! Writing the pages to disk is a separate step,
//! [`crate::pipeline::persist::persist_pages`].
//!
//! Characters per line is `floor(usable_width / advance('x'))`. Proportional
//! fonts make this an estimate; lines of wide glyphs can overrun the right
//! margin slightly.

use crate::config::PageGeometry;
use crate::error::BenchError;
use crate::pipeline::render::{render_lines, PageFont};
use image::RgbImage;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// The two font measurements the layout needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    /// Advance width of the average glyph, in pixels.
    pub advance_width: f32,
    /// Ink height (bottom − top) of the reference sample, in pixels.
    pub reference_height: f32,
}

/// Result of laying text out on a page geometry, before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub chars_per_line: usize,
    pub line_height: f32,
    pub lines_per_page: usize,
    /// Every wrapped line of the document, in source order.
    pub lines: Vec<String>,
}

impl Layout {
    /// Consecutive page-sized slices of [`Layout::lines`]; only the last may be short.
    pub fn page_chunks(&self) -> std::slice::Chunks<'_, String> {
        self.lines.chunks(self.lines_per_page)
    }

    pub fn page_count(&self) -> usize {
        self.lines.len().div_ceil(self.lines_per_page)
    }
}

/// Derive line and page capacity from the geometry and wrap `text`.
pub fn compute_layout(
    text: &str,
    geometry: &PageGeometry,
    metrics: &FontMetrics,
) -> Result<Layout, BenchError> {
    geometry.validate()?;

    let usable_width = geometry.usable_width() as f32;
    let usable_height = geometry.usable_height() as f32;

    let chars_per_line = if metrics.advance_width > 0.0 {
        (usable_width / metrics.advance_width).floor() as usize
    } else {
        0
    };
    if chars_per_line == 0 {
        return Err(BenchError::InvalidConfig(format!(
            "glyph advance {:.1}px does not fit in usable width {}px",
            metrics.advance_width, usable_width
        )));
    }

    let line_height = metrics.reference_height + geometry.line_spacing as f32;
    let lines_per_page = if line_height > 0.0 {
        (usable_height / line_height).floor() as usize
    } else {
        0
    };
    if lines_per_page == 0 {
        return Err(BenchError::InvalidConfig(format!(
            "line height {:.1}px does not fit in usable height {}px",
            line_height, usable_height
        )));
    }

    let lines = wrap_text(text, chars_per_line);
    debug!(
        "Layout: {} chars/line, {:.1}px line height, {} lines/page, {} lines",
        chars_per_line,
        line_height,
        lines_per_page,
        lines.len()
    );

    Ok(Layout {
        chars_per_line,
        line_height,
        lines_per_page,
        lines,
    })
}

// ── Wrapping ─────────────────────────────────────────────────────────────

/// Break points are ASCII whitespace only; NBSP and other Unicode spaces
/// stay inside words.
fn is_break_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\u{0b}' | '\u{0c}' | '\r')
}

fn is_word_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn is_letter(c: char) -> bool {
    c == '_' || (c.is_alphanumeric() && !c.is_numeric())
}

/// Characters that may precede an em-dash (`--`) break.
fn is_dash_lead(c: char) -> bool {
    is_word_char(c) || matches!(c, '!' | '"' | '\'' | '&' | '.' | ',' | '?')
}

/// Greedy word wrap to at most `width` characters per line.
///
/// Follows the classic fill rules:
///
/// * tabs expand to 8-column stops and every ASCII whitespace character
///   becomes a space;
/// * lines may break after a hyphen inside a word (`well-` / `known`) and
///   around a `--` dash between words;
/// * whitespace at a line break is dropped, except before the first line;
/// * a word longer than the line budget first fills the rest of the current
///   line, then continues in `width`-sized pieces, preferring to cut just
///   after a hyphen.
///
/// Widths are measured in `char`s.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut chunks = split_chunks(&expand_tabs(text));
    chunks.reverse();

    let mut lines: Vec<String> = Vec::new();
    while !chunks.is_empty() {
        let mut line: Vec<Vec<char>> = Vec::new();
        let mut len = 0usize;

        if !lines.is_empty() && chunks.last().is_some_and(|c| is_blank(c)) {
            chunks.pop();
        }

        while let Some(chunk) = chunks.last() {
            if len + chunk.len() > width {
                break;
            }
            len += chunk.len();
            line.extend(chunks.pop());
        }

        if chunks.last().is_some_and(|c| c.len() > width) {
            split_long_chunk(&mut chunks, &mut line, width - len);
        }

        if line.last().is_some_and(|c| is_blank(c)) {
            line.pop();
        }

        if !line.is_empty() {
            lines.push(line.concat().into_iter().collect());
        }
    }
    lines
}

/// Move the head of the over-long top chunk onto `line`.
fn split_long_chunk(chunks: &mut Vec<Vec<char>>, line: &mut Vec<Vec<char>>, space_left: usize) {
    let Some(chunk) = chunks.pop() else {
        return;
    };
    let mut end = space_left.min(chunk.len());
    if let Some(hyphen) = chunk[..end].iter().rposition(|&c| c == '-') {
        if hyphen > 0 && chunk[..hyphen].iter().any(|&c| c != '-') {
            end = hyphen + 1;
        }
    }
    let rest = chunk[end..].to_vec();
    line.push(chunk[..end].to_vec());
    chunks.push(rest);
}

fn is_blank(chunk: &[char]) -> bool {
    chunk.iter().all(|c| c.is_whitespace())
}

/// Expand tabs to 8-column stops; columns restart after `\n` and `\r`.
fn expand_tabs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut column = 0usize;
    for c in text.chars() {
        match c {
            '\t' => {
                let pad = 8 - column % 8;
                out.extend(std::iter::repeat(' ').take(pad));
                column += pad;
            }
            '\n' | '\r' => {
                out.push(c);
                column = 0;
            }
            _ => {
                out.push(c);
                column += 1;
            }
        }
    }
    out
}

/// Split text into wrap units: whitespace runs (as spaces), `--` dashes
/// between words, and words cut after their hyphens.
fn split_chunks(text: &str) -> Vec<Vec<char>> {
    let chars: Vec<char> = text.chars().collect();
    let at = |i: usize| chars.get(i).copied();
    // A run of two or more '-' starting at `i` and followed by a word char.
    let dash_run_end = |i: usize| -> Option<usize> {
        let mut j = i;
        while at(j) == Some('-') {
            j += 1;
        }
        (j - i >= 2 && at(j).is_some_and(is_word_char)).then_some(j)
    };

    let mut chunks = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if is_break_space(chars[i]) {
            let mut j = i;
            while j < chars.len() && is_break_space(chars[j]) {
                j += 1;
            }
            chunks.push(vec![' '; j - i]);
            i = j;
            continue;
        }

        if i > 0 && is_dash_lead(chars[i - 1]) {
            if let Some(j) = dash_run_end(i) {
                chunks.push(chars[i..j].to_vec());
                i = j;
                continue;
            }
        }

        let mut end = chars.len();
        let mut k = i + 1;
        while k <= chars.len() {
            if k == chars.len() || is_break_space(chars[k]) {
                end = k;
                break;
            }
            if chars[k] == '-' && hyphen_breaks_after(&chars, k) {
                end = k + 1;
                break;
            }
            if is_dash_lead(chars[k - 1]) && dash_run_end(k).is_some() {
                end = k;
                break;
            }
            k += 1;
        }
        chunks.push(chars[i..end].to_vec());
        i = end;
    }
    chunks
}

/// A hyphen at `k` ends a chunk when it follows two letters (or a
/// letter-hyphen-letter run) and is followed by at least two letters,
/// optionally hyphen-separated.
fn hyphen_breaks_after(chars: &[char], k: usize) -> bool {
    let at = |i: usize| chars.get(i).copied();
    let before = |n: usize| k.checked_sub(n).and_then(at);

    let two_letters = before(1).is_some_and(is_letter) && before(2).is_some_and(is_letter);
    let hyphen_run = before(1).is_some_and(is_letter)
        && before(2) == Some('-')
        && before(3).is_some_and(is_letter);
    if !(two_letters || hyphen_run) {
        return false;
    }

    at(k + 1).is_some_and(is_letter)
        && (at(k + 2).is_some_and(is_letter)
            || (at(k + 2) == Some('-') && at(k + 3).is_some_and(is_letter)))
}

// ── Pages ────────────────────────────────────────────────────────────────

/// One rendered page and the text drawn on it.
#[derive(Debug, Clone)]
pub struct Page {
    number: usize,
    text: String,
    line_count: usize,
    image: RgbImage,
}

impl Page {
    /// Assemble a page from its lines and their rendering.
    pub fn new(number: usize, lines: &[String], image: RgbImage) -> Self {
        Self {
            number,
            text: lines.join("\n"),
            line_count: lines.len(),
            image,
        }
    }

    /// 1-based page number.
    pub fn number(&self) -> usize {
        self.number
    }

    /// The page's lines joined by `\n`.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Number of `char`s in [`Page::text`].
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// A paginated document. Page `i` (0-based) has number `i + 1`.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pages: Vec<Page>,
    chars_per_line: usize,
    lines_per_page: usize,
}

impl Document {
    /// Build one page per layout chunk, numbered from 1, using `render`
    /// to rasterise each chunk.
    pub fn from_layout<F>(layout: &Layout, mut render: F) -> Self
    where
        F: FnMut(&[String]) -> RgbImage,
    {
        let pages = layout
            .page_chunks()
            .enumerate()
            .map(|(i, chunk)| Page::new(i + 1, chunk, render(chunk)))
            .collect();
        Self {
            pages,
            chars_per_line: layout.chars_per_line,
            lines_per_page: layout.lines_per_page,
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn chars_per_line(&self) -> usize {
        self.chars_per_line
    }

    pub fn lines_per_page(&self) -> usize {
        self.lines_per_page
    }

    /// The first `n` pages (fewer if the document is shorter).
    pub fn prefix(&self, n: usize) -> &[Page] {
        &self.pages[..n.min(self.pages.len())]
    }

    /// Page texts in page order.
    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.pages.iter().map(Page::text)
    }

    /// Page number → character count, for the diagnostic manifest.
    pub fn char_counts(&self) -> BTreeMap<usize, usize> {
        self.pages
            .iter()
            .map(|p| (p.number(), p.char_count()))
            .collect()
    }
}

/// Lay out and render `text` onto pages. Performs no I/O.
///
/// Deterministic for identical text, geometry and font. Empty (or
/// all-whitespace) text yields a document with zero pages.
pub fn paginate(
    text: &str,
    geometry: &PageGeometry,
    font: &PageFont,
) -> Result<Document, BenchError> {
    let metrics = font.metrics()?;
    let layout = compute_layout(text, geometry, &metrics)?;

    let document = Document::from_layout(&layout, |chunk| {
        render_lines(chunk, geometry, layout.line_height, font)
    });
    for page in document.pages() {
        debug!(
            "Rendered page {} → {} lines, {} chars",
            page.number(),
            page.line_count(),
            page.char_count()
        );
    }

    info!(
        "Paginated {} lines into {} pages ({} chars/line, {} lines/page)",
        layout.lines.len(),
        document.len(),
        layout.chars_per_line,
        layout.lines_per_page
    );

    Ok(document)
}
