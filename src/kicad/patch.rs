//! Byte-exact page text edits.
//!
//! Edits replace spans of the original text and nothing else: unknown
//! fields, spacing and line endings survive untouched.

use std::ops::Range;
use std::path::Path;

use super::schematic::ComponentInstance;
use super::{KicadError, KicadResult};

/// Replacement of one span of a page's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEdit {
    /// Byte offset of the span.
    pub offset: usize,
    /// Text the span must currently hold.
    pub expected: String,
    /// Text to put in its place.
    pub replacement: String,
}

impl PageEdit {
    /// Creates an edit of `expected` at `offset`.
    pub fn new(offset: usize, expected: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            offset,
            expected: expected.into(),
            replacement: replacement.into(),
        }
    }

    /// Creates an edit that rewrites an instance's unit token to `unit`.
    #[must_use]
    pub fn set_unit(instance: &ComponentInstance, unit: u32) -> Self {
        Self::new(instance.offset, instance.unit.to_string(), unit.to_string())
    }

    /// The replaced byte range in the original text.
    #[must_use]
    pub fn span(&self) -> Range<usize> {
        self.offset..self.offset + self.expected.len()
    }
}

/// Replaces an instance's unit token with `unit`.
///
/// # Errors
///
/// Returns [`KicadError::StaleSpan`] if the span does not hold the
/// instance's unit.
pub fn patch(text: &str, instance: &ComponentInstance, unit: u32) -> KicadResult<String> {
    apply_edits(&instance.page, text, &[PageEdit::set_unit(instance, unit)])
}

fn check_span(text: &str, edit: &PageEdit) -> KicadResult<()> {
    let span = edit.span();
    if span.end > text.len() {
        return Err(KicadError::stale_span(
            edit.offset,
            format!("span ends at {} past text length {}", span.end, text.len()),
        ));
    }
    if !text.is_char_boundary(span.start) || !text.is_char_boundary(span.end) {
        return Err(KicadError::stale_span(edit.offset, "span splits a character"));
    }
    let current = &text[span];
    if current != edit.expected {
        return Err(KicadError::stale_span(
            edit.offset,
            format!("expected '{}', found '{current}'", edit.expected),
        ));
    }
    Ok(())
}

/// Applies several edits to one page in a single pass.
///
/// All offsets refer to the original `text`, so the edits are independent of
/// the order they are given in.
///
/// # Errors
///
/// Returns [`KicadError::StaleSpan`] if any span does not hold its expected
/// text, and [`KicadError::SamePageConflict`] if two spans overlap.
pub fn apply_edits(page: &Path, text: &str, edits: &[PageEdit]) -> KicadResult<String> {
    let mut ordered: Vec<&PageEdit> = edits.iter().collect();
    ordered.sort_by_key(|e| e.offset);

    for edit in &ordered {
        check_span(text, edit)?;
    }
    for pair in ordered.windows(2) {
        if pair[0].span().end > pair[1].offset {
            return Err(KicadError::SamePageConflict {
                page: page.to_path_buf(),
                first: pair[0].offset,
                second: pair[1].offset,
            });
        }
    }

    let grown: usize = edits.iter().map(|e| e.replacement.len()).sum();
    let mut out = String::with_capacity(text.len() + grown);
    let mut cursor = 0;
    for edit in ordered {
        out.push_str(&text[cursor..edit.offset]);
        out.push_str(&edit.replacement);
        cursor = edit.span().end;
    }
    out.push_str(&text[cursor..]);

    Ok(out)
}
