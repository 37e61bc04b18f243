//! Whitespace normalisation ahead of re-wrapping.
//!
//! The source document's own line breaks are meaningless once the text is
//! re-flowed to a new page width, so newlines and tabs become spaces and a
//! doubled space is folded to one.
//!
//! This is a **single pass**: a run of three or more whitespace characters
//! comes out with a double space left in it. The function is not looped to a
//! fixed point.

/// Replace `\n` and `\t` with spaces, then collapse each `"  "` to `" "` once.
pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\n', " ").replace('\t', " ").replace("  ", " ")
}
