//! Classification code strings: splitting, padding and prefix relations.

/// Width of a leaf (level 4) code
pub const LEAF_CODE_WIDTH: usize = 4;

/// Split a combined `"<code> <label>"` cell at the first space.
///
/// A cell without a space is all code and yields an empty label.
#[must_use]
pub fn split_code_label(value: &str) -> (&str, &str) {
    value.split_once(' ').unwrap_or((value, ""))
}

/// Left-pad a code with zeros to `width` characters; longer codes are unchanged
#[must_use]
pub fn zero_pad(code: &str, width: usize) -> String {
    format!("{code:0>width$}")
}

/// Normalize a leaf code to its 4-character form
#[must_use]
pub fn pad_leaf_code(code: &str) -> String {
    zero_pad(code, LEAF_CODE_WIDTH)
}

/// Strip leading zeros from a level 1-3 code.
///
/// A code made only of zeros keeps a single `"0"` so that the group stays
/// addressable.
#[must_use]
pub fn strip_code(code: &str) -> String {
    let stripped = code.trim_start_matches('0');
    if stripped.is_empty() && !code.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Whether a (stripped) level-`level` code is an ancestor of a leaf code
#[must_use]
pub fn is_ancestor_code(ancestor: &str, level: u8, leaf: &str) -> bool {
    let padded = zero_pad(ancestor, usize::from(level));
    padded.len() == usize::from(level) && pad_leaf_code(leaf).starts_with(&padded)
}
