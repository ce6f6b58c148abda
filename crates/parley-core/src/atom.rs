//! Atom codec.
//!
//! An atom is the canonical string form of an `(issue, value)` pair and the
//! key used by utility and constraint tables at the API boundary. The pair
//! is written `issue_value`; when the value contains a `.` the whole atom is
//! wrapped in single quotes (`'price_1.5'`). Because neither issue nor value
//! names may contain `_` or `'`, the encoding is bijective.

use crate::error::{CoreError, Result};

/// Encodes an `(issue, value)` pair as an atom.
#[must_use]
pub fn encode(issue: &str, value: &str) -> String {
    if value.contains('.') {
        format!("'{issue}_{value}'")
    } else {
        format!("{issue}_{value}")
    }
}

/// Decodes an atom back into its `(issue, value)` pair.
///
/// # Errors
///
/// Returns [`CoreError::InvalidAtom`] when the string is not an atom produced
/// by [`encode`].
pub fn decode(atom: &str) -> Result<(String, String)> {
    let invalid = || CoreError::InvalidAtom(atom.to_string());

    let quoted = atom.len() >= 2 && atom.starts_with('\'') && atom.ends_with('\'');
    let body = if quoted { &atom[1..atom.len() - 1] } else { atom };

    let (issue, value) = body.split_once('_').ok_or_else(invalid)?;
    if issue.is_empty() || value.is_empty() || value.contains('_') {
        return Err(invalid());
    }
    if issue.contains('\'') || value.contains('\'') {
        return Err(invalid());
    }
    // Quoting is mandatory for dotted values and forbidden otherwise.
    if quoted != value.contains('.') {
        return Err(invalid());
    }

    Ok((issue.to_string(), value.to_string()))
}
