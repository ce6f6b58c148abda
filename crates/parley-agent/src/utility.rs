//! Utility specifications.
//!
//! Utilities arrive either keyed by atom (`"first_True" → 10.0`) or as a
//! nested `issue → value → utility` map. Both canonicalise to the atom form.

use std::collections::BTreeMap;

use parley_core::{IssueIndex, NegotiationSpace, ValueIndex, atom};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A utility table in either of its accepted shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UtilitySpec {
    /// Atom → utility.
    Atoms(BTreeMap<String, f64>),
    /// Issue → value → utility.
    Nested(BTreeMap<String, BTreeMap<String, f64>>),
}

impl Default for UtilitySpec {
    fn default() -> Self {
        Self::Atoms(BTreeMap::new())
    }
}

impl UtilitySpec {
    /// Builds an atom-keyed spec from `(atom, utility)` pairs.
    pub fn atoms<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self::Atoms(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Canonical atom-keyed form.
    #[must_use]
    pub fn canonical(&self) -> BTreeMap<String, f64> {
        match self {
            Self::Atoms(map) => map.clone(),
            Self::Nested(nested) => nested
                .iter()
                .flat_map(|(issue, row)| {
                    row.iter()
                        .map(move |(value, &utility)| (atom::encode(issue, value), utility))
                })
                .collect(),
        }
    }

    /// Resolves every atom against `space`.
    ///
    /// # Errors
    ///
    /// Fails on malformed atoms or on issues or values unknown to `space`.
    pub fn resolve(&self, space: &NegotiationSpace) -> Result<Vec<(IssueIndex, ValueIndex, f64)>> {
        self.canonical()
            .iter()
            .map(|(key, &utility)| -> Result<(IssueIndex, ValueIndex, f64)> {
                let (issue, value) = atom::decode(key)?;
                let (i, v) = space.resolve(&issue, &value)?;
                Ok((i, v, utility))
            })
            .collect()
    }
}
