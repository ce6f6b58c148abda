//! Offers: Complete assignments of exactly one value per issue.
//!
//! An [`Offer`] stores the chosen value index for each issue, so the
//! "exactly one 1.0 per row" invariant of the indicator form holds by
//! construction. The indicator form is still available for the boundary
//! through [`Offer::indicator_rows`] and [`Offer::from_indicator_rows`].

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::atom;
use crate::error::{CoreError, Result};
use crate::space::{IssueIndex, NegotiationSpace, ValueIndex};

/// A complete assignment of one value per issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Offer {
    choices: Vec<ValueIndex>,
}

impl Offer {
    /// Builds an offer from chosen value indices, one per issue.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedOffer`] if the number of choices does not
    /// match the number of issues or a choice is outside its domain.
    pub fn from_indices(space: &NegotiationSpace, choices: Vec<ValueIndex>) -> Result<Self> {
        let offer = Self { choices };
        offer.check(space)?;
        Ok(offer)
    }

    /// Checks that the offer assigns one in-range value to every issue of `space`.
    ///
    /// Deserialised offers carry no space, so receivers run this before use.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedOffer`] on a length or range mismatch.
    pub fn check(&self, space: &NegotiationSpace) -> Result<()> {
        if self.choices.len() != space.issue_count() {
            return Err(CoreError::MalformedOffer(format!(
                "expected {} choices, got {}",
                space.issue_count(),
                self.choices.len()
            )));
        }
        for (issue, &value) in self.choices.iter().enumerate() {
            if value >= space.domain_size(issue) {
                return Err(CoreError::MalformedOffer(format!(
                    "value index {value} out of range for issue {issue}"
                )));
            }
        }
        Ok(())
    }

    /// Builds an offer from value indices without checking them against a space.
    ///
    /// Callers must guarantee one in-range choice per issue; use
    /// [`Offer::from_indices`] for untrusted input.
    #[must_use]
    pub fn from_indices_unchecked(choices: Vec<ValueIndex>) -> Self {
        Self { choices }
    }

    /// Builds an offer from `(issue, value)` name pairs.
    ///
    /// # Errors
    ///
    /// Fails on unknown names, on an issue assigned twice, or when an issue
    /// is left unassigned.
    pub fn from_pairs<'a, I>(space: &NegotiationSpace, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut choices: Vec<Option<ValueIndex>> = vec![None; space.issue_count()];
        for (issue, value) in pairs {
            let (i, v) = space.resolve(issue, value)?;
            if choices[i].replace(v).is_some() {
                return Err(CoreError::MalformedOffer(format!(
                    "issue '{issue}' assigned more than once"
                )));
            }
        }
        let choices = choices
            .into_iter()
            .enumerate()
            .map(|(i, choice)| {
                choice.ok_or_else(|| {
                    CoreError::MalformedOffer(format!(
                        "issue '{}' is unassigned",
                        space.issue_name(i).unwrap_or_default()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { choices })
    }

    /// Builds an offer from the nested indicator form
    /// `issue → (value → {0.0, 1.0})`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedOffer`] unless every issue has a row,
    /// every row covers exactly the issue's domain, and each row contains
    /// exactly one `1.0` with every other entry `0.0`.
    pub fn from_indicator_rows(
        space: &NegotiationSpace,
        rows: &BTreeMap<String, BTreeMap<String, f64>>,
    ) -> Result<Self> {
        if rows.len() != space.issue_count() {
            return Err(CoreError::MalformedOffer(format!(
                "expected {} issue rows, got {}",
                space.issue_count(),
                rows.len()
            )));
        }

        let mut choices = vec![0; space.issue_count()];
        for (issue_name, row) in rows {
            let issue = space.issue_index(issue_name)?;
            if row.len() != space.domain_size(issue) {
                return Err(CoreError::MalformedOffer(format!(
                    "row for '{issue_name}' does not cover its domain"
                )));
            }

            let mut chosen = None;
            for (value_name, &indicator) in row {
                let (_, value) = space.resolve(issue_name, value_name)?;
                if indicator == 1.0 {
                    if chosen.replace(value).is_some() {
                        return Err(CoreError::MalformedOffer(format!(
                            "row for '{issue_name}' selects more than one value"
                        )));
                    }
                } else if indicator != 0.0 {
                    return Err(CoreError::MalformedOffer(format!(
                        "row for '{issue_name}' has non-indicator entry {indicator}"
                    )));
                }
            }
            choices[issue] = chosen.ok_or_else(|| {
                CoreError::MalformedOffer(format!("row for '{issue_name}' selects no value"))
            })?;
        }

        Ok(Self { choices })
    }

    /// Chosen value index for `issue`.
    ///
    /// # Panics
    ///
    /// Panics if `issue` is out of range for this offer.
    #[must_use]
    pub fn chosen(&self, issue: IssueIndex) -> ValueIndex {
        self.choices[issue]
    }

    /// All chosen value indices, in issue order.
    #[must_use]
    pub fn choices(&self) -> &[ValueIndex] {
        &self.choices
    }

    /// Number of issues covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.choices.len()
    }

    /// Returns true for an offer over a space without issues.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Sparse form: the `(issue, value)` pairs that are set.
    #[must_use]
    pub fn sparse(&self) -> Vec<(IssueIndex, ValueIndex)> {
        self.choices.iter().copied().enumerate().collect()
    }

    /// Atom form, one atom per issue.
    #[must_use]
    pub fn atoms(&self, space: &NegotiationSpace) -> Vec<String> {
        self.named_pairs(space)
            .map(|(issue, value)| atom::encode(issue, value))
            .collect()
    }

    /// Indicator form `issue → (value → {0.0, 1.0})`.
    #[must_use]
    pub fn indicator_rows(
        &self,
        space: &NegotiationSpace,
    ) -> BTreeMap<String, BTreeMap<String, f64>> {
        space
            .issues()
            .map(|issue| {
                let row = space
                    .values(issue)
                    .iter()
                    .enumerate()
                    .map(|(value, name)| {
                        let indicator = if self.choices.get(issue) == Some(&value) {
                            1.0
                        } else {
                            0.0
                        };
                        (name.clone(), indicator)
                    })
                    .collect();
                (space.issue_name(issue).unwrap_or_default().to_string(), row)
            })
            .collect()
    }

    /// Renders the offer as one indented `issue: value` line per issue.
    #[must_use]
    pub fn describe(&self, space: &NegotiationSpace) -> String {
        let mut out = String::new();
        for (issue, value) in self.named_pairs(space) {
            let _ = writeln!(out, "    {issue}: {value}");
        }
        out
    }

    fn named_pairs<'s>(
        &'s self,
        space: &'s NegotiationSpace,
    ) -> impl Iterator<Item = (&'s str, &'s str)> + 's {
        self.choices.iter().enumerate().map(|(issue, &value)| {
            (
                space.issue_name(issue).unwrap_or_default(),
                space.value_name(issue, value).unwrap_or_default(),
            )
        })
    }
}
