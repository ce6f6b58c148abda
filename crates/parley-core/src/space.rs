//! Negotiation space: The issues under negotiation and their value domains.
//!
//! Names are resolved once, at construction, into small integer indices.
//! Issues are kept sorted by name so that two value-equal spaces assign
//! identical indices; values keep their declared order.

use std::collections::BTreeMap;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::offer::Offer;

/// Index of an issue within a [`NegotiationSpace`].
pub type IssueIndex = usize;

/// Index of a value within one issue's domain.
pub type ValueIndex = usize;

/// Characters that may not appear in issue or value names.
pub const RESERVED_CHARS: [char; 2] = ['_', '\''];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Issue {
    name: String,
    values: Vec<String>,
}

/// Immutable description of the issues and their finite value domains.
///
/// Serialises as a map from issue name to its ordered values, and is
/// validated again on deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct NegotiationSpace {
    issues: Vec<Issue>,
}

impl TryFrom<BTreeMap<String, Vec<String>>> for NegotiationSpace {
    type Error = CoreError;

    fn try_from(domains: BTreeMap<String, Vec<String>>) -> Result<Self> {
        Self::from_domains(domains)
    }
}

impl From<NegotiationSpace> for BTreeMap<String, Vec<String>> {
    fn from(space: NegotiationSpace) -> Self {
        space
            .issues
            .into_iter()
            .map(|issue| (issue.name, issue.values))
            .collect()
    }
}

impl NegotiationSpace {
    /// Builds a space from `(issue, values)` pairs.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] if a name is empty or contains `_` or `'`,
    /// an issue is repeated, a domain is empty, or a value repeats within
    /// its domain.
    pub fn from_domains<I, N, V, S>(domains: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sorted: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (name, values) in domains {
            let name = name.into();
            validate_name("issue", &name)?;

            let values: Vec<String> = values.into_iter().map(Into::into).collect();
            if values.is_empty() {
                return Err(CoreError::EmptyDomain(name));
            }

            let mut seen = HashSet::with_capacity(values.len());
            for value in &values {
                validate_name("value", value)?;
                if !seen.insert(value.as_str()) {
                    return Err(CoreError::DuplicateValue {
                        issue: name.clone(),
                        value: value.clone(),
                    });
                }
            }

            if sorted.contains_key(&name) {
                return Err(CoreError::DuplicateIssue(name));
            }
            sorted.insert(name, values);
        }

        let issues = sorted
            .into_iter()
            .map(|(name, values)| Issue { name, values })
            .collect();

        Ok(Self { issues })
    }

    /// Number of issues.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    /// Number of values in the domain of `issue`.
    ///
    /// Returns 0 for an out-of-range index.
    #[must_use]
    pub fn domain_size(&self, issue: IssueIndex) -> usize {
        self.issues.get(issue).map_or(0, |i| i.values.len())
    }

    /// Domain sizes for every issue, in index order.
    #[must_use]
    pub fn domain_sizes(&self) -> Vec<usize> {
        self.issues.iter().map(|i| i.values.len()).collect()
    }

    /// Total number of distinct offers (the size of the cross product).
    ///
    /// Saturates at `u128::MAX`.
    #[must_use]
    pub fn size(&self) -> u128 {
        self.issues
            .iter()
            .fold(1u128, |acc, i| acc.saturating_mul(i.values.len() as u128))
    }

    /// Iterates issue indices.
    pub fn issues(&self) -> std::ops::Range<IssueIndex> {
        0..self.issues.len()
    }

    /// Name of an issue.
    #[must_use]
    pub fn issue_name(&self, issue: IssueIndex) -> Option<&str> {
        self.issues.get(issue).map(|i| i.name.as_str())
    }

    /// Name of a value within an issue's domain.
    #[must_use]
    pub fn value_name(&self, issue: IssueIndex, value: ValueIndex) -> Option<&str> {
        self.issues
            .get(issue)
            .and_then(|i| i.values.get(value))
            .map(String::as_str)
    }

    /// Declared values of an issue.
    #[must_use]
    pub fn values(&self, issue: IssueIndex) -> &[String] {
        self.issues.get(issue).map_or(&[], |i| i.values.as_slice())
    }

    /// Resolves an issue name to its index.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownIssue`] if no such issue exists.
    pub fn issue_index(&self, name: &str) -> Result<IssueIndex> {
        self.issues
            .binary_search_by(|i| i.name.as_str().cmp(name))
            .map_err(|_| CoreError::UnknownIssue(name.to_string()))
    }

    /// Resolves an `(issue, value)` name pair to indices.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownIssue`] or [`CoreError::UnknownValue`].
    pub fn resolve(&self, issue: &str, value: &str) -> Result<(IssueIndex, ValueIndex)> {
        let i = self.issue_index(issue)?;
        let v = self.issues[i]
            .values
            .iter()
            .position(|candidate| candidate == value)
            .ok_or_else(|| CoreError::UnknownValue {
                issue: issue.to_string(),
                value: value.to_string(),
            })?;
        Ok((i, v))
    }

    /// Iterates every offer in the space, in lexicographic index order.
    #[must_use]
    pub fn offers(&self) -> OfferIter<'_> {
        OfferIter {
            space: self,
            next: Some(vec![0; self.issues.len()]),
        }
    }
}

fn validate_name(kind: &'static str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CoreError::InvalidName {
            kind,
            name: name.to_string(),
            reason: "name cannot be empty".to_string(),
        });
    }
    if let Some(c) = name.chars().find(|c| RESERVED_CHARS.contains(c)) {
        return Err(CoreError::InvalidName {
            kind,
            name: name.to_string(),
            reason: format!("reserved character '{c}'"),
        });
    }
    Ok(())
}

/// Odometer over the cross product of all issue domains.
#[derive(Debug, Clone)]
pub struct OfferIter<'a> {
    space: &'a NegotiationSpace,
    next: Option<Vec<ValueIndex>>,
}

impl Iterator for OfferIter<'_> {
    type Item = Offer;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;

        let mut successor = current.clone();
        let mut advanced = false;
        for issue in (0..successor.len()).rev() {
            successor[issue] += 1;
            if successor[issue] < self.space.domain_size(issue) {
                advanced = true;
                break;
            }
            successor[issue] = 0;
        }
        if advanced {
            self.next = Some(successor);
        }

        Some(Offer::from_indices_unchecked(current))
    }
}
