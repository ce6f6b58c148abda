//! Mixed strategies: One probability distribution per issue.
//!
//! Stored as a flat row-major vector of probabilities with per-issue
//! offsets. Every public mutation keeps each row a distribution.

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::offer::Offer;
use crate::space::{IssueIndex, NegotiationSpace, ValueIndex};

const SUM_TOLERANCE: f64 = 1e-9;

/// Per-issue probability distributions over values.
///
/// Deserialisation checks the row layout and that every row is a
/// distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StrategyRows", into = "StrategyRows")]
pub struct Strategy {
    probabilities: Vec<f64>,
    offsets: Vec<usize>,
}

#[derive(Serialize, Deserialize)]
struct StrategyRows {
    probabilities: Vec<f64>,
    offsets: Vec<usize>,
}

impl TryFrom<StrategyRows> for Strategy {
    type Error = CoreError;

    fn try_from(rows: StrategyRows) -> Result<Self> {
        let StrategyRows {
            probabilities,
            offsets,
        } = rows;
        if offsets.first() != Some(&0) || offsets.last() != Some(&probabilities.len()) {
            return Err(CoreError::MalformedStrategy(format!(
                "offsets must run from 0 to {}",
                probabilities.len()
            )));
        }
        if offsets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CoreError::MalformedStrategy(
                "every issue needs at least one value".to_string(),
            ));
        }
        let strategy = Self {
            probabilities,
            offsets,
        };
        if !strategy.is_distribution() {
            return Err(CoreError::MalformedStrategy(
                "rows must be probability distributions".to_string(),
            ));
        }
        Ok(strategy)
    }
}

impl From<Strategy> for StrategyRows {
    fn from(strategy: Strategy) -> Self {
        Self {
            probabilities: strategy.probabilities,
            offsets: strategy.offsets,
        }
    }
}

impl Strategy {
    /// Uniform distribution over every issue's domain.
    #[must_use]
    pub fn uniform(space: &NegotiationSpace) -> Self {
        let mut probabilities = Vec::new();
        let mut offsets = Vec::with_capacity(space.issue_count() + 1);
        for issue in space.issues() {
            offsets.push(probabilities.len());
            let n = space.domain_size(issue);
            probabilities.extend(std::iter::repeat_n(1.0 / n as f64, n));
        }
        offsets.push(probabilities.len());
        Self {
            probabilities,
            offsets,
        }
    }

    /// Number of issues covered.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Probability row of one issue.
    #[must_use]
    pub fn row(&self, issue: IssueIndex) -> &[f64] {
        match (self.offsets.get(issue), self.offsets.get(issue + 1)) {
            (Some(&start), Some(&end)) => &self.probabilities[start..end],
            _ => &[],
        }
    }

    /// Probability assigned to `value` of `issue`.
    #[must_use]
    pub fn probability(&self, issue: IssueIndex, value: ValueIndex) -> f64 {
        self.row(issue).get(value).copied().unwrap_or(0.0)
    }

    /// Sets one probability and re-normalises that issue.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidProbability`] for a value outside `[0, 1]`,
    /// and [`CoreError::DegenerateDistribution`] if the issue would be left
    /// without probability mass; the strategy is unchanged in both cases.
    pub fn set_probability(
        &mut self,
        space: &NegotiationSpace,
        issue: IssueIndex,
        value: ValueIndex,
        probability: f64,
    ) -> Result<()> {
        let issue_name = || space.issue_name(issue).unwrap_or_default().to_string();

        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(CoreError::InvalidProbability {
                issue: issue_name(),
                probability,
            });
        }
        let slot = self.slot(issue, value).ok_or_else(|| CoreError::UnknownValue {
            issue: issue_name(),
            value: value.to_string(),
        })?;

        let previous = self.probabilities[slot];
        self.probabilities[slot] = probability;
        if let Err(e) = self.normalize_issue(space, issue) {
            self.probabilities[slot] = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Removes all mass from `value` of `issue` and re-normalises.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DegenerateDistribution`] if `value` was the last
    /// value with mass.
    pub fn forbid(
        &mut self,
        space: &NegotiationSpace,
        issue: IssueIndex,
        value: ValueIndex,
    ) -> Result<()> {
        self.set_probability(space, issue, value, 0.0)
    }

    /// Rescales one issue's row to sum to one.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DegenerateDistribution`] if the row sums to zero.
    pub fn normalize_issue(&mut self, space: &NegotiationSpace, issue: IssueIndex) -> Result<()> {
        let (start, end) = match (self.offsets.get(issue), self.offsets.get(issue + 1)) {
            (Some(&start), Some(&end)) => (start, end),
            _ => {
                return Err(CoreError::UnknownIssue(issue.to_string()));
            }
        };
        let total: f64 = self.probabilities[start..end].iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(CoreError::DegenerateDistribution(
                space.issue_name(issue).unwrap_or_default().to_string(),
            ));
        }
        for p in &mut self.probabilities[start..end] {
            *p /= total;
        }
        Ok(())
    }

    /// Returns true if every row is a probability distribution.
    #[must_use]
    pub fn is_distribution(&self) -> bool {
        (0..self.issue_count()).all(|issue| {
            let row = self.row(issue);
            let sum: f64 = row.iter().sum();
            row.iter().all(|p| (0.0..=1.0).contains(p)) && (sum - 1.0).abs() < SUM_TOLERANCE
        })
    }

    /// Draws one value per issue independently.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DegenerateDistribution`] if a row carries no mass.
    pub fn sample<R: Rng + ?Sized>(&self, space: &NegotiationSpace, rng: &mut R) -> Result<Offer> {
        let mut choices = Vec::with_capacity(self.issue_count());
        for issue in 0..self.issue_count() {
            let dist = WeightedIndex::new(self.row(issue)).map_err(|_| {
                CoreError::DegenerateDistribution(
                    space.issue_name(issue).unwrap_or_default().to_string(),
                )
            })?;
            choices.push(dist.sample(rng));
        }
        Ok(Offer::from_indices_unchecked(choices))
    }

    fn slot(&self, issue: IssueIndex, value: ValueIndex) -> Option<usize> {
        let start = *self.offsets.get(issue)?;
        let end = *self.offsets.get(issue + 1)?;
        (start + value < end).then_some(start + value)
    }
}
