//! Atomic constraints and the per-agent constraint store.
//!
//! An [`AtomicConstraint`] forbids one `(issue, value)` assignment. The
//! [`ConstraintStore`] keeps the constraints an agent authored itself
//! (*own*) apart from those it received (*opponent*), and maintains a
//! forbidden-value mask so the unconstrained view and the satisfiability
//! flag are cheap to query.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::atom;
use crate::error::{CoreError, Result};
use crate::offer::Offer;
use crate::space::{IssueIndex, NegotiationSpace, ValueIndex};
use crate::strategy::Strategy;

/// A single forbidden `(issue, value)` assignment.
///
/// Ordering is lexicographic on `(issue, value)`, which is also the order
/// in which a store reports violated constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AtomicConstraint {
    /// Constrained issue.
    pub issue: IssueIndex,
    /// Forbidden value.
    pub value: ValueIndex,
}

impl AtomicConstraint {
    /// Creates a constraint from indices.
    #[must_use]
    pub const fn new(issue: IssueIndex, value: ValueIndex) -> Self {
        Self { issue, value }
    }

    /// Creates a constraint from issue and value names.
    ///
    /// # Errors
    ///
    /// Fails if either name is unknown to `space`.
    pub fn from_names(space: &NegotiationSpace, issue: &str, value: &str) -> Result<Self> {
        let (issue, value) = space.resolve(issue, value)?;
        Ok(Self { issue, value })
    }

    /// Creates a constraint from its atom form.
    ///
    /// # Errors
    ///
    /// Fails on a malformed atom or unknown names.
    pub fn from_atom(space: &NegotiationSpace, atom: &str) -> Result<Self> {
        let (issue, value) = atom::decode(atom)?;
        Self::from_names(space, &issue, &value)
    }

    /// Returns true unless `(issue, value)` is exactly the forbidden pair.
    #[must_use]
    pub fn satisfied_by_assignment(&self, issue: IssueIndex, value: ValueIndex) -> bool {
        !(issue == self.issue && value == self.value)
    }

    /// Returns true if the offer does not choose the forbidden value.
    #[must_use]
    pub fn satisfied_by_offer(&self, offer: &Offer) -> bool {
        offer.choices().get(self.issue) != Some(&self.value)
    }

    /// Returns true if the strategy puts no mass on the forbidden value.
    #[must_use]
    pub fn satisfied_by_strategy(&self, strategy: &Strategy) -> bool {
        strategy.probability(self.issue, self.value) == 0.0
    }

    /// Atom form of the forbidden pair.
    #[must_use]
    pub fn atom(&self, space: &NegotiationSpace) -> String {
        atom::encode(
            space.issue_name(self.issue).unwrap_or_default(),
            space.value_name(self.issue, self.value).unwrap_or_default(),
        )
    }

    /// Displays the constraint with names resolved against `space`.
    #[must_use]
    pub fn display<'a>(&'a self, space: &'a NegotiationSpace) -> impl fmt::Display + 'a {
        DisplayConstraint {
            constraint: self,
            space,
        }
    }
}

struct DisplayConstraint<'a> {
    constraint: &'a AtomicConstraint,
    space: &'a NegotiationSpace,
}

impl fmt::Display for DisplayConstraint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.constraint;
        write!(
            f,
            "{} != {}",
            self.space.issue_name(c.issue).unwrap_or("?"),
            self.space.value_name(c.issue, c.value).unwrap_or("?")
        )
    }
}

/// Which side authored a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintOrigin {
    /// Authored (or discovered) by this agent.
    Own,
    /// Received from the opponent.
    Opponent,
}

/// Own and opponent constraint sets plus the derived forbidden-value view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintStore {
    own: BTreeSet<AtomicConstraint>,
    opponent: BTreeSet<AtomicConstraint>,
    forbidden: Vec<Vec<bool>>,
}

impl ConstraintStore {
    /// Creates an empty store sized for `space`.
    #[must_use]
    pub fn new(space: &NegotiationSpace) -> Self {
        Self {
            own: BTreeSet::new(),
            opponent: BTreeSet::new(),
            forbidden: space.domain_sizes().into_iter().map(|n| vec![false; n]).collect(),
        }
    }

    /// Adds a constraint authored by this agent.
    ///
    /// Returns `Ok(true)` if the constraint was new to the own set.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConstraintOutOfSpace`] if the constraint does not
    /// refer to a value of this store's space.
    pub fn add_own(&mut self, constraint: AtomicConstraint) -> Result<bool> {
        self.add(constraint, ConstraintOrigin::Own)
    }

    /// Adds a constraint received from the opponent.
    ///
    /// # Errors
    ///
    /// See [`ConstraintStore::add_own`].
    pub fn add_opponent(&mut self, constraint: AtomicConstraint) -> Result<bool> {
        self.add(constraint, ConstraintOrigin::Opponent)
    }

    /// Adds a constraint to the set selected by `origin`.
    ///
    /// # Errors
    ///
    /// See [`ConstraintStore::add_own`].
    pub fn add(&mut self, constraint: AtomicConstraint, origin: ConstraintOrigin) -> Result<bool> {
        let slot = self
            .forbidden
            .get_mut(constraint.issue)
            .and_then(|row| row.get_mut(constraint.value))
            .ok_or(CoreError::ConstraintOutOfSpace {
                issue: constraint.issue,
                value: constraint.value,
            })?;
        *slot = true;

        let inserted = match origin {
            ConstraintOrigin::Own => self.own.insert(constraint),
            ConstraintOrigin::Opponent => self.opponent.insert(constraint),
        };
        Ok(inserted)
    }

    /// Constraints authored by this agent.
    #[must_use]
    pub fn own(&self) -> &BTreeSet<AtomicConstraint> {
        &self.own
    }

    /// Constraints received from the opponent.
    #[must_use]
    pub fn opponent(&self) -> &BTreeSet<AtomicConstraint> {
        &self.opponent
    }

    /// Union of own and opponent constraints.
    #[must_use]
    pub fn all(&self) -> BTreeSet<AtomicConstraint> {
        self.own.union(&self.opponent).copied().collect()
    }

    /// Total number of distinct constraints held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.own.len() + self.opponent.difference(&self.own).count()
    }

    /// Returns true if no constraint is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.own.is_empty() && self.opponent.is_empty()
    }

    /// Returns true if any held constraint forbids `(issue, value)`.
    #[must_use]
    pub fn is_forbidden(&self, issue: IssueIndex, value: ValueIndex) -> bool {
        self.forbidden
            .get(issue)
            .and_then(|row| row.get(value))
            .copied()
            .unwrap_or(false)
    }

    /// Values of `issue` not forbidden by any constraint, in domain order.
    #[must_use]
    pub fn unconstrained_values(&self, issue: IssueIndex) -> Vec<ValueIndex> {
        self.forbidden.get(issue).map_or_else(Vec::new, |row| {
            row.iter()
                .enumerate()
                .filter(|(_, forbidden)| !**forbidden)
                .map(|(value, _)| value)
                .collect()
        })
    }

    /// Returns true if every issue still has at least one unconstrained value.
    #[must_use]
    pub fn is_satisfiable(&self) -> bool {
        self.forbidden.iter().all(|row| row.iter().any(|f| !f))
    }

    /// Returns true if the offer violates no held constraint.
    #[must_use]
    pub fn satisfied_by(&self, offer: &Offer) -> bool {
        offer
            .choices()
            .iter()
            .enumerate()
            .all(|(issue, &value)| !self.is_forbidden(issue, value))
    }

    /// First own constraint (in `(issue, value)` order) violated by `offer`.
    #[must_use]
    pub fn first_violated_own(&self, offer: &Offer) -> Option<AtomicConstraint> {
        self.own
            .iter()
            .find(|c| !c.satisfied_by_offer(offer))
            .copied()
    }
}
