//! Best-first enumeration generator.
//!
//! With linear additive utilities and nonnegative weights the best offer
//! picks, per issue, the value with the highest weighted utility. Sorting
//! each issue's values by that contribution turns the offer space into a
//! lattice of index tuples whose utility never increases when an index is
//! incremented; a max-heap walk over that lattice yields offers in
//! non-increasing utility order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use parley_core::{Offer, ValueIndex};
use tracing::trace;

use super::{GenerationContext, OfferGenerator};
use crate::error::GeneratorError;

#[derive(Debug, Clone)]
struct Candidate {
    utility: f64,
    order: u64,
    indices: Vec<usize>,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Higher utility first, then earlier insertion.
    fn cmp(&self, other: &Self) -> Ordering {
        self.utility
            .total_cmp(&other.utility)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Emits offers in non-increasing utility order, each at most once.
///
/// The constrained flavour still walks through constraint-violating offers
/// so the search can reach the region beyond them, but never returns one.
#[derive(Debug, Clone, Default)]
pub struct EnumerationGenerator {
    constrained: bool,
    sorted: Vec<Vec<(ValueIndex, f64)>>,
    frontier: BinaryHeap<Candidate>,
    pushed: HashSet<Offer>,
    emitted: HashSet<Offer>,
    counter: u64,
}

impl EnumerationGenerator {
    /// Creates an empty generator; call [`OfferGenerator::reindex`] before use.
    #[must_use]
    pub fn new(constrained: bool) -> Self {
        Self {
            constrained,
            ..Self::default()
        }
    }

    /// Number of candidates waiting in the frontier.
    #[must_use]
    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// Number of offers returned so far.
    #[must_use]
    pub fn emitted_count(&self) -> usize {
        self.emitted.len()
    }

    fn decode(&self, indices: &[usize]) -> Offer {
        Offer::from_indices_unchecked(
            indices
                .iter()
                .enumerate()
                .map(|(issue, &i)| self.sorted[issue][i].0)
                .collect(),
        )
    }

    fn utility_of(&self, indices: &[usize]) -> f64 {
        indices
            .iter()
            .enumerate()
            .map(|(issue, &i)| self.sorted[issue][i].1)
            .sum()
    }

    fn push(&mut self, indices: Vec<usize>, utility: f64) {
        self.frontier.push(Candidate {
            utility,
            order: self.counter,
            indices,
        });
        self.counter += 1;
    }
}

impl OfferGenerator for EnumerationGenerator {
    fn generate_offer(&mut self, ctx: &GenerationContext<'_>) -> Result<Offer, GeneratorError> {
        if ctx.evaluator.as_linear().is_none() {
            return Err(GeneratorError::RequiresLinearEvaluator);
        }

        loop {
            let candidate = self.frontier.pop().ok_or(GeneratorError::Exhausted)?;

            for issue in 0..candidate.indices.len() {
                if candidate.indices[issue] + 1 >= self.sorted[issue].len() {
                    continue;
                }
                let mut next = candidate.indices.clone();
                next[issue] += 1;
                let utility = self.utility_of(&next);
                if utility < ctx.threshold {
                    continue;
                }
                let offer = self.decode(&next);
                if self.pushed.insert(offer) {
                    self.push(next, utility);
                }
            }

            let offer = self.decode(&candidate.indices);
            if self.emitted.contains(&offer) {
                continue;
            }
            if self.constrained && !ctx.constraints.satisfied_by(&offer) {
                trace!(utility = candidate.utility, "skipping constrained offer");
                continue;
            }
            self.emitted.insert(offer.clone());
            return Ok(offer);
        }
    }

    fn reindex(&mut self, ctx: &GenerationContext<'_>) {
        self.frontier.clear();
        self.pushed.clear();

        let Some(linear) = ctx.evaluator.as_linear() else {
            self.sorted.clear();
            return;
        };

        self.sorted = ctx
            .space
            .issues()
            .map(|issue| {
                let mut values: Vec<(ValueIndex, f64)> = (0..ctx.space.domain_size(issue))
                    .map(|value| (value, linear.assignment_utility(issue, value)))
                    .collect();
                // Stable: ties keep domain order.
                values.sort_by(|a, b| b.1.total_cmp(&a.1));
                values
            })
            .collect();

        let seed = vec![0; self.sorted.len()];
        let utility = self.utility_of(&seed);
        if utility >= ctx.threshold {
            let best = self.decode(&seed);
            self.pushed.insert(best);
            self.push(seed, utility);
        }
    }

    fn is_constrained(&self) -> bool {
        self.constrained
    }
}
