//! Sampling generator.

use std::fmt;

use parley_core::Strategy;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use super::{GenerationContext, OfferGenerator};
use crate::error::GeneratorError;
use parley_core::Offer;

/// Default sampling budget per generated offer.
pub const DEFAULT_MAX_GENERATION_TRIES: usize = 1000;

/// Draws offers from a mixed strategy until one reaches the threshold.
///
/// The constrained flavour zeroes the probability of every forbidden
/// assignment on reindex, so sampling avoids them altogether.
pub struct RandomGenerator {
    strategy: Strategy,
    rng: StdRng,
    max_tries: usize,
    constrained: bool,
}

impl RandomGenerator {
    /// Creates a generator with a uniform strategy and a seeded RNG.
    #[must_use]
    pub fn new(
        space: &parley_core::NegotiationSpace,
        seed: u64,
        max_tries: usize,
        constrained: bool,
    ) -> Self {
        Self {
            strategy: Strategy::uniform(space),
            rng: StdRng::seed_from_u64(seed),
            max_tries,
            constrained,
        }
    }

    /// Current sampling strategy.
    #[must_use]
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }
}

impl fmt::Debug for RandomGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomGenerator")
            .field("strategy", &self.strategy)
            .field("max_tries", &self.max_tries)
            .field("constrained", &self.constrained)
            .finish_non_exhaustive()
    }
}

impl OfferGenerator for RandomGenerator {
    fn generate_offer(&mut self, ctx: &GenerationContext<'_>) -> Result<Offer, GeneratorError> {
        for _ in 0..self.max_tries {
            let offer = self
                .strategy
                .sample(ctx.space, &mut self.rng)
                .map_err(|_| GeneratorError::Exhausted)?;
            let utility = if self.constrained {
                ctx.evaluator.constrained_utility(&offer, ctx.constraints)
            } else {
                ctx.evaluator.utility(&offer)
            };
            if utility >= ctx.threshold {
                return Ok(offer);
            }
        }
        Err(GeneratorError::Exhausted)
    }

    fn reindex(&mut self, ctx: &GenerationContext<'_>) {
        if !self.constrained {
            return;
        }
        for constraint in ctx.constraints.all() {
            if self.strategy.probability(constraint.issue, constraint.value) == 0.0 {
                continue;
            }
            if let Err(e) = self
                .strategy
                .forbid(ctx.space, constraint.issue, constraint.value)
            {
                // The issue is fully constrained; the store already reports
                // the space as unsatisfiable.
                debug!(error = %e, "strategy cannot avoid constraint");
            }
        }
    }

    fn is_constrained(&self) -> bool {
        self.constrained
    }
}
