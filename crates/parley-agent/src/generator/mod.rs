//! Offer generation.
//!
//! Two families of generators propose offers at or above the agent's
//! reservation value:
//!
//! - [`RandomGenerator`]: Samples offers from a mixed [`Strategy`](parley_core::Strategy)
//! - [`EnumerationGenerator`]: Best-first enumeration in non-increasing utility order
//!
//! Each comes in a constrained flavour that never proposes an offer
//! violating a held constraint.

mod enumeration;
mod random;

use std::fmt;

use parley_core::{ConstraintStore, NegotiationSpace, Offer};

use crate::error::GeneratorError;
use crate::evaluator::Evaluator;

pub use enumeration::EnumerationGenerator;
pub use random::{DEFAULT_MAX_GENERATION_TRIES, RandomGenerator};

/// Everything a generator may consult while producing an offer.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    /// The negotiation space.
    pub space: &'a NegotiationSpace,
    /// The agent's utility function.
    pub evaluator: &'a dyn Evaluator,
    /// The agent's own and opponent constraints.
    pub constraints: &'a ConstraintStore,
    /// Absolute reservation value offers must reach.
    pub threshold: f64,
}

/// Produces the next offer an agent proposes.
pub trait OfferGenerator: fmt::Debug + Send {
    /// Next offer to propose.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::Exhausted`] once no acceptable offer is left.
    fn generate_offer(&mut self, ctx: &GenerationContext<'_>) -> Result<Offer, GeneratorError>;

    /// Rebuilds internal state after utilities, constraints or the
    /// threshold changed.
    fn reindex(&mut self, ctx: &GenerationContext<'_>);

    /// Returns true if this generator honours held constraints.
    fn is_constrained(&self) -> bool;
}
