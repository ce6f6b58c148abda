//! # parley-agent
//!
//! Negotiating agents for bilateral alternating-offers negotiation.
//!
//! This crate provides:
//!
//! - **Evaluators**: [`LinearEvaluator`] and [`ProbabilisticEvaluator`] behind
//!   the [`Evaluator`] trait
//! - **Offer generators**: [`RandomGenerator`] and [`EnumerationGenerator`], each
//!   with a constrained flavour
//! - **Constraint discovery**: [`discovery`] derives own constraints from linear utilities
//! - **Protocol**: [`Message`], [`Transcript`] and the [`Agent`] state machine
//! - **Construction**: [`AgentConfig`] and [`AgentFactory`]
//!
//! ## Example
//!
//! ```rust
//! use parley_agent::{AgentConfig, AgentFactory, AgentKind, UtilitySpec};
//! use parley_core::NegotiationSpace;
//!
//! let space = NegotiationSpace::from_domains([("first", vec!["True", "False"])]).unwrap();
//! let factory = AgentFactory::new(space);
//! let utilities = UtilitySpec::atoms([("first_True", 10_000.0)]);
//!
//! let mut a = factory
//!     .build(&AgentConfig::new("A", AgentKind::Enumeration), &utilities)
//!     .unwrap();
//! let mut b = factory
//!     .build(&AgentConfig::new("B", AgentKind::Enumeration), &utilities)
//!     .unwrap();
//!
//! assert!(a.negotiate(&mut b).unwrap());
//! assert_eq!(a.transcript().len(), 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod discovery;
pub mod error;
pub mod evaluator;
pub mod factory;
pub mod generator;
pub mod message;
pub mod utility;

pub use error::{AgentError, GeneratorError};

// Re-exports for convenience
pub use agent::{Agent, AgentState, DEFAULT_MAX_ROUNDS};
pub use evaluator::{Evaluator, LinearEvaluator, ProbabilisticEvaluator, UtilityModel};
pub use factory::{
    AgentConfig, AgentFactory, AgentKind, ConstraintConfig, DEFAULT_NON_AGREEMENT_COST,
};
pub use generator::{EnumerationGenerator, GenerationContext, OfferGenerator, RandomGenerator};
pub use message::{Message, MessageKind, Transcript};
pub use utility::UtilitySpec;
