//! # parley-core
//!
//! Negotiation primitives for bilateral multi-issue negotiation.
//!
//! This crate provides:
//!
//! - [`NegotiationSpace`]: Issues and their finite value domains, resolved to indices
//! - [`atom`]: The canonical `issue_value` string codec used by utility tables
//! - [`Offer`]: A complete assignment of one value per issue
//! - [`Strategy`]: Per-issue probability distributions that sample into offers
//! - [`AtomicConstraint`] and [`ConstraintStore`]: Forbidden assignments and their views
//!
//! ## Example
//!
//! ```rust
//! use parley_core::{AtomicConstraint, NegotiationSpace, Offer};
//!
//! let space = NegotiationSpace::from_domains([
//!     ("first", vec!["True", "False"]),
//!     ("second", vec!["True", "False"]),
//! ])
//! .unwrap();
//!
//! let offer = Offer::from_pairs(&space, [("first", "True"), ("second", "False")]).unwrap();
//! let constraint = AtomicConstraint::from_names(&space, "first", "False").unwrap();
//!
//! assert!(constraint.satisfied_by_offer(&offer));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod atom;
pub mod constraint;
pub mod error;
pub mod offer;
pub mod space;
pub mod strategy;

pub use constraint::{AtomicConstraint, ConstraintOrigin, ConstraintStore};
pub use error::CoreError;
pub use offer::Offer;
pub use space::{IssueIndex, NegotiationSpace, OfferIter, ValueIndex};
pub use strategy::Strategy;
