//! Error types for parley-core.

use thiserror::Error;

/// Errors that can occur when building or manipulating negotiation primitives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// An issue or value name is empty or contains a reserved character.
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        /// Either "issue" or "value".
        kind: &'static str,
        /// The offending name.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },

    /// The same issue was declared twice.
    #[error("duplicate issue: {0}")]
    DuplicateIssue(String),

    /// The same value was declared twice for one issue.
    #[error("duplicate value '{value}' for issue '{issue}'")]
    DuplicateValue {
        /// Issue name.
        issue: String,
        /// Repeated value name.
        value: String,
    },

    /// An issue was declared without any values.
    #[error("issue '{0}' has an empty domain")]
    EmptyDomain(String),

    /// Issue name not present in the space.
    #[error("unknown issue: {0}")]
    UnknownIssue(String),

    /// Value name not present in the issue's domain.
    #[error("unknown value '{value}' for issue '{issue}'")]
    UnknownValue {
        /// Issue name.
        issue: String,
        /// Value name.
        value: String,
    },

    /// String is not a well-formed atom.
    #[error("invalid atom: {0}")]
    InvalidAtom(String),

    /// Offer does not assign exactly one value per issue.
    #[error("malformed offer: {0}")]
    MalformedOffer(String),

    /// Constraint refers to an issue or value index outside the space.
    #[error("constraint ({issue}, {value}) is outside the negotiation space")]
    ConstraintOutOfSpace {
        /// Issue index.
        issue: usize,
        /// Value index.
        value: usize,
    },

    /// Probability outside of [0, 1] or not finite.
    #[error("invalid probability {probability} for issue '{issue}'")]
    InvalidProbability {
        /// Issue name.
        issue: String,
        /// Rejected probability.
        probability: f64,
    },

    /// Strategy rows do not line up or are not distributions.
    #[error("malformed strategy: {0}")]
    MalformedStrategy(String),

    /// A mutation would leave an issue without any probability mass.
    #[error("issue '{0}' would have no probability mass left")]
    DegenerateDistribution(String),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
