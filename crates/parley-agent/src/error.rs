//! Error types for parley-agent.

use parley_core::CoreError;
use thiserror::Error;

/// Errors that can occur when configuring or driving an agent.
///
/// Negotiation dynamics (generator exhaustion, infeasible constraints, the
/// round limit) are never errors: the agent turns them into a Terminate
/// message instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    /// Invalid space, offer, strategy or constraint.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Invalid agent configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Issue weights are not a distribution over the issues.
    #[error("invalid issue weights: {0}")]
    InvalidWeights(String),

    /// The requested operation is not supported by this agent's variant.
    #[error("unsupported for this agent variant: {0}")]
    UnsupportedVariant(String),

    /// The agent already took part in a negotiation.
    #[error("agent '{name}' is not idle")]
    NotIdle {
        /// Agent name.
        name: String,
    },
}

/// Failures reported by an offer generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeneratorError {
    /// No further offer at or above the threshold remains.
    #[error("no acceptable offer left to propose")]
    Exhausted,

    /// Best-first enumeration needs a linear additive evaluator.
    #[error("enumeration requires a linear evaluator")]
    RequiresLinearEvaluator,
}

/// Result alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
