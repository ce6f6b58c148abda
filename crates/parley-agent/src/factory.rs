//! Agent configuration and construction.
//!
//! An [`AgentConfig`] names an agent and picks one of the [`AgentKind`]s.
//! The [`AgentFactory`] pairs a config with utilities over a fixed
//! [`NegotiationSpace`] and returns a ready-to-negotiate [`Agent`].
//!
//! Configs are plain serde values:
//!
//! ```
//! use parley_agent::{AgentConfig, AgentKind};
//!
//! let config = AgentConfig::from_json(
//!     r#"{ "name": "A", "kind": "constrained_enumeration", "relative_reservation_value": 0.5 }"#,
//! )
//! .unwrap();
//! assert_eq!(config.kind, AgentKind::ConstrainedEnumeration);
//! assert_eq!(config.max_rounds, 200);
//! ```

use std::collections::BTreeMap;

use parley_core::{AtomicConstraint, NegotiationSpace};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::{Agent, DEFAULT_MAX_ROUNDS};
use crate::error::{AgentError, Result};
use crate::evaluator::{Evaluator, LinearEvaluator, ProbabilisticEvaluator, UtilityModel};
use crate::generator::{
    DEFAULT_MAX_GENERATION_TRIES, EnumerationGenerator, OfferGenerator, RandomGenerator,
};
use crate::utility::UtilitySpec;

/// Default utility of a failed negotiation.
pub const DEFAULT_NON_AGREEMENT_COST: f64 = -1_000_000.0;

/// The agent variants the factory can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Linear utilities, sampled offers.
    Random,
    /// Linear utilities, best-first enumerated offers.
    #[default]
    Enumeration,
    /// Random agent that discovers, honours and exchanges constraints.
    ConstrainedRandom,
    /// Enumeration agent that discovers, honours and exchanges constraints.
    ConstrainedEnumeration,
    /// External utility model, sampled offers.
    ProbabilisticRandom,
}

impl AgentKind {
    /// Returns true for the constraint-aware kinds.
    #[must_use]
    pub const fn is_constrained(self) -> bool {
        matches!(self, Self::ConstrainedRandom | Self::ConstrainedEnumeration)
    }

    /// Returns true for kinds backed by a [`LinearEvaluator`].
    #[must_use]
    pub const fn is_linear(self) -> bool {
        !matches!(self, Self::ProbabilisticRandom)
    }

    /// Returns true for kinds that enumerate offers best-first.
    #[must_use]
    pub const fn is_enumeration(self) -> bool {
        matches!(self, Self::Enumeration | Self::ConstrainedEnumeration)
    }
}

/// An initial own constraint, by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintConfig {
    /// Issue name.
    pub issue: String,
    /// Forbidden value.
    pub value: String,
}

/// Configuration for a single agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent name.
    pub name: String,
    /// Variant to build.
    #[serde(default)]
    pub kind: AgentKind,
    /// Fraction `ρ ∈ [0, 1]` of the best reachable utility the agent insists on.
    #[serde(default)]
    pub relative_reservation_value: f64,
    /// Utility of a failed negotiation.
    #[serde(default = "default_non_agreement_cost")]
    pub non_agreement_cost: f64,
    /// Message count after which the agent terminates.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// Sampling budget per offer for random kinds.
    #[serde(default = "default_max_generation_tries")]
    pub max_generation_tries: usize,
    /// RNG seed; derived from the name when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Issue weights for linear kinds; uniform when absent.
    #[serde(default)]
    pub weights: Option<BTreeMap<String, f64>>,
    /// Initial own constraints for constrained kinds.
    #[serde(default)]
    pub constraints: Vec<ConstraintConfig>,
}

fn default_non_agreement_cost() -> f64 {
    DEFAULT_NON_AGREEMENT_COST
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

fn default_max_generation_tries() -> usize {
    DEFAULT_MAX_GENERATION_TRIES
}

impl AgentConfig {
    /// Creates a config with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            relative_reservation_value: 0.0,
            non_agreement_cost: DEFAULT_NON_AGREEMENT_COST,
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_generation_tries: DEFAULT_MAX_GENERATION_TRIES,
            seed: None,
            weights: None,
            constraints: Vec::new(),
        }
    }

    /// Parses and validates a JSON config.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] on malformed JSON or invalid settings.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| AgentError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the relative reservation value.
    #[must_use]
    pub fn with_reservation_value(mut self, rho: f64) -> Self {
        self.relative_reservation_value = rho;
        self
    }

    /// Sets the non-agreement cost.
    #[must_use]
    pub fn with_non_agreement_cost(mut self, cost: f64) -> Self {
        self.non_agreement_cost = cost;
        self
    }

    /// Sets the round limit.
    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Sets the RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the issue weights.
    #[must_use]
    pub fn with_weights<I, K>(mut self, weights: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.weights = Some(weights.into_iter().map(|(k, w)| (k.into(), w)).collect());
        self
    }

    /// Adds an initial own constraint.
    #[must_use]
    pub fn with_constraint(mut self, issue: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.push(ConstraintConfig {
            issue: issue.into(),
            value: value.into(),
        });
        self
    }

    /// Checks settings that do not depend on the space or the utilities.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AgentError::InvalidConfig("agent name must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.relative_reservation_value) {
            return Err(AgentError::InvalidConfig(format!(
                "relative reservation value {} is outside [0, 1]",
                self.relative_reservation_value
            )));
        }
        if !self.non_agreement_cost.is_finite() {
            return Err(AgentError::InvalidConfig(
                "non-agreement cost must be finite".to_string(),
            ));
        }
        if self.max_generation_tries == 0 {
            return Err(AgentError::InvalidConfig(
                "max_generation_tries must be positive".to_string(),
            ));
        }
        if !self.constraints.is_empty() && !self.kind.is_constrained() {
            return Err(AgentError::InvalidConfig(format!(
                "initial constraints need a constrained kind, got {:?}",
                self.kind
            )));
        }
        if self.weights.is_some() && !self.kind.is_linear() {
            return Err(AgentError::InvalidConfig(
                "issue weights only apply to linear kinds".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured seed, or one derived from the agent name.
    #[must_use]
    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| derive_seed(&self.name))
    }
}

/// Stable seed from a name: the first eight bytes of its BLAKE3 hash.
fn derive_seed(name: &str) -> u64 {
    let hash = blake3::hash(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Builds agents over a fixed negotiation space.
#[derive(Debug, Clone)]
pub struct AgentFactory {
    space: NegotiationSpace,
}

impl AgentFactory {
    /// Creates a factory for `space`.
    #[must_use]
    pub fn new(space: NegotiationSpace) -> Self {
        Self { space }
    }

    /// The space every built agent negotiates over.
    #[must_use]
    pub fn space(&self) -> &NegotiationSpace {
        &self.space
    }

    /// Builds a linear agent.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config, on utilities or weights that do not fit
    /// the space, for [`AgentKind::ProbabilisticRandom`], or when the
    /// non-agreement cost is not strictly below the resulting reservation
    /// value.
    pub fn build(&self, config: &AgentConfig, utilities: &UtilitySpec) -> Result<Agent> {
        config.validate()?;
        if !config.kind.is_linear() {
            return Err(AgentError::UnsupportedVariant(format!(
                "{:?} agents need a utility model",
                config.kind
            )));
        }
        let evaluator = LinearEvaluator::new(
            &self.space,
            utilities,
            config.weights.as_ref(),
            config.non_agreement_cost,
        )?;
        self.assemble(config, Box::new(evaluator))
    }

    /// Builds an agent backed by an external utility model.
    ///
    /// `utilities` is merged into the model before the agent is assembled.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config, for any kind other than
    /// [`AgentKind::ProbabilisticRandom`], or when the non-agreement cost is
    /// not strictly below the resulting reservation value.
    pub fn build_probabilistic(
        &self,
        config: &AgentConfig,
        model: Box<dyn UtilityModel>,
        utilities: &UtilitySpec,
    ) -> Result<Agent> {
        config.validate()?;
        if config.kind != AgentKind::ProbabilisticRandom {
            return Err(AgentError::UnsupportedVariant(format!(
                "{:?} agents use linear utilities",
                config.kind
            )));
        }
        let mut evaluator =
            ProbabilisticEvaluator::new(&self.space, model, config.non_agreement_cost)?;
        evaluator.add_utilities(utilities)?;
        self.assemble(config, Box::new(evaluator))
    }

    fn assemble(&self, config: &AgentConfig, evaluator: Box<dyn Evaluator>) -> Result<Agent> {
        let constrained = config.kind.is_constrained();
        let generator: Box<dyn OfferGenerator> = if config.kind.is_enumeration() {
            Box::new(EnumerationGenerator::new(constrained))
        } else {
            Box::new(RandomGenerator::new(
                &self.space,
                config.effective_seed(),
                config.max_generation_tries,
                constrained,
            ))
        };

        let mut agent = Agent::new(
            config.name.clone(),
            self.space.clone(),
            evaluator,
            generator,
            config.relative_reservation_value,
            config.max_rounds,
        )?;
        for constraint in &config.constraints {
            let constraint =
                AtomicConstraint::from_names(&self.space, &constraint.issue, &constraint.value)?;
            agent.add_constraint(constraint)?;
        }

        if agent.non_agreement_cost() >= agent.reservation_value() {
            return Err(AgentError::InvalidConfig(format!(
                "non-agreement cost {} must be below the reservation value {}",
                agent.non_agreement_cost(),
                agent.reservation_value()
            )));
        }

        info!(
            agent = %agent.name(),
            kind = ?config.kind,
            reservation_value = agent.reservation_value(),
            own_constraints = agent.constraints().own().len(),
            "agent built"
        );
        Ok(agent)
    }
}
