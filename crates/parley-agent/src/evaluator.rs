//! Offer evaluation.
//!
//! - [`Evaluator`]: Trait every agent's utility function implements
//! - [`LinearEvaluator`]: Weighted additive lookup over `(issue, value)` utilities
//! - [`ProbabilisticEvaluator`]: Adapter around an external [`UtilityModel`]
//!
//! Evaluators know nothing about constraints except through the
//! [`Evaluator::constrained_utility`] helper, which maps any violating offer
//! to the non-agreement cost.

use std::collections::BTreeMap;
use std::fmt;

use parley_core::{ConstraintStore, IssueIndex, NegotiationSpace, Offer, Strategy, ValueIndex};

use crate::error::{AgentError, Result};
use crate::utility::UtilitySpec;

/// Weights must sum to one within this tolerance.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Maps offers to scalar utilities.
pub trait Evaluator: fmt::Debug + Send {
    /// Utility of an offer, ignoring constraints.
    fn utility(&self, offer: &Offer) -> f64;

    /// Utility of a failed negotiation.
    fn non_agreement_cost(&self) -> f64;

    /// Highest utility reachable by an offer that respects `constraints`.
    fn max_utility(&self, constraints: &ConstraintStore) -> f64;

    /// Merges utilities into the current table. On error the table is unchanged.
    fn add_utilities(&mut self, utilities: &UtilitySpec) -> Result<()>;

    /// Replaces the current table.
    fn set_utilities(&mut self, utilities: &UtilitySpec) -> Result<()>;

    /// Downcast used to guard linear-only behaviour.
    fn as_linear(&self) -> Option<&LinearEvaluator> {
        None
    }

    /// Utility of an offer, or the non-agreement cost if it violates a constraint.
    fn constrained_utility(&self, offer: &Offer, constraints: &ConstraintStore) -> f64 {
        if constraints.satisfied_by(offer) {
            self.utility(offer)
        } else {
            self.non_agreement_cost()
        }
    }
}

/// Weighted linear additive utility: `Σ_i W[i] · U[i][chosen(i)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearEvaluator {
    space: NegotiationSpace,
    utilities: Vec<Vec<f64>>,
    weights: Vec<f64>,
    non_agreement_cost: f64,
}

impl LinearEvaluator {
    /// Creates a linear evaluator.
    ///
    /// `weights` maps issue names to nonnegative weights summing to one;
    /// issues left out weigh zero. `None` means uniform weights. Atoms
    /// missing from `utilities` are worth zero.
    ///
    /// # Errors
    ///
    /// Fails if the utilities reference unknown issues or values, or the
    /// weights are not a distribution over known issues.
    pub fn new(
        space: &NegotiationSpace,
        utilities: &UtilitySpec,
        weights: Option<&BTreeMap<String, f64>>,
        non_agreement_cost: f64,
    ) -> Result<Self> {
        if !non_agreement_cost.is_finite() {
            return Err(AgentError::InvalidConfig(
                "non-agreement cost must be finite".to_string(),
            ));
        }
        let weights = match weights {
            Some(map) => resolve_weights(space, map)?,
            None => uniform_weights(space),
        };

        let mut evaluator = Self {
            space: space.clone(),
            utilities: space.domain_sizes().into_iter().map(|n| vec![0.0; n]).collect(),
            weights,
            non_agreement_cost,
        };
        evaluator.add_utilities(utilities)?;
        Ok(evaluator)
    }

    /// Issue weights, in issue order.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Unweighted utility of one assignment.
    #[must_use]
    pub fn raw_utility(&self, issue: IssueIndex, value: ValueIndex) -> f64 {
        self.utilities
            .get(issue)
            .and_then(|row| row.get(value))
            .copied()
            .unwrap_or(0.0)
    }

    /// Weighted utility contribution of one assignment: `W[i] · U[i][v]`.
    #[must_use]
    pub fn assignment_utility(&self, issue: IssueIndex, value: ValueIndex) -> f64 {
        self.weights.get(issue).copied().unwrap_or(0.0) * self.raw_utility(issue, value)
    }

    /// Like [`LinearEvaluator::assignment_utility`], but forbidden
    /// assignments are worth the non-agreement cost.
    #[must_use]
    pub fn constrained_assignment_utility(
        &self,
        issue: IssueIndex,
        value: ValueIndex,
        constraints: &ConstraintStore,
    ) -> f64 {
        if constraints.is_forbidden(issue, value) {
            self.non_agreement_cost
        } else {
            self.assignment_utility(issue, value)
        }
    }

    /// Expected utility of a strategy, with issues drawn independently.
    #[must_use]
    pub fn strategy_utility(&self, strategy: &Strategy) -> f64 {
        self.space
            .issues()
            .map(|issue| {
                strategy
                    .row(issue)
                    .iter()
                    .enumerate()
                    .map(|(value, p)| p * self.assignment_utility(issue, value))
                    .sum::<f64>()
            })
            .sum()
    }

    /// Per-issue best weighted utility over unconstrained values, or 0 for
    /// an issue without any.
    #[must_use]
    pub fn issue_maxima(&self, constraints: &ConstraintStore) -> Vec<f64> {
        self.space
            .issues()
            .map(|issue| {
                constraints
                    .unconstrained_values(issue)
                    .into_iter()
                    .map(|value| self.assignment_utility(issue, value))
                    .fold(None, |best: Option<f64>, u| {
                        Some(best.map_or(u, |b| b.max(u)))
                    })
                    .unwrap_or(0.0)
            })
            .collect()
    }

    fn checked_entries(
        &self,
        utilities: &UtilitySpec,
    ) -> Result<Vec<(IssueIndex, ValueIndex, f64)>> {
        let entries = utilities.resolve(&self.space)?;
        if let Some(&(issue, value, _)) = entries.iter().find(|(_, _, u)| !u.is_finite()) {
            return Err(AgentError::InvalidConfig(format!(
                "utility for {} is not finite",
                parley_core::atom::encode(
                    self.space.issue_name(issue).unwrap_or_default(),
                    self.space.value_name(issue, value).unwrap_or_default(),
                )
            )));
        }
        Ok(entries)
    }
}

impl Evaluator for LinearEvaluator {
    fn utility(&self, offer: &Offer) -> f64 {
        offer
            .choices()
            .iter()
            .enumerate()
            .map(|(issue, &value)| self.assignment_utility(issue, value))
            .sum()
    }

    fn non_agreement_cost(&self) -> f64 {
        self.non_agreement_cost
    }

    fn max_utility(&self, constraints: &ConstraintStore) -> f64 {
        self.issue_maxima(constraints).iter().sum()
    }

    fn add_utilities(&mut self, utilities: &UtilitySpec) -> Result<()> {
        // Resolve and check the whole table before touching any entry.
        let entries = self.checked_entries(utilities)?;
        for (issue, value, utility) in entries {
            self.utilities[issue][value] = utility;
        }
        Ok(())
    }

    fn set_utilities(&mut self, utilities: &UtilitySpec) -> Result<()> {
        let entries = self.checked_entries(utilities)?;
        let mut table: Vec<Vec<f64>> =
            self.space.domain_sizes().into_iter().map(|n| vec![0.0; n]).collect();
        for (issue, value, utility) in entries {
            table[issue][value] = utility;
        }
        self.utilities = table;
        Ok(())
    }

    fn as_linear(&self) -> Option<&LinearEvaluator> {
        Some(self)
    }
}

fn uniform_weights(space: &NegotiationSpace) -> Vec<f64> {
    let n = space.issue_count();
    vec![1.0 / n.max(1) as f64; n]
}

fn resolve_weights(space: &NegotiationSpace, map: &BTreeMap<String, f64>) -> Result<Vec<f64>> {
    let mut weights = vec![0.0; space.issue_count()];
    for (name, &weight) in map {
        let issue = space.issue_index(name)?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(AgentError::InvalidWeights(format!(
                "weight {weight} for issue '{name}' is not a nonnegative number"
            )));
        }
        weights[issue] = weight;
    }
    let total: f64 = weights.iter().sum();
    if space.issue_count() > 0 && (total - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(AgentError::InvalidWeights(format!(
            "weights sum to {total}, expected 1"
        )));
    }
    Ok(weights)
}

/// External probabilistic utility model.
///
/// Implementations derive utilities from the offer's atoms through their own
/// knowledge base (for example a probabilistic logic program) and must be a
/// deterministic function of the offer and the utilities they were given.
/// Any scratch resources they need (solver processes, temporary files) are
/// their own to acquire and release.
pub trait UtilityModel: fmt::Debug + Send {
    /// Utility of an offer given as its atoms, one per issue.
    fn utility(&self, atoms: &[String]) -> f64;

    /// Merges utilities keyed by derived atoms.
    fn add_utilities(&mut self, utilities: &BTreeMap<String, f64>);

    /// Replaces the utilities keyed by derived atoms.
    fn set_utilities(&mut self, utilities: &BTreeMap<String, f64>);
}

/// Evaluator backed by an external [`UtilityModel`].
///
/// No linearity is assumed, so the maximum utility is found by scanning
/// the whole offer space.
#[derive(Debug)]
pub struct ProbabilisticEvaluator {
    space: NegotiationSpace,
    model: Box<dyn UtilityModel>,
    non_agreement_cost: f64,
}

impl ProbabilisticEvaluator {
    /// Wraps a model for the given space.
    ///
    /// # Errors
    ///
    /// Fails if the non-agreement cost is not finite.
    pub fn new(
        space: &NegotiationSpace,
        model: Box<dyn UtilityModel>,
        non_agreement_cost: f64,
    ) -> Result<Self> {
        if !non_agreement_cost.is_finite() {
            return Err(AgentError::InvalidConfig(
                "non-agreement cost must be finite".to_string(),
            ));
        }
        Ok(Self {
            space: space.clone(),
            model,
            non_agreement_cost,
        })
    }
}

impl Evaluator for ProbabilisticEvaluator {
    fn utility(&self, offer: &Offer) -> f64 {
        self.model.utility(&offer.atoms(&self.space))
    }

    fn non_agreement_cost(&self) -> f64 {
        self.non_agreement_cost
    }

    fn max_utility(&self, constraints: &ConstraintStore) -> f64 {
        self.space
            .offers()
            .filter(|offer| constraints.satisfied_by(offer))
            .map(|offer| self.utility(&offer))
            .fold(None, |best: Option<f64>, u| Some(best.map_or(u, |b| b.max(u))))
            .unwrap_or(0.0)
    }

    fn add_utilities(&mut self, utilities: &UtilitySpec) -> Result<()> {
        self.model.add_utilities(&utilities.canonical());
        Ok(())
    }

    fn set_utilities(&mut self, utilities: &UtilitySpec) -> Result<()> {
        self.model.set_utilities(&utilities.canonical());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{AtomicConstraint, Strategy};
    use proptest::prelude::*;

    fn space() -> NegotiationSpace {
        NegotiationSpace::from_domains([
            ("first", vec!["T", "F"]),
            ("second", vec!["T", "F"]),
        ])
        .unwrap()
    }

    fn offer(space: &NegotiationSpace, first: &str, second: &str) -> Offer {
        Offer::from_pairs(space, [("first", first), ("second", second)]).unwrap()
    }

    /// Sums atom utilities and adds a bonus when both issues agree.
    #[derive(Debug, Default)]
    struct AgreementBonusModel {
        table: BTreeMap<String, f64>,
    }

    impl UtilityModel for AgreementBonusModel {
        fn utility(&self, atoms: &[String]) -> f64 {
            let base: f64 = atoms.iter().filter_map(|a| self.table.get(a)).sum();
            let agree = atoms
                .iter()
                .map(|a| a.rsplit('_').next().unwrap_or_default())
                .collect::<std::collections::BTreeSet<_>>()
                .len()
                == 1;
            if agree { base + self.table.get("agree").copied().unwrap_or(0.0) } else { base }
        }

        fn add_utilities(&mut self, utilities: &BTreeMap<String, f64>) {
            self.table.extend(utilities.iter().map(|(k, v)| (k.clone(), *v)));
        }

        fn set_utilities(&mut self, utilities: &BTreeMap<String, f64>) {
            self.table = utilities.clone();
        }
    }

    #[test]
    fn linear_utility_weights_and_missing_atoms() {
        let space = space();
        let weights = BTreeMap::from([("first".to_string(), 0.25), ("second".to_string(), 0.75)]);
        let spec = UtilitySpec::atoms([("first_T", 100.0), ("second_F", 40.0)]);
        let eval = LinearEvaluator::new(&space, &spec, Some(&weights), -1.0).unwrap();

        assert_eq!(eval.utility(&offer(&space, "T", "F")), 25.0 + 30.0);
        assert_eq!(eval.utility(&offer(&space, "F", "T")), 0.0);
        assert_eq!(eval.assignment_utility(0, 0), 25.0);
        assert_eq!(eval.assignment_utility(1, 0), 0.0);
    }

    #[test]
    fn uniform_weights_by_default() {
        let space = space();
        let eval = LinearEvaluator::new(&space, &UtilitySpec::default(), None, -1.0).unwrap();
        assert_eq!(eval.weights(), [0.5, 0.5]);
    }

    #[test]
    fn weights_must_be_a_distribution() {
        let space = space();
        let spec = UtilitySpec::default();

        let short = BTreeMap::from([("first".to_string(), 0.5)]);
        assert!(matches!(
            LinearEvaluator::new(&space, &spec, Some(&short), -1.0),
            Err(AgentError::InvalidWeights(_))
        ));

        let negative = BTreeMap::from([("first".to_string(), 1.5), ("second".to_string(), -0.5)]);
        assert!(matches!(
            LinearEvaluator::new(&space, &spec, Some(&negative), -1.0),
            Err(AgentError::InvalidWeights(_))
        ));

        let unknown = BTreeMap::from([("third".to_string(), 1.0)]);
        assert!(matches!(
            LinearEvaluator::new(&space, &spec, Some(&unknown), -1.0),
            Err(AgentError::Core(_))
        ));
    }

    #[test]
    fn unknown_utility_atoms_are_rejected() {
        let space = space();
        let spec = UtilitySpec::atoms([("third_T", 1.0)]);
        assert!(LinearEvaluator::new(&space, &spec, None, -1.0).is_err());
    }

    #[test]
    fn constrained_utility_uses_non_agreement_cost() {
        let space = space();
        let spec = UtilitySpec::atoms([("first_T", 10.0)]);
        let eval = LinearEvaluator::new(&space, &spec, None, -99.0).unwrap();
        let mut store = ConstraintStore::new(&space);
        store.add_opponent(AtomicConstraint::new(0, 0)).unwrap();

        assert_eq!(eval.constrained_utility(&offer(&space, "T", "T"), &store), -99.0);
        assert_eq!(eval.constrained_utility(&offer(&space, "F", "T"), &store), 0.0);
        assert_eq!(eval.constrained_assignment_utility(0, 0, &store), -99.0);
        assert_eq!(eval.constrained_assignment_utility(0, 1, &store), 0.0);
    }

    #[test]
    fn max_utility_respects_constraints() {
        let space = space();
        let spec = UtilitySpec::atoms([("first_T", 10.0), ("first_F", 4.0), ("second_T", -2.0)]);
        let eval = LinearEvaluator::new(&space, &spec, None, -99.0).unwrap();
        let mut store = ConstraintStore::new(&space);
        assert_eq!(eval.max_utility(&store), 5.0);

        store.add_own(AtomicConstraint::new(0, 0)).unwrap();
        assert_eq!(eval.issue_maxima(&store), vec![2.0, 0.0]);

        store.add_own(AtomicConstraint::new(1, 1)).unwrap();
        assert_eq!(eval.issue_maxima(&store), vec![2.0, -1.0]);

        store.add_own(AtomicConstraint::new(1, 0)).unwrap();
        assert_eq!(eval.issue_maxima(&store), vec![2.0, 0.0]);
    }

    #[test]
    fn strategy_utility_is_expectation() {
        let space = space();
        let spec = UtilitySpec::atoms([("first_T", 10.0), ("second_T", 6.0)]);
        let eval = LinearEvaluator::new(&space, &spec, None, -1.0).unwrap();
        let mut strategy = Strategy::uniform(&space);
        assert_eq!(eval.strategy_utility(&strategy), 0.5 * 0.5 * 10.0 + 0.5 * 0.5 * 6.0);

        strategy.forbid(&space, 0, 1).unwrap();
        assert_eq!(eval.strategy_utility(&strategy), 0.5 * 10.0 + 0.5 * 0.5 * 6.0);
    }

    #[test]
    fn add_merges_and_set_replaces() {
        let space = space();
        let mut eval =
            LinearEvaluator::new(&space, &UtilitySpec::atoms([("first_T", 10.0)]), None, -1.0)
                .unwrap();
        eval.add_utilities(&UtilitySpec::atoms([("second_T", 4.0)])).unwrap();
        assert_eq!(eval.raw_utility(0, 0), 10.0);
        assert_eq!(eval.raw_utility(1, 0), 4.0);

        eval.set_utilities(&UtilitySpec::atoms([("second_F", 1.0)])).unwrap();
        assert_eq!(eval.raw_utility(0, 0), 0.0);
        assert_eq!(eval.raw_utility(1, 1), 1.0);

        assert!(eval.set_utilities(&UtilitySpec::atoms([("nope_T", 1.0)])).is_err());
        assert_eq!(eval.raw_utility(1, 1), 1.0);
    }

    #[test]
    fn non_finite_entry_rejects_whole_table() {
        let space = space();
        let mut eval =
            LinearEvaluator::new(&space, &UtilitySpec::atoms([("first_T", 10.0)]), None, -1.0)
                .unwrap();
        let bad = UtilitySpec::atoms([("first_F", 100.0), ("second_T", f64::NAN)]);

        assert!(matches!(eval.add_utilities(&bad), Err(AgentError::InvalidConfig(_))));
        assert_eq!(eval.raw_utility(0, 0), 10.0);
        assert_eq!(eval.raw_utility(0, 1), 0.0);

        assert!(matches!(eval.set_utilities(&bad), Err(AgentError::InvalidConfig(_))));
        assert_eq!(eval.raw_utility(0, 0), 10.0);
        assert_eq!(eval.raw_utility(0, 1), 0.0);
    }

    #[test]
    fn probabilistic_evaluator_delegates_to_model() {
        let space = space();
        let mut model = AgreementBonusModel::default();
        model.add_utilities(&BTreeMap::from([
            ("first_T".to_string(), 1.0),
            ("agree".to_string(), 5.0),
        ]));
        let eval = ProbabilisticEvaluator::new(&space, Box::new(model), -10.0).unwrap();

        assert_eq!(eval.utility(&offer(&space, "T", "T")), 6.0);
        assert_eq!(eval.utility(&offer(&space, "T", "F")), 1.0);
        assert_eq!(eval.utility(&offer(&space, "F", "F")), 5.0);
        assert_eq!(eval.max_utility(&ConstraintStore::new(&space)), 6.0);
        assert!(eval.as_linear().is_none());

        let mut store = ConstraintStore::new(&space);
        store.add_own(AtomicConstraint::new(0, 0)).unwrap();
        assert_eq!(eval.max_utility(&store), 5.0);
    }

    proptest! {
        #[test]
        fn linear_utility_is_monotone_per_issue(
            u in prop::collection::vec(-100.0f64..100.0, 4),
            second in 0usize..2,
        ) {
            let space = space();
            let spec = UtilitySpec::atoms([
                ("first_T", u[0]), ("first_F", u[1]), ("second_T", u[2]), ("second_F", u[3]),
            ]);
            let eval = LinearEvaluator::new(&space, &spec, None, -1000.0).unwrap();
            let a = Offer::from_indices(&space, vec![0, second]).unwrap();
            let b = Offer::from_indices(&space, vec![1, second]).unwrap();
            if u[0] >= u[1] {
                prop_assert!(eval.utility(&a) >= eval.utility(&b));
            } else {
                prop_assert!(eval.utility(&a) <= eval.utility(&b));
            }
        }
    }
}
