//! Automatic own-constraint discovery for linear additive utilities.
//!
//! With per-issue maxima `m[i]` over unconstrained values, an assignment
//! `(i, v)` can never appear in an acceptable offer when
//! `Σ_{j≠i} m[j] + W[i]·U[i][v]` falls below the reservation value
//! `ρ · Σ m`. Such assignments are dropped as own constraints. Dropping one
//! can lower the maxima, so discovery repeats until nothing new is found.
//!
//! This reasoning relies on additivity and is only run for
//! [`LinearEvaluator`]s.

use parley_core::{AtomicConstraint, ConstraintStore};

use crate::evaluator::LinearEvaluator;

/// Absolute reservation value `ρ · Σ_i m[i]` for the current constraints.
#[must_use]
pub fn reservation_value(
    evaluator: &LinearEvaluator,
    constraints: &ConstraintStore,
    relative_reservation_value: f64,
) -> f64 {
    relative_reservation_value * evaluator.issue_maxima(constraints).iter().sum::<f64>()
}

/// One discovery pass: every unconstrained assignment that cannot reach the
/// reservation value, in `(issue, value)` order.
#[must_use]
pub fn unreachable_assignments(
    evaluator: &LinearEvaluator,
    constraints: &ConstraintStore,
    relative_reservation_value: f64,
) -> Vec<AtomicConstraint> {
    let maxima = evaluator.issue_maxima(constraints);
    let total: f64 = maxima.iter().sum();
    let threshold = relative_reservation_value * total;

    let mut found = Vec::new();
    for (issue, &best) in maxima.iter().enumerate() {
        let rest = total - best;
        for value in constraints.unconstrained_values(issue) {
            if rest + evaluator.assignment_utility(issue, value) < threshold {
                found.push(AtomicConstraint::new(issue, value));
            }
        }
    }
    found
}

/// Runs discovery to a fixpoint, adding every new constraint to the own set.
///
/// Returns the constraints added, in discovery order.
pub fn discover_own_constraints(
    evaluator: &LinearEvaluator,
    constraints: &mut ConstraintStore,
    relative_reservation_value: f64,
) -> Vec<AtomicConstraint> {
    let mut added = Vec::new();
    loop {
        let pass = unreachable_assignments(evaluator, constraints, relative_reservation_value);
        let mut progressed = false;
        for constraint in pass {
            // Indices come from the store's own view, so they are in range.
            if matches!(constraints.add_own(constraint), Ok(true)) {
                added.push(constraint);
                progressed = true;
            }
        }
        if !progressed || !constraints.is_satisfiable() {
            return added;
        }
    }
}
