//! Unit tests and property-based tests for the agent module.

use super::*;
use crate::evaluator::LinearEvaluator;
use crate::generator::{EnumerationGenerator, RandomGenerator};
use proptest::prelude::*;

const NAC: f64 = -1_000_000.0;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn one_issue() -> NegotiationSpace {
    NegotiationSpace::from_domains([("first", vec!["True", "False"])]).unwrap()
}

fn two_issues() -> NegotiationSpace {
    NegotiationSpace::from_domains([
        ("first", vec!["True", "False"]),
        ("second", vec!["True", "False"]),
    ])
    .unwrap()
}

fn enumeration_agent(
    name: &str,
    space: &NegotiationSpace,
    utilities: &[(&str, f64)],
    rho: f64,
    constrained: bool,
) -> Agent {
    let spec = UtilitySpec::atoms(utilities.iter().copied());
    let evaluator = LinearEvaluator::new(space, &spec, None, NAC).unwrap();
    Agent::new(
        name,
        space.clone(),
        Box::new(evaluator),
        Box::new(EnumerationGenerator::new(constrained)),
        rho,
        DEFAULT_MAX_ROUNDS,
    )
    .unwrap()
}

fn random_agent(
    name: &str,
    space: &NegotiationSpace,
    utilities: &[(&str, f64)],
    seed: u64,
) -> Agent {
    let spec = UtilitySpec::atoms(utilities.iter().copied());
    let evaluator = LinearEvaluator::new(space, &spec, None, NAC).unwrap();
    Agent::new(
        name,
        space.clone(),
        Box::new(evaluator),
        Box::new(RandomGenerator::new(space, seed, 1000, false)),
        1.0,
        DEFAULT_MAX_ROUNDS,
    )
    .unwrap()
}

fn offer(space: &NegotiationSpace, pairs: &[(&str, &str)]) -> Offer {
    Offer::from_pairs(space, pairs.iter().copied()).unwrap()
}

// ==========================================================================
// Construction
// ==========================================================================

#[test]
fn new_agent_is_idle() {
    let space = one_issue();
    let agent = enumeration_agent("A", &space, &[("first_True", 10.0)], 1.0, false);
    assert_eq!(agent.state(), AgentState::Idle);
    assert!(agent.transcript().is_empty());
    assert!(!agent.successful());
    assert_eq!(agent.opponent(), None);
    assert_eq!(agent.reservation_value(), 10.0);
}

#[test]
fn rejects_empty_name_and_bad_reservation() {
    let space = one_issue();
    let build = |name: &str, rho: f64| {
        let evaluator = LinearEvaluator::new(&space, &UtilitySpec::default(), None, NAC).unwrap();
        Agent::new(
            name,
            space.clone(),
            Box::new(evaluator),
            Box::new(EnumerationGenerator::new(false)),
            rho,
            10,
        )
    };
    assert!(matches!(build("", 0.5), Err(AgentError::InvalidConfig(_))));
    assert!(matches!(build("A", 1.5), Err(AgentError::InvalidConfig(_))));
    assert!(matches!(build("A", -0.1), Err(AgentError::InvalidConfig(_))));
    assert!(matches!(build("A", f64::NAN), Err(AgentError::InvalidConfig(_))));
    assert!(build("A", 0.0).is_ok());
}

#[test]
fn state_display() {
    assert_eq!(AgentState::Idle.to_string(), "idle");
    assert_eq!(AgentState::Terminal { success: true }.to_string(), "agreed");
    assert!(AgentState::Terminal { success: false }.is_terminal());
    assert!(!AgentState::Active.is_terminal());
}

// ==========================================================================
// Utilities and constraints
// ==========================================================================

#[test]
fn utilities_update_reservation_value() {
    let space = one_issue();
    let mut agent = enumeration_agent("A", &space, &[("first_True", 10.0)], 0.5, false);
    assert_eq!(agent.reservation_value(), 5.0);

    agent
        .add_utilities(&UtilitySpec::atoms([("first_False", 30.0)]))
        .unwrap();
    assert_eq!(agent.reservation_value(), 15.0);

    agent
        .set_utilities(&UtilitySpec::atoms([("first_True", 2.0)]))
        .unwrap();
    assert_eq!(agent.reservation_value(), 1.0);
    assert_eq!(agent.utility(&offer(&space, &[("first", "False")])), 0.0);
}

#[test]
fn rejected_utilities_leave_agent_unchanged() {
    let space = two_issues();
    let mut agent = enumeration_agent("A", &space, &[("first_True", 10.0)], 1.0, false);
    let probe = offer(&space, &[("first", "False"), ("second", "True")]);
    assert_eq!(agent.reservation_value(), 5.0);
    assert_eq!(agent.utility(&probe), 0.0);

    let result = agent.add_utilities(&UtilitySpec::atoms([
        ("first_False", 100.0),
        ("second_True", f64::NAN),
    ]));
    assert!(matches!(result, Err(AgentError::InvalidConfig(_))));
    assert_eq!(agent.utility(&probe), 0.0);
    assert_eq!(agent.reservation_value(), 5.0);

    let result = agent.set_utilities(&UtilitySpec::atoms([
        ("first_False", 100.0),
        ("second_True", f64::INFINITY),
    ]));
    assert!(matches!(result, Err(AgentError::InvalidConfig(_))));
    assert_eq!(agent.utility(&probe), 0.0);
    assert_eq!(agent.reservation_value(), 5.0);
}

#[test]
fn unconstrained_agent_refuses_constraints() {
    let space = one_issue();
    let mut agent = enumeration_agent("A", &space, &[("first_True", 10.0)], 0.5, false);
    let result = agent.add_constraint(AtomicConstraint::new(0, 0));
    assert!(matches!(result, Err(AgentError::UnsupportedVariant(_))));
    assert!(agent.constraints().is_empty());
}

#[test]
fn own_constraint_lowers_reservation_value() {
    let space = one_issue();
    let mut agent = enumeration_agent(
        "A",
        &space,
        &[("first_True", 10.0), ("first_False", 6.0)],
        0.5,
        true,
    );
    assert_eq!(agent.reservation_value(), 5.0);
    assert!(agent.constraints().is_empty());

    agent.add_constraint(AtomicConstraint::new(0, 0)).unwrap();
    assert_eq!(agent.reservation_value(), 3.0);
    assert_eq!(agent.utility(&offer(&space, &[("first", "True")])), NAC);
}

#[test]
fn constrained_agent_discovers_on_construction() {
    let space = one_issue();
    let agent = enumeration_agent(
        "A",
        &space,
        &[("first_True", -100_000.0), ("first_False", 0.0)],
        0.5,
        true,
    );
    assert_eq!(agent.constraints().own().len(), 1);
    assert!(agent.constraints().is_forbidden(0, 0));
    assert_eq!(agent.reservation_value(), 0.0);
}

// ==========================================================================
// Negotiation requests
// ==========================================================================

#[test]
fn request_refused_for_different_space() {
    let mut a = enumeration_agent("A", &one_issue(), &[("first_True", 1.0)], 0.5, false);
    let mut b = enumeration_agent("B", &two_issues(), &[("first_True", 1.0)], 0.5, false);

    assert!(!a.negotiate(&mut b).unwrap());
    assert_eq!(a.state(), AgentState::Idle);
    assert_eq!(b.state(), AgentState::Idle);
    assert!(a.transcript().is_empty());
}

#[test]
fn request_refused_when_no_offer_is_acceptable() {
    let space = one_issue();
    let mut a = enumeration_agent("A", &space, &[("first_True", 1.0)], 0.5, false);
    let mut b = enumeration_agent(
        "B",
        &space,
        &[("first_True", -10.0), ("first_False", -20.0)],
        0.5,
        true,
    );
    assert!(!b.constraints().is_satisfiable());

    assert!(!a.negotiate(&mut b).unwrap());
    assert_eq!(b.state(), AgentState::Idle);
}

#[test]
fn request_accepted_moves_to_active() {
    let space = one_issue();
    let mut b = enumeration_agent("B", &space, &[("first_True", 1.0)], 0.5, false);
    assert!(b.receive_negotiation_request("A", &space));
    assert_eq!(b.state(), AgentState::Active);
    assert_eq!(b.opponent(), Some("A"));
    assert!(!b.receive_negotiation_request("C", &space));
}

#[test]
fn agents_are_single_use() {
    let space = one_issue();
    let mut a = enumeration_agent("A", &space, &[("first_True", 10.0)], 1.0, false);
    let mut b = enumeration_agent("B", &space, &[("first_True", 10.0)], 1.0, false);
    assert!(a.negotiate(&mut b).unwrap());

    let mut c = enumeration_agent("C", &space, &[("first_True", 10.0)], 1.0, false);
    assert!(matches!(a.negotiate(&mut c), Err(AgentError::NotIdle { .. })));
    assert!(!c.negotiate(&mut b).unwrap());
}

// ==========================================================================
// Negotiation outcomes
// ==========================================================================

#[test]
fn trivial_agreement() {
    init_tracing();
    let space = one_issue();
    let mut a = enumeration_agent("A", &space, &[("first_True", 10.0)], 1.0, false);
    let mut b = enumeration_agent("B", &space, &[("first_True", 10.0)], 1.0, false);

    assert!(a.negotiate(&mut b).unwrap());
    assert!(b.successful());

    let expected = offer(&space, &[("first", "True")]);
    let messages = a.transcript().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], Message::offer("A", "B", expected.clone(), None));
    assert_eq!(messages[1], Message::accept("B", "A", expected));
    assert_eq!(a.transcript(), b.transcript());
}

#[test]
fn orthogonal_preferences_agree_on_first_offer() {
    let space = two_issues();
    let mut a = enumeration_agent("A", &space, &[("first_True", 10.0)], 0.5, false);
    let mut b = enumeration_agent("B", &space, &[("second_True", 10.0)], 0.5, false);

    assert!(a.negotiate(&mut b).unwrap());
    let last = a.transcript().last().unwrap();
    assert!(last.is_accept());
    assert_eq!(
        last.offer_ref(),
        Some(&offer(&space, &[("first", "True"), ("second", "True")]))
    );
}

#[test]
fn opposed_preferences_fail() {
    let space = one_issue();
    let mut a = enumeration_agent(
        "A",
        &space,
        &[("first_True", 10_000.0), ("first_False", -10_000.0)],
        0.1,
        false,
    );
    let mut b = enumeration_agent(
        "B",
        &space,
        &[("first_True", -10_000.0), ("first_False", 10_000.0)],
        0.1,
        false,
    );

    assert!(!a.negotiate(&mut b).unwrap());
    assert_eq!(a.state(), AgentState::Terminal { success: false });
    assert_eq!(b.state(), AgentState::Terminal { success: false });
    assert!(a.transcript().last().unwrap().is_terminate());
    assert_eq!(a.transcript(), b.transcript());
}

#[test]
fn round_limit_terminates() {
    let space = NegotiationSpace::from_domains([
        ("first", vec!["x", "y"]),
        ("second", vec!["a", "b", "c"]),
    ])
    .unwrap();
    let build = |name: &str, liked: &str| {
        let spec = UtilitySpec::atoms([(liked, 10.0)]);
        let evaluator = LinearEvaluator::new(&space, &spec, None, NAC).unwrap();
        Agent::new(
            name,
            space.clone(),
            Box::new(evaluator),
            Box::new(EnumerationGenerator::new(false)),
            1.0,
            4,
        )
        .unwrap()
    };
    let mut a = build("A", "first_x");
    let mut b = build("B", "first_y");

    assert!(!a.negotiate(&mut b).unwrap());
    assert_eq!(a.transcript().len(), 5);
    let last = a.transcript().last().unwrap();
    assert!(last.is_terminate());
    assert_eq!(last.sender, "A");
}

#[test]
fn zero_round_limit_terminates_immediately() {
    let space = one_issue();
    let evaluator = LinearEvaluator::new(&space, &UtilitySpec::default(), None, NAC).unwrap();
    let mut a = Agent::new(
        "A",
        space.clone(),
        Box::new(evaluator),
        Box::new(EnumerationGenerator::new(false)),
        0.0,
        0,
    )
    .unwrap();
    let mut b = enumeration_agent("B", &space, &[], 0.0, false);

    assert!(!a.negotiate(&mut b).unwrap());
    assert_eq!(a.transcript().len(), 1);
    assert!(b.transcript().messages()[0].is_terminate());
}

#[test]
fn random_agents_reach_agreement() {
    let space = one_issue();
    let mut a = random_agent("A", &space, &[("first_True", 10.0)], 7);
    let mut b = random_agent("B", &space, &[("first_True", 10.0)], 11);

    assert!(a.negotiate(&mut b).unwrap());
    let agreed = a.transcript().last().unwrap().offer_ref().cloned().unwrap();
    assert_eq!(agreed, offer(&space, &[("first", "True")]));
}

#[test]
fn malformed_offer_terminates() {
    let space = two_issues();
    let mut b = enumeration_agent("B", &space, &[("first_True", 10.0)], 0.0, false);
    assert!(b.receive_negotiation_request("A", &space));

    let stray = Offer::from_indices_unchecked(vec![0, 5]);
    b.receive_message(Message::offer("A", "B", stray, None));
    let reply = b.take_turn().unwrap();

    assert!(reply.is_terminate());
    assert_eq!(b.state(), AgentState::Terminal { success: false });
    assert_eq!(b.transcript().len(), 2);
}

// ==========================================================================
// Constraint exchange
// ==========================================================================

fn constraint_exchange_pair(
    b_constrained: bool,
    b_rho: f64,
) -> (NegotiationSpace, Agent, Agent) {
    let space = two_issues();
    let a = enumeration_agent(
        "A",
        &space,
        &[
            ("first_True", -100_000.0),
            ("first_False", 0.0),
            ("second_True", 5.0),
            ("second_False", 5.0),
        ],
        0.5,
        true,
    );
    let b = enumeration_agent("B", &space, &[("first_True", 10.0)], b_rho, b_constrained);
    (space, a, b)
}

#[test]
fn attached_constraint_is_adopted_and_unlocks_agreement() {
    init_tracing();
    let (space, mut a, mut b) = constraint_exchange_pair(true, 0.0);
    assert_eq!(
        a.constraints().own().iter().copied().collect::<Vec<_>>(),
        vec![AtomicConstraint::new(0, 0)]
    );

    assert!(b.negotiate(&mut a).unwrap());

    let messages = b.transcript().messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].constraint(), Some(AtomicConstraint::new(0, 0)));
    assert_eq!(
        messages[2],
        Message::accept("B", "A", offer(&space, &[("first", "False"), ("second", "True")]))
    );
    assert!(b.constraints().opponent().contains(&AtomicConstraint::new(0, 0)));
    assert_eq!(b.reservation_value(), 0.0);
}

#[test]
fn unconstrained_agent_ignores_attachments() {
    let (_, mut a, mut b) = constraint_exchange_pair(false, 0.5);

    assert!(!b.negotiate(&mut a).unwrap());
    assert!(b.constraints().is_empty());
    assert!(
        b.transcript()
            .iter()
            .filter(|m| m.sender == "A")
            .all(|m| m.is_terminate() || m.constraint().is_some())
    );
}

#[test]
fn constrained_agent_never_proposes_violations() {
    let (space, mut a, mut b) = constraint_exchange_pair(false, 0.5);
    b.negotiate(&mut a).unwrap();

    for proposed in a.transcript().offers_from("A") {
        assert_eq!(proposed.chosen(0), 1, "A proposed {}", proposed.describe(&space));
    }
}

// ==========================================================================
// Property-based tests
// ==========================================================================

prop_compose! {
    fn arb_utilities()(u in prop::collection::vec(-20.0f64..20.0, 5)) -> Vec<(&'static str, f64)> {
        vec![
            ("a_x", u[0]), ("a_y", u[1]), ("a_z", u[2]),
            ("b_x", u[3]), ("b_y", u[4]),
        ]
    }
}

proptest! {
    #[test]
    fn negotiations_terminate_with_shared_transcripts(
        ua in arb_utilities(),
        ub in arb_utilities(),
        rho_a in 0.0f64..=1.0,
        rho_b in 0.0f64..=1.0,
        constrained in any::<bool>(),
    ) {
        let space = NegotiationSpace::from_domains([
            ("a", vec!["x", "y", "z"]),
            ("b", vec!["x", "y"]),
        ])
        .unwrap();
        let mut a = enumeration_agent("A", &space, &ua, rho_a, constrained);
        let mut b = enumeration_agent("B", &space, &ub, rho_b, constrained);

        let agreed = a.negotiate(&mut b).unwrap();
        if a.state() == AgentState::Idle {
            // Refused up front.
            prop_assert!(!agreed);
            prop_assert!(a.transcript().is_empty());
        } else {
            prop_assert!(a.state().is_terminal());
            prop_assert!(b.state().is_terminal());
            prop_assert_eq!(a.successful(), b.successful());
            prop_assert_eq!(a.transcript(), b.transcript());
            prop_assert!(a.transcript().len() <= DEFAULT_MAX_ROUNDS + 1);

            let last = a.transcript().last().unwrap();
            if agreed {
                let accepter = if last.sender == "A" { &a } else { &b };
                let accepted = last.offer_ref().unwrap();
                prop_assert!(accepter.utility(accepted) >= accepter.reservation_value());
                prop_assert!(accepter.constraints().satisfied_by(accepted));
            } else {
                prop_assert!(last.is_terminate());
            }
        }
    }
}
