//! Negotiating agent and the alternating-offers protocol.
//!
//! An [`Agent`] owns its utility function, offer generator and constraint
//! store. [`Agent::negotiate`] runs a whole bilateral negotiation: the
//! initiator asks the opponent to take part, then the two agents alternate
//! turns until one of them accepts or terminates.
//!
//! On each turn an agent looks at the last message it received:
//!
//! 1. Accept or Terminate ends the negotiation for it without a reply.
//! 2. A constraint attached to an offer is adopted (constrained agents only)
//!    and the agent's view is refreshed.
//! 3. Past the round limit, or with an unsatisfiable constraint store, the
//!    agent terminates.
//! 4. An offer worth at least the reservation value that violates no held
//!    constraint is accepted.
//! 5. Otherwise the agent proposes its next offer, attaching the first own
//!    constraint the rejected offer violated, or terminates if the generator
//!    has nothing left.

use std::fmt;

use parley_core::{AtomicConstraint, ConstraintStore, NegotiationSpace, Offer};
use tracing::{debug, info, warn};

use crate::discovery;
use crate::error::{AgentError, Result};
use crate::evaluator::Evaluator;
use crate::generator::{GenerationContext, OfferGenerator};
use crate::message::{Message, MessageKind, Transcript};
use crate::utility::UtilitySpec;

/// Default limit on the number of messages before an agent gives up.
pub const DEFAULT_MAX_ROUNDS: usize = 200;

/// Lifecycle of an agent within a single negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentState {
    /// Not negotiating yet.
    #[default]
    Idle,
    /// Taking part in a negotiation.
    Active,
    /// Negotiation over.
    Terminal {
        /// Whether an offer was accepted.
        success: bool,
    },
}

impl AgentState {
    /// Returns true once the negotiation is over.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminal { .. })
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Terminal { success: true } => write!(f, "agreed"),
            Self::Terminal { success: false } => write!(f, "failed"),
        }
    }
}

/// A negotiating agent.
///
/// Agents are single-use: once a negotiation reaches a terminal state the
/// agent refuses further requests.
#[derive(Debug)]
pub struct Agent {
    name: String,
    space: NegotiationSpace,
    evaluator: Box<dyn Evaluator>,
    generator: Box<dyn OfferGenerator>,
    constraints: ConstraintStore,
    relative_reservation_value: f64,
    reservation_value: f64,
    max_rounds: usize,
    state: AgentState,
    opponent: Option<String>,
    transcript: Transcript,
}

impl Agent {
    /// Assembles an agent from its parts.
    ///
    /// Whether the agent honours constraints follows from the generator.
    /// For constrained agents with a linear evaluator, own constraints are
    /// discovered right away.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] for an empty name or a relative
    /// reservation value outside `[0, 1]`.
    pub fn new(
        name: impl Into<String>,
        space: NegotiationSpace,
        evaluator: Box<dyn Evaluator>,
        generator: Box<dyn OfferGenerator>,
        relative_reservation_value: f64,
        max_rounds: usize,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(AgentError::InvalidConfig("agent name must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&relative_reservation_value) {
            return Err(AgentError::InvalidConfig(format!(
                "relative reservation value {relative_reservation_value} is outside [0, 1]"
            )));
        }

        let constraints = ConstraintStore::new(&space);
        let mut agent = Self {
            name,
            space,
            evaluator,
            generator,
            constraints,
            relative_reservation_value,
            reservation_value: 0.0,
            max_rounds,
            state: AgentState::Idle,
            opponent: None,
            transcript: Transcript::new(),
        };
        agent.refresh();
        Ok(agent)
    }

    /// Agent name, unique within a negotiation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The space this agent negotiates over.
    #[must_use]
    pub fn space(&self) -> &NegotiationSpace {
        &self.space
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Messages sent and received, in order.
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Returns true if the negotiation ended in agreement.
    #[must_use]
    pub fn successful(&self) -> bool {
        matches!(self.state, AgentState::Terminal { success: true })
    }

    /// Name of the current or last opponent.
    #[must_use]
    pub fn opponent(&self) -> Option<&str> {
        self.opponent.as_deref()
    }

    /// Own and opponent constraints held.
    #[must_use]
    pub fn constraints(&self) -> &ConstraintStore {
        &self.constraints
    }

    /// Returns true if the agent honours and exchanges constraints.
    #[must_use]
    pub fn is_constrained(&self) -> bool {
        self.generator.is_constrained()
    }

    /// Relative reservation value `ρ`.
    #[must_use]
    pub fn relative_reservation_value(&self) -> f64 {
        self.relative_reservation_value
    }

    /// Absolute reservation value for the current utilities and constraints.
    #[must_use]
    pub fn reservation_value(&self) -> f64 {
        self.reservation_value
    }

    /// Message count after which the agent terminates.
    #[must_use]
    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Utility of an offer, or the non-agreement cost if it violates a held constraint.
    #[must_use]
    pub fn utility(&self, offer: &Offer) -> f64 {
        self.evaluator.constrained_utility(offer, &self.constraints)
    }

    /// Utility of a failed negotiation.
    #[must_use]
    pub fn non_agreement_cost(&self) -> f64 {
        self.evaluator.non_agreement_cost()
    }

    /// Merges utilities into the agent's table and refreshes its view.
    ///
    /// # Errors
    ///
    /// Fails if an atom does not name an assignment of the space or a
    /// utility is not finite; the agent is left unchanged.
    pub fn add_utilities(&mut self, utilities: &UtilitySpec) -> Result<()> {
        self.evaluator.add_utilities(utilities)?;
        self.refresh();
        Ok(())
    }

    /// Replaces the agent's utility table and refreshes its view.
    ///
    /// # Errors
    ///
    /// Fails if an atom does not name an assignment of the space or a
    /// utility is not finite; the agent is left unchanged.
    pub fn set_utilities(&mut self, utilities: &UtilitySpec) -> Result<()> {
        self.evaluator.set_utilities(utilities)?;
        self.refresh();
        Ok(())
    }

    /// Adds an own constraint and refreshes the agent's view.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnsupportedVariant`] for agents that do not
    /// honour constraints, or a core error if the constraint lies outside
    /// the space.
    pub fn add_constraint(&mut self, constraint: AtomicConstraint) -> Result<()> {
        if !self.is_constrained() {
            return Err(AgentError::UnsupportedVariant(format!(
                "agent '{}' does not hold constraints",
                self.name
            )));
        }
        if self.constraints.add_own(constraint)? {
            self.refresh();
        }
        Ok(())
    }

    /// Runs a complete negotiation against `opponent`, with `self` moving first.
    ///
    /// Returns `Ok(true)` on agreement. A refused request returns `Ok(false)`
    /// and leaves both agents untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotIdle`] if this agent already negotiated.
    pub fn negotiate(&mut self, opponent: &mut Agent) -> Result<bool> {
        if self.state != AgentState::Idle {
            return Err(AgentError::NotIdle {
                name: self.name.clone(),
            });
        }

        info!(agent = %self.name, opponent = %opponent.name, "requesting negotiation");
        if !opponent.receive_negotiation_request(&self.name, &self.space) {
            warn!(agent = %self.name, opponent = %opponent.name, "negotiation refused");
            return Ok(false);
        }
        self.state = AgentState::Active;
        self.opponent = Some(opponent.name.clone());

        let mut speaker: &mut Agent = &mut *self;
        let mut listener: &mut Agent = &mut *opponent;
        while let Some(message) = speaker.take_turn() {
            listener.receive_message(message);
            std::mem::swap(&mut speaker, &mut listener);
        }

        info!(
            agent = %self.name,
            opponent = %opponent.name,
            messages = self.transcript.len(),
            success = self.successful(),
            "negotiation finished"
        );
        Ok(self.successful())
    }

    /// Handles a request to negotiate over `space`.
    ///
    /// The request is accepted only by an idle agent whose own space equals
    /// `space` and whose constraint store is satisfiable.
    pub fn receive_negotiation_request(
        &mut self,
        initiator: &str,
        space: &NegotiationSpace,
    ) -> bool {
        if self.state != AgentState::Idle {
            debug!(agent = %self.name, initiator, state = %self.state, "refusing: not idle");
            return false;
        }
        if *space != self.space {
            debug!(agent = %self.name, initiator, "refusing: different negotiation space");
            return false;
        }
        if !self.constraints.is_satisfiable() {
            debug!(agent = %self.name, initiator, "refusing: no acceptable offer exists");
            return false;
        }
        self.state = AgentState::Active;
        self.opponent = Some(initiator.to_string());
        debug!(agent = %self.name, initiator, "negotiation accepted");
        true
    }

    /// Records a message delivered by the opponent.
    pub fn receive_message(&mut self, message: Message) {
        debug!(agent = %self.name, message = %message.render(&self.space), "received");
        self.transcript.push(message);
    }

    /// Plays one turn, returning the message to deliver or `None` once the
    /// negotiation is over for this agent.
    fn take_turn(&mut self) -> Option<Message> {
        if self.state != AgentState::Active {
            return None;
        }
        let opponent = self.opponent.clone()?;

        let incoming = match self.transcript.last().map(|m| m.kind.clone()) {
            Some(MessageKind::Accept { .. }) => {
                self.state = AgentState::Terminal { success: true };
                return None;
            }
            Some(MessageKind::Terminate) => {
                self.state = AgentState::Terminal { success: false };
                return None;
            }
            Some(MessageKind::Offer { offer, constraint }) => {
                if let Err(e) = offer.check(&self.space) {
                    warn!(agent = %self.name, error = %e, "terminating on malformed offer");
                    return Some(self.emit(Message::terminate(&self.name, opponent)));
                }
                if let Some(constraint) = constraint {
                    self.adopt_opponent_constraint(constraint);
                }
                Some(offer)
            }
            Some(MessageKind::Empty) | None => None,
        };

        if self.transcript.len() >= self.max_rounds {
            debug!(agent = %self.name, rounds = self.transcript.len(), "round limit reached");
            return Some(self.emit(Message::terminate(&self.name, opponent)));
        }
        if !self.constraints.is_satisfiable() {
            debug!(agent = %self.name, "constraints leave no acceptable offer");
            return Some(self.emit(Message::terminate(&self.name, opponent)));
        }

        let mut attachment = None;
        if let Some(offer) = incoming {
            if self.utility(&offer) >= self.reservation_value
                && self.constraints.satisfied_by(&offer)
            {
                return Some(self.emit(Message::accept(&self.name, opponent, offer)));
            }
            if self.is_constrained() {
                attachment = self.constraints.first_violated_own(&offer);
            }
        }

        let ctx = GenerationContext {
            space: &self.space,
            evaluator: self.evaluator.as_ref(),
            constraints: &self.constraints,
            threshold: self.reservation_value,
        };
        match self.generator.generate_offer(&ctx) {
            Ok(offer) => Some(self.emit(Message::offer(&self.name, opponent, offer, attachment))),
            Err(e) => {
                debug!(agent = %self.name, error = %e, "no offer to propose");
                Some(self.emit(Message::terminate(&self.name, opponent)))
            }
        }
    }

    fn emit(&mut self, message: Message) -> Message {
        match message.kind {
            MessageKind::Accept { .. } => self.state = AgentState::Terminal { success: true },
            MessageKind::Terminate => self.state = AgentState::Terminal { success: false },
            MessageKind::Offer { .. } | MessageKind::Empty => {}
        }
        debug!(agent = %self.name, message = %message.render(&self.space), "sent");
        self.transcript.push(message.clone());
        message
    }

    fn adopt_opponent_constraint(&mut self, constraint: AtomicConstraint) {
        if !self.is_constrained() {
            debug!(agent = %self.name, "ignoring constraint attachment");
            return;
        }
        match self.constraints.add_opponent(constraint) {
            Ok(true) => {
                debug!(
                    agent = %self.name,
                    constraint = %constraint.display(&self.space),
                    "adopted opponent constraint"
                );
                self.refresh();
            }
            Ok(false) => {}
            Err(e) => warn!(agent = %self.name, error = %e, "discarding malformed constraint"),
        }
    }

    /// Re-derives own constraints, the reservation value and the generator
    /// state after utilities or constraints changed.
    fn refresh(&mut self) {
        if self.is_constrained() {
            if let Some(linear) = self.evaluator.as_linear() {
                let added = discovery::discover_own_constraints(
                    linear,
                    &mut self.constraints,
                    self.relative_reservation_value,
                );
                for constraint in &added {
                    debug!(
                        agent = %self.name,
                        constraint = %constraint.display(&self.space),
                        "discovered own constraint"
                    );
                }
            }
        }

        self.reservation_value =
            self.relative_reservation_value * self.evaluator.max_utility(&self.constraints);

        let ctx = GenerationContext {
            space: &self.space,
            evaluator: self.evaluator.as_ref(),
            constraints: &self.constraints,
            threshold: self.reservation_value,
        };
        self.generator.reindex(&ctx);
    }
}

#[cfg(test)]
mod tests;
