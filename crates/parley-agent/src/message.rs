//! Protocol messages and transcripts.

use std::fmt::Write as _;

use parley_core::{AtomicConstraint, NegotiationSpace, Offer};
use serde::{Deserialize, Serialize};

/// Payload of a protocol message.
///
/// Only an Offer may carry a constraint attachment: an accepted offer needs
/// no further propagation, and a terminated negotiation has no next turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageKind {
    /// No payload.
    Empty,
    /// A proposal, optionally carrying a constraint the sender wants adopted.
    Offer {
        /// Proposed offer.
        offer: Offer,
        /// Constraint discovered by the sender.
        constraint: Option<AtomicConstraint>,
    },
    /// Acceptance of the opponent's last offer.
    Accept {
        /// Accepted offer.
        offer: Offer,
    },
    /// Unilateral end of the negotiation.
    Terminate,
}

/// A message exchanged between two agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sending agent's name.
    pub sender: String,
    /// Receiving agent's name.
    pub recipient: String,
    /// Payload.
    #[serde(flatten)]
    pub kind: MessageKind,
}

impl Message {
    /// Creates an Empty message.
    #[must_use]
    pub fn empty(sender: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self::new(sender, recipient, MessageKind::Empty)
    }

    /// Creates an Offer message.
    #[must_use]
    pub fn offer(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        offer: Offer,
        constraint: Option<AtomicConstraint>,
    ) -> Self {
        Self::new(sender, recipient, MessageKind::Offer { offer, constraint })
    }

    /// Creates an Accept message.
    #[must_use]
    pub fn accept(sender: impl Into<String>, recipient: impl Into<String>, offer: Offer) -> Self {
        Self::new(sender, recipient, MessageKind::Accept { offer })
    }

    /// Creates a Terminate message.
    #[must_use]
    pub fn terminate(sender: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self::new(sender, recipient, MessageKind::Terminate)
    }

    fn new(sender: impl Into<String>, recipient: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            kind,
        }
    }

    /// The offer carried by an Offer or Accept message.
    #[must_use]
    pub fn offer_ref(&self) -> Option<&Offer> {
        match &self.kind {
            MessageKind::Offer { offer, .. } | MessageKind::Accept { offer } => Some(offer),
            MessageKind::Empty | MessageKind::Terminate => None,
        }
    }

    /// The constraint attached to an Offer message.
    #[must_use]
    pub fn constraint(&self) -> Option<AtomicConstraint> {
        match &self.kind {
            MessageKind::Offer { constraint, .. } => *constraint,
            _ => None,
        }
    }

    /// Returns true for an Offer message.
    #[must_use]
    pub const fn is_offer(&self) -> bool {
        matches!(self.kind, MessageKind::Offer { .. })
    }

    /// Returns true for an Accept message.
    #[must_use]
    pub const fn is_accept(&self) -> bool {
        matches!(self.kind, MessageKind::Accept { .. })
    }

    /// Returns true for a Terminate message.
    #[must_use]
    pub const fn is_terminate(&self) -> bool {
        matches!(self.kind, MessageKind::Terminate)
    }

    /// Short name of the message kind.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self.kind {
            MessageKind::Empty => "empty",
            MessageKind::Offer { .. } => "offer",
            MessageKind::Accept { .. } => "accept",
            MessageKind::Terminate => "terminate",
        }
    }

    /// Log rendering: `Message(sender, recipient, kind, offer?, constraint?)`
    /// with the offer as one indented `issue: value` line per issue.
    #[must_use]
    pub fn render(&self, space: &NegotiationSpace) -> String {
        let mut out = format!("Message({}, {}, {}", self.sender, self.recipient, self.kind_name());
        if let Some(offer) = self.offer_ref() {
            out.push_str(",\n");
            out.push_str(&offer.describe(space));
        }
        if let Some(constraint) = self.constraint() {
            let _ = write!(out, ", {}", constraint.display(space));
        }
        out.push(')');
        out
    }
}

/// Append-only, ordered record of the messages of one negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Creates an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Number of messages recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if nothing was recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recent message.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// All messages in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Iterates messages in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Offers proposed by `sender`, in order.
    pub fn offers_from<'a>(&'a self, sender: &'a str) -> impl Iterator<Item = &'a Offer> + 'a {
        self.messages
            .iter()
            .filter(move |m| m.sender == sender && m.is_offer())
            .filter_map(Message::offer_ref)
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
