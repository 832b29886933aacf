use std::fmt;

/// Negotiation progress of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    /// Transport not connected yet
    Idle,
    /// Connected, waiting for the remote peer (caller) or its offer (callee)
    AwaitingPeer,
    /// Offer requested from the engine
    OfferCreating,
    /// Offer being applied locally and sent
    OfferSent,
    /// Offer applied and sent, waiting for the answer
    AwaitingAnswer,
    /// Remote offer applied, answer requested from the engine
    AnswerCreating,
    /// Answer being applied locally and sent
    AnswerSent,
    /// Both descriptions applied
    Negotiated,
    /// Transport closed or local shutdown
    Closed,
    /// Negotiation could not complete
    Failed,
}

impl NegotiationState {
    /// `Closed` or `Failed`; no further input is processed
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationState::Closed | NegotiationState::Failed)
    }

    /// An offer/answer round is in progress
    pub fn is_negotiating(&self) -> bool {
        matches!(
            self,
            NegotiationState::OfferCreating
                | NegotiationState::OfferSent
                | NegotiationState::AwaitingAnswer
                | NegotiationState::AnswerCreating
                | NegotiationState::AnswerSent
        )
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
