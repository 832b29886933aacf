use super::NegotiationState;
use crate::peer::{IceCandidate, SessionDescription};
use crate::session::{Role, SessionEnd};
use crate::signaling::protocol::{DecodeError, SignalingMessage};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Everything that can happen to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Signaling connection established
    TransportOpened,
    /// Signaling connection closed
    TransportClosed,
    /// Signaling connection failed
    TransportError(String),
    /// Decoded message from the remote peer
    Message(SignalingMessage),
    /// Inbound frame that could not be decoded
    InvalidMessage(DecodeError),
    /// Engine asks for a (re-)negotiation
    NegotiationNeeded,
    /// Engine produced the requested offer
    OfferCreated(SessionDescription),
    /// Engine produced the requested answer
    AnswerCreated(SessionDescription),
    /// Engine gathered a local ICE candidate
    LocalCandidate(IceCandidate),
    /// The last `SetLocalDescription` action succeeded
    LocalDescriptionApplied,
    /// Engine could not create or apply a description, or the connection failed
    NegotiationFailed(String),
    /// Timer armed by `StartNegotiationTimer` fired
    NegotiationTimedOut { round: u64 },
    /// Local shutdown request
    Shutdown,
}

/// Work requested by the coordinator, executed in order by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send(SignalingMessage),
    CreateOffer,
    CreateAnswer,
    SetLocalDescription(SessionDescription),
    SetRemoteDescription(SessionDescription),
    AddIceCandidate(IceCandidate),
    StartNegotiationTimer { round: u64 },
    Terminate(SessionEnd),
}

/// Signaling state machine for one session
#[derive(Debug)]
pub struct NegotiationCoordinator {
    role: Role,
    state: NegotiationState,
    /// Current offer/answer round, 0 before the first one starts
    round: u64,
    /// Round whose remote description has been applied
    remote_applied_round: Option<u64>,
    /// A remote description has been applied at least once
    has_remote_description: bool,
    transport_open: bool,
    /// Remote candidates received before any remote description
    pending_candidates: VecDeque<IceCandidate>,
}

impl NegotiationCoordinator {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            state: NegotiationState::Idle,
            round: 0,
            remote_applied_round: None,
            has_remote_description: false,
            transport_open: false,
            pending_candidates: VecDeque::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    /// Number of remote candidates waiting for a remote description
    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Advance the state machine by one input
    pub fn handle(&mut self, input: Input) -> Vec<Action> {
        if self.state.is_terminal() {
            debug!(state = ?self.state, input = ?input, "Session ended, input ignored");
            return Vec::new();
        }

        match input {
            Input::TransportOpened => self.on_transport_opened(),
            Input::TransportClosed => self.terminate(NegotiationState::Closed, SessionEnd::TransportClosed),
            Input::TransportError(reason) => {
                self.terminate(NegotiationState::Closed, SessionEnd::TransportError(reason))
            }
            Input::Shutdown => self.terminate(NegotiationState::Closed, SessionEnd::Shutdown),
            Input::Message(msg) => self.on_message(msg),
            Input::InvalidMessage(err) => {
                warn!(error = %err, "Dropping undecodable signaling message");
                Vec::new()
            }
            Input::NegotiationNeeded => self.on_negotiation_needed(),
            Input::OfferCreated(offer) => self.on_offer_created(offer),
            Input::AnswerCreated(answer) => self.on_answer_created(answer),
            Input::LocalCandidate(candidate) => self.on_local_candidate(candidate),
            Input::LocalDescriptionApplied => self.on_local_description_applied(),
            Input::NegotiationFailed(reason) => {
                self.terminate(NegotiationState::Failed, SessionEnd::NegotiationFailed(reason))
            }
            Input::NegotiationTimedOut { round } => self.on_timeout(round),
        }
    }

    fn transition(&mut self, next: NegotiationState) {
        if self.state != next {
            debug!(role = ?self.role, from = ?self.state, to = ?next, "Negotiation state transition");
            self.state = next;
        }
    }

    fn terminate(&mut self, next: NegotiationState, end: SessionEnd) -> Vec<Action> {
        info!(role = ?self.role, state = ?self.state, reason = %end, "Session ending");
        self.transition(next);
        self.transport_open = false;
        self.pending_candidates.clear();
        vec![Action::Terminate(end)]
    }

    fn on_transport_opened(&mut self) -> Vec<Action> {
        if self.state != NegotiationState::Idle {
            warn!(state = ?self.state, "Transport opened twice, ignoring");
            return Vec::new();
        }
        self.transport_open = true;
        self.transition(NegotiationState::AwaitingPeer);
        Vec::new()
    }

    /// Begin a new offer/answer round
    fn start_round(&mut self) -> Action {
        self.round += 1;
        Action::StartNegotiationTimer { round: self.round }
    }

    fn start_offer(&mut self) -> Vec<Action> {
        let timer = self.start_round();
        self.transition(NegotiationState::OfferCreating);
        info!(round = self.round, "Creating offer");
        vec![timer, Action::CreateOffer]
    }

    fn on_negotiation_needed(&mut self) -> Vec<Action> {
        match (self.role, self.state) {
            (Role::Caller, NegotiationState::AwaitingPeer | NegotiationState::Negotiated) => {
                self.start_offer()
            }
            (role, state) => {
                debug!(role = ?role, state = ?state, "Negotiation-needed ignored");
                Vec::new()
            }
        }
    }

    fn on_message(&mut self, msg: SignalingMessage) -> Vec<Action> {
        debug!(kind = msg.kind(), state = ?self.state, "Signaling message received");

        match msg {
            SignalingMessage::PeerReady => self.on_peer_ready(),
            SignalingMessage::Offer { sdp } => self.on_remote_offer(sdp),
            SignalingMessage::Answer { sdp } => self.on_remote_answer(sdp),
            SignalingMessage::Candidate(candidate) => self.on_remote_candidate(candidate),
        }
    }

    fn on_peer_ready(&mut self) -> Vec<Action> {
        if self.role == Role::Caller && self.state == NegotiationState::AwaitingPeer {
            info!("Remote peer ready");
            return self.start_offer();
        }
        debug!(role = ?self.role, state = ?self.state, "peer-ready ignored");
        Vec::new()
    }

    fn on_remote_offer(&mut self, sdp: String) -> Vec<Action> {
        if self.role == Role::Caller {
            warn!(state = ?self.state, "Protocol violation: offer received by caller, dropping");
            return Vec::new();
        }

        match self.state {
            NegotiationState::AwaitingPeer | NegotiationState::Negotiated => {
                let timer = self.start_round();
                info!(round = self.round, "Applying remote offer");

                let mut actions = vec![timer];
                actions.extend(self.apply_remote(SessionDescription::offer(sdp)));
                actions.push(Action::CreateAnswer);
                self.transition(NegotiationState::AnswerCreating);
                actions
            }
            state => {
                warn!(state = ?state, round = self.round, "Out-of-sequence offer, dropping");
                Vec::new()
            }
        }
    }

    fn on_remote_answer(&mut self, sdp: String) -> Vec<Action> {
        if self.role == Role::Callee {
            warn!(state = ?self.state, "Protocol violation: answer received by callee, dropping");
            return Vec::new();
        }

        if self.state != NegotiationState::AwaitingAnswer
            || self.remote_applied_round == Some(self.round)
        {
            warn!(state = ?self.state, round = self.round, "Out-of-sequence answer, dropping");
            return Vec::new();
        }

        info!(round = self.round, "Applying remote answer");
        let actions = self.apply_remote(SessionDescription::answer(sdp));
        self.transition(NegotiationState::Negotiated);
        actions
    }

    /// Apply a remote description and flush candidates that arrived before it
    fn apply_remote(&mut self, desc: SessionDescription) -> Vec<Action> {
        self.remote_applied_round = Some(self.round);
        self.has_remote_description = true;

        let mut actions = Vec::with_capacity(1 + self.pending_candidates.len());
        actions.push(Action::SetRemoteDescription(desc));
        if !self.pending_candidates.is_empty() {
            debug!(count = self.pending_candidates.len(), "Draining queued remote candidates");
        }
        actions.extend(self.pending_candidates.drain(..).map(Action::AddIceCandidate));
        actions
    }

    fn on_remote_candidate(&mut self, candidate: IceCandidate) -> Vec<Action> {
        if self.has_remote_description {
            vec![Action::AddIceCandidate(candidate)]
        } else {
            debug!(
                queued = self.pending_candidates.len() + 1,
                "Remote candidate before remote description, queueing"
            );
            self.pending_candidates.push_back(candidate);
            Vec::new()
        }
    }

    fn on_local_candidate(&mut self, candidate: IceCandidate) -> Vec<Action> {
        if !self.transport_open {
            warn!("Local candidate gathered while transport is not open, dropping");
            return Vec::new();
        }
        vec![Action::Send(SignalingMessage::Candidate(candidate))]
    }

    fn on_offer_created(&mut self, offer: SessionDescription) -> Vec<Action> {
        if self.state != NegotiationState::OfferCreating {
            debug!(state = ?self.state, "Stale offer ignored");
            return Vec::new();
        }
        self.transition(NegotiationState::OfferSent);
        let sdp = offer.sdp.clone();
        vec![
            Action::SetLocalDescription(offer),
            Action::Send(SignalingMessage::Offer { sdp }),
        ]
    }

    fn on_answer_created(&mut self, answer: SessionDescription) -> Vec<Action> {
        if self.state != NegotiationState::AnswerCreating {
            debug!(state = ?self.state, "Stale answer ignored");
            return Vec::new();
        }
        self.transition(NegotiationState::AnswerSent);
        let sdp = answer.sdp.clone();
        vec![
            Action::SetLocalDescription(answer),
            Action::Send(SignalingMessage::Answer { sdp }),
        ]
    }

    fn on_local_description_applied(&mut self) -> Vec<Action> {
        match self.state {
            NegotiationState::OfferSent => self.transition(NegotiationState::AwaitingAnswer),
            NegotiationState::AnswerSent => {
                self.transition(NegotiationState::Negotiated);
                info!(round = self.round, "Negotiation complete");
            }
            state => debug!(state = ?state, "Local description applied, no transition"),
        }
        Vec::new()
    }

    fn on_timeout(&mut self, round: u64) -> Vec<Action> {
        if round != self.round || !self.state.is_negotiating() {
            debug!(round, current = self.round, state = ?self.state, "Stale negotiation timer");
            return Vec::new();
        }
        self.terminate(
            NegotiationState::Failed,
            SessionEnd::NegotiationFailed(format!("round {} timed out in {:?}", round, self.state)),
        )
    }
}
