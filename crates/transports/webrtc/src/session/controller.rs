//! Session controller: the single serialization point of a session
//!
//! Signaling events, engine events and internal completions (offers and
//! answers created in spawned tasks, negotiation timers) converge on one
//! `tokio::select!` loop. Each input is fed to the coordinator and its
//! actions are executed in order before the next input is taken.

use super::{Session, SessionEnd};
use crate::config::SessionConfig;
use crate::negotiation::{Action, Input, NegotiationState};
use crate::peer::{EngineEvent, IncomingTrack, NegotiationEngine, PeerConnection};
use crate::signaling::{SignalingChannel, SignalingEvent, Transport, WebSocketTransport};
use crate::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Drives one [`Session`] until it ends
pub struct SessionController {
    session: Session,
    channel: SignalingChannel,
    engine: Arc<dyn NegotiationEngine>,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    negotiation_timeout: Option<Duration>,
    track_sink: Option<mpsc::UnboundedSender<IncomingTrack>>,
    shutdown: Option<broadcast::Receiver<()>>,
    state_tx: watch::Sender<NegotiationState>,
    /// Timer of the current negotiation round
    timer: Option<JoinHandle<()>>,
}

impl SessionController {
    /// Create a controller over the given transport and engine
    ///
    /// `engine_events` must be the receiving end of the sender the engine
    /// was built with.
    pub fn new(
        config: &SessionConfig,
        transport: Arc<dyn Transport>,
        engine: Arc<dyn NegotiationEngine>,
        engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    ) -> Result<Self> {
        config.validate()?;

        let session = Session::new(config.role, config.endpoint());
        let (state_tx, _) = watch::channel(session.state());

        Ok(Self {
            session,
            channel: SignalingChannel::new(transport),
            engine,
            engine_events,
            negotiation_timeout: config.negotiation_timeout(),
            track_sink: None,
            shutdown: None,
            state_tx,
            timer: None,
        })
    }

    /// Create a controller backed by a websocket transport and a webrtc-rs peer connection
    pub async fn from_config(config: &SessionConfig) -> Result<Self> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(PeerConnection::new(config, events_tx).await?);
        let transport = Arc::new(WebSocketTransport::new(config.connect_timeout()));

        Self::new(config, transport, engine, events_rx)
    }

    /// Forward remote tracks to `sink`
    pub fn with_track_sink(mut self, sink: mpsc::UnboundedSender<IncomingTrack>) -> Self {
        self.track_sink = Some(sink);
        self
    }

    /// End the session when `shutdown` fires
    pub fn with_shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Observe negotiation state changes
    pub fn subscribe_state(&self) -> watch::Receiver<NegotiationState> {
        self.state_tx.subscribe()
    }

    /// Run the session to completion
    ///
    /// Closes the signaling channel and the engine before returning.
    #[instrument(
        skip_all,
        fields(
            session_id = %self.session.id(),
            role = %self.session.role(),
            room = %self.session.endpoint().room()
        )
    )]
    pub async fn run(mut self) -> SessionEnd {
        info!(endpoint = %self.session.endpoint(), "Starting signaling session");

        let (inbox_tx, mut inbox_rx) = mpsc::unbounded_channel::<Input>();
        let mut shutdown = self.shutdown.take();

        // Connecting can take up to the connect timeout
        let connecting = tokio::select! {
            signaling = self.channel.connect(self.session.endpoint()) => Some(signaling),
            _ = wait_for_shutdown(&mut shutdown) => None,
        };

        let end = match connecting {
            Some(mut signaling) => loop {
                let input = tokio::select! {
                    event = signaling.recv() => Some(match event {
                        Some(event) => signaling_input(event),
                        None => Input::TransportClosed,
                    }),
                    Some(event) = self.engine_events.recv() => self.engine_input(event),
                    Some(input) = inbox_rx.recv() => Some(input),
                    _ = wait_for_shutdown(&mut shutdown) => Some(Input::Shutdown),
                };

                let Some(input) = input else { continue };
                if let Some(end) = self.dispatch(input, &inbox_tx).await {
                    break end;
                }
            },
            None => {
                info!("Shutdown requested while connecting");
                self.dispatch(Input::Shutdown, &inbox_tx)
                    .await
                    .unwrap_or(SessionEnd::Shutdown)
            }
        };

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.channel.close().await;
        if let Err(e) = self.engine.close().await {
            warn!("Failed to close negotiation engine: {}", e);
        }

        info!(reason = %end, state = ?self.session.state(), "Signaling session ended");
        end
    }

    fn engine_input(&self, event: EngineEvent) -> Option<Input> {
        match event {
            EngineEvent::NegotiationNeeded => Some(Input::NegotiationNeeded),
            EngineEvent::IceCandidate(candidate) => Some(Input::LocalCandidate(candidate)),
            EngineEvent::Failed(reason) => Some(Input::NegotiationFailed(reason)),
            EngineEvent::IncomingTrack(track) => {
                info!(kind = %track.kind, track_id = %track.track_id, "Incoming track");
                if let Some(sink) = &self.track_sink {
                    if sink.send(track).is_err() {
                        debug!("Track sink closed");
                    }
                }
                None
            }
        }
    }

    /// Feed one input and everything it triggers synchronously
    async fn dispatch(
        &mut self,
        input: Input,
        inbox: &mpsc::UnboundedSender<Input>,
    ) -> Option<SessionEnd> {
        let mut end = None;
        let mut inputs = VecDeque::from([input]);

        while let Some(input) = inputs.pop_front() {
            let mut actions = VecDeque::from(self.session.coordinator_mut().handle(input));

            while let Some(action) = actions.pop_front() {
                match action {
                    Action::Send(msg) => self.channel.send(&msg),
                    Action::CreateOffer => {
                        let engine = Arc::clone(&self.engine);
                        let inbox = inbox.clone();
                        tokio::spawn(async move {
                            let input = match engine.create_offer().await {
                                Ok(offer) => Input::OfferCreated(offer),
                                Err(e) => Input::NegotiationFailed(e.to_string()),
                            };
                            let _ = inbox.send(input);
                        });
                    }
                    Action::CreateAnswer => {
                        let engine = Arc::clone(&self.engine);
                        let inbox = inbox.clone();
                        tokio::spawn(async move {
                            let input = match engine.create_answer().await {
                                Ok(answer) => Input::AnswerCreated(answer),
                                Err(e) => Input::NegotiationFailed(e.to_string()),
                            };
                            let _ = inbox.send(input);
                        });
                    }
                    Action::SetLocalDescription(desc) => {
                        match self.engine.set_local_description(desc).await {
                            Ok(()) => inputs.push_back(Input::LocalDescriptionApplied),
                            Err(e) => {
                                actions.clear();
                                inputs.push_back(Input::NegotiationFailed(e.to_string()));
                            }
                        }
                    }
                    Action::SetRemoteDescription(desc) => {
                        if let Err(e) = self.engine.set_remote_description(desc).await {
                            actions.clear();
                            inputs.push_back(Input::NegotiationFailed(e.to_string()));
                        }
                    }
                    Action::AddIceCandidate(candidate) => {
                        if let Err(e) = self.engine.add_ice_candidate(candidate).await {
                            warn!("Failed to add remote ICE candidate: {}", e);
                        }
                    }
                    Action::StartNegotiationTimer { round } => self.arm_timer(round, inbox),
                    Action::Terminate(reason) => end = Some(reason),
                }
            }

            self.state_tx.send_replace(self.session.state());
        }

        end
    }

    fn arm_timer(&mut self, round: u64, inbox: &mpsc::UnboundedSender<Input>) {
        if let Some(previous) = self.timer.take() {
            previous.abort();
        }
        let Some(timeout) = self.negotiation_timeout else {
            return;
        };

        let inbox = inbox.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = inbox.send(Input::NegotiationTimedOut { round });
        }));
    }
}

fn signaling_input(event: SignalingEvent) -> Input {
    match event {
        SignalingEvent::Connected => Input::TransportOpened,
        SignalingEvent::Message(msg) => Input::Message(msg),
        SignalingEvent::Rejected(err) => Input::InvalidMessage(err),
        SignalingEvent::Closed => Input::TransportClosed,
        SignalingEvent::Failed(reason) => Input::TransportError(reason),
    }
}

async fn wait_for_shutdown(shutdown: &mut Option<broadcast::Receiver<()>>) {
    match shutdown {
        Some(rx) => match rx.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            // Sender gone without firing
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        },
        None => std::future::pending::<()>().await,
    }
}
