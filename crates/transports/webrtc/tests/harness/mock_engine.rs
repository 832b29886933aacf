//! Recording negotiation engine

use super::{HarnessError, HarnessResult, WAIT};
use async_trait::async_trait;
use clive_webrtc::{
    EngineEvent, Error, IceCandidate, NegotiationEngine, Result, SessionDescription,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// One call made on the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateOffer,
    CreateAnswer,
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddCandidate(IceCandidate),
    Close,
}

/// Engine that records calls and returns `offer-N` / `answer-N` descriptions
#[derive(Default)]
pub struct MockEngine {
    calls: Mutex<Vec<EngineCall>>,
    offers: AtomicUsize,
    answers: AtomicUsize,
    events: Mutex<Option<mpsc::UnboundedSender<EngineEvent>>>,

    pub fail_create_offer: AtomicBool,
    pub fail_set_remote: AtomicBool,
    pub fail_add_candidate: AtomicBool,
    /// Delay applied to offer/answer creation
    pub create_delay: Mutex<Option<Duration>>,
}

impl MockEngine {
    /// Engine plus the receiver to hand to the controller
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self::default();
        *engine.events.lock() = Some(tx);
        (Arc::new(engine), rx)
    }

    /// Raise an engine event
    pub fn emit(&self, event: EngineEvent) {
        if let Some(events) = self.events.lock().as_ref() {
            let _ = events.send(event);
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }

    /// Wait until `pred` holds for the recorded calls
    pub async fn wait_for<F>(&self, what: &str, pred: F) -> HarnessResult<Vec<EngineCall>>
    where
        F: Fn(&[EngineCall]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let calls = self.calls();
            if pred(&calls) {
                return Ok(calls);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(HarnessError::Timeout(format!("{}; calls: {:?}", what, calls)));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn maybe_delay(&self) {
        let delay = *self.create_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl NegotiationEngine for MockEngine {
    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record(EngineCall::CreateOffer);
        self.maybe_delay().await;
        if self.fail_create_offer.load(Ordering::SeqCst) {
            return Err(Error::Negotiation("offer creation failed".to_string()));
        }
        let n = self.offers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionDescription::offer(format!("offer-{}", n)))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record(EngineCall::CreateAnswer);
        self.maybe_delay().await;
        let n = self.answers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionDescription::answer(format!("answer-{}", n)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.record(EngineCall::SetLocal(desc));
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.record(EngineCall::SetRemote(desc));
        if self.fail_set_remote.load(Ordering::SeqCst) {
            return Err(Error::Negotiation("remote description rejected".to_string()));
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(EngineCall::AddCandidate(candidate));
        if self.fail_add_candidate.load(Ordering::SeqCst) {
            return Err(Error::WebRtc("candidate rejected".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(EngineCall::Close);
        Ok(())
    }
}
