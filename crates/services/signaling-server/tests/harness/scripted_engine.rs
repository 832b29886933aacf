//! Engine with canned descriptions for relay end-to-end tests

use super::{HarnessError, HarnessResult, WAIT};
use async_trait::async_trait;
use clive_webrtc::{EngineEvent, IceCandidate, NegotiationEngine, Result, SessionDescription};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// Returns `<name>-offer` / `<name>-answer` and records what it was given
pub struct ScriptedEngine {
    name: String,
    events: mpsc::UnboundedSender<EngineEvent>,
    remote: Mutex<Vec<SessionDescription>>,
    candidates: Mutex<Vec<IceCandidate>>,
}

impl ScriptedEngine {
    pub fn new(name: &str) -> (std::sync::Arc<Self>, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let engine = Self {
            name: name.to_string(),
            events,
            remote: Mutex::new(Vec::new()),
            candidates: Mutex::new(Vec::new()),
        };
        (std::sync::Arc::new(engine), rx)
    }

    /// Report a locally gathered candidate
    pub fn gather(&self, candidate: IceCandidate) {
        let _ = self.events.send(EngineEvent::IceCandidate(candidate));
    }

    pub fn remote_descriptions(&self) -> Vec<SessionDescription> {
        self.remote.lock().clone()
    }

    /// Wait until `count` remote candidates were applied
    pub async fn wait_candidates(&self, count: usize) -> HarnessResult<Vec<IceCandidate>> {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let applied = self.candidates.lock().clone();
            if applied.len() >= count {
                return Ok(applied);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(HarnessError::Timeout(format!(
                    "{} applied {} candidates, wanted {}",
                    self.name,
                    applied.len(),
                    count
                )));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl NegotiationEngine for ScriptedEngine {
    async fn create_offer(&self) -> Result<SessionDescription> {
        Ok(SessionDescription::offer(format!("{}-offer", self.name)))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        Ok(SessionDescription::answer(format!("{}-answer", self.name)))
    }

    async fn set_local_description(&self, _desc: SessionDescription) -> Result<()> {
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.remote.lock().push(desc);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.candidates.lock().push(candidate);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
