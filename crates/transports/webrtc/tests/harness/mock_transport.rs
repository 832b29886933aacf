//! Scripted in-memory transport

use super::{HarnessError, HarnessResult, WAIT};
use async_trait::async_trait;
use clive_webrtc::{SignalingMessage, Transport, TransportEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Transport whose inbound side is driven by the test
pub struct MockTransport {
    /// Reason to fail `connect` with, if any
    refuse: Option<String>,
    /// Time `connect` takes before it resolves
    connect_delay: Option<Duration>,

    urls: Mutex<Vec<String>>,
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    connected: Notify,

    sent_tx: mpsc::UnboundedSender<String>,
    sent_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,

    close_calls: AtomicUsize,
}

impl MockTransport {
    /// Transport that accepts every connect
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Transport whose connect fails with `reason`
    pub fn refusing(reason: &str) -> Self {
        Self::build(Some(reason.to_string()), None)
    }

    /// Transport whose connect takes `delay` before accepting
    pub fn slow(delay: Duration) -> Self {
        Self::build(None, Some(delay))
    }

    fn build(refuse: Option<String>, connect_delay: Option<Duration>) -> Self {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        Self {
            refuse,
            connect_delay,
            urls: Mutex::new(Vec::new()),
            events: Mutex::new(None),
            connected: Notify::new(),
            sent_tx,
            sent_rx: tokio::sync::Mutex::new(sent_rx),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// URLs passed to `connect`
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Wait until `connect` has been called and accepted
    pub async fn wait_connected(&self) -> HarnessResult<()> {
        if self.events.lock().is_some() {
            return Ok(());
        }
        tokio::time::timeout(WAIT, self.connected.notified())
            .await
            .map_err(|_| HarnessError::Timeout("transport never connected".to_string()))
    }

    fn emit(&self, event: TransportEvent) {
        if let Some(events) = self.events.lock().as_ref() {
            let _ = events.send(event);
        }
    }

    /// Deliver a raw inbound frame
    pub fn push_text(&self, text: &str) {
        self.emit(TransportEvent::Text(text.to_string()));
    }

    /// Deliver an encoded message
    pub fn push(&self, msg: &SignalingMessage) {
        self.push_text(&msg.encode());
    }

    /// Simulate the server closing the connection
    pub fn drop_connection(&self) {
        if let Some(events) = self.events.lock().take() {
            let _ = events.send(TransportEvent::Closed);
        }
    }

    /// Simulate an abrupt connection loss
    pub fn fail(&self, reason: &str) {
        if let Some(events) = self.events.lock().take() {
            let _ = events.send(TransportEvent::Error(reason.to_string()));
        }
    }

    /// Next outbound frame, decoded
    pub async fn expect_sent(&self) -> HarnessResult<SignalingMessage> {
        let mut rx = self.sent_rx.lock().await;
        let text = tokio::time::timeout(WAIT, rx.recv())
            .await
            .map_err(|_| HarnessError::Timeout("nothing sent".to_string()))?
            .ok_or_else(|| HarnessError::Unexpected("sent channel closed".to_string()))?;

        SignalingMessage::decode(&text)
            .map_err(|e| HarnessError::Unexpected(format!("sent undecodable frame {}: {}", text, e)))
    }

    /// Assert nothing else is sent within `wait`
    pub async fn expect_silence(&self, wait: Duration) -> HarnessResult<()> {
        let mut rx = self.sent_rx.lock().await;
        match tokio::time::timeout(wait, rx.recv()).await {
            Err(_) | Ok(None) => Ok(()),
            Ok(Some(text)) => Err(HarnessError::Unexpected(format!("unexpected frame {}", text))),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str) -> mpsc::UnboundedReceiver<TransportEvent> {
        self.urls.lock().push(url.to_string());
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        let (tx, rx) = mpsc::unbounded_channel();

        match &self.refuse {
            Some(reason) => {
                let _ = tx.send(TransportEvent::Error(reason.clone()));
            }
            None => {
                let _ = tx.send(TransportEvent::Open);
                *self.events.lock() = Some(tx);
                self.connected.notify_one();
            }
        }

        rx
    }

    fn send_text(&self, text: String) {
        let _ = self.sent_tx.send(text);
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(events) = self.events.lock().take() {
            let _ = events.send(TransportEvent::Closed);
        }
    }
}
