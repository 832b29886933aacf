//! Signaling session test harness
//!
//! Provides scripted stand-ins for the two seams of a session:
//! - `MockTransport`: records outbound frames, lets the test inject inbound ones
//! - `MockEngine`: records engine calls, returns canned descriptions, raises events
//!
//! Basic usage pattern:
//!
//! 1. Create a `MockTransport` and a `MockEngine`
//! 2. Build a `SessionController` over them and spawn `run()`
//! 3. `wait_connected()`, then inject frames and engine events
//! 4. Assert on `expect_sent()` and `MockEngine::calls()`

#![allow(dead_code)]

pub mod mock_engine;
pub mod mock_transport;

use clive_webrtc::{NegotiationState, Role, SessionConfig};
use std::time::Duration;
use tokio::sync::watch;

pub use mock_engine::{EngineCall, MockEngine};
pub use mock_transport::MockTransport;

/// Result type for test harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Error type for test harness operations
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Unexpected: {0}")]
    Unexpected(String),
}

/// Default wait used by harness helpers
pub const WAIT: Duration = Duration::from_secs(5);

/// Initialize tracing for tests (call once per test)
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug,webrtc=warn")
        .with_test_writer()
        .try_init();
}

/// Session config for `role` with the negotiation timer disabled
pub fn test_config(role: Role) -> SessionConfig {
    SessionConfig {
        room: "harness-room".to_string(),
        role,
        negotiation_timeout_secs: 0,
        ..SessionConfig::default()
    }
}

/// Wait until the observed state equals `expected`
pub async fn wait_for_state(
    rx: &mut watch::Receiver<NegotiationState>,
    expected: NegotiationState,
) -> HarnessResult<()> {
    let waited = tokio::time::timeout(WAIT, rx.wait_for(|state| *state == expected))
        .await
        .map(|result| result.is_ok());

    match waited {
        Ok(true) => Ok(()),
        Ok(false) => Err(HarnessError::Unexpected(format!(
            "controller ended before reaching {:?}",
            expected
        ))),
        Err(_) => Err(HarnessError::Timeout(format!(
            "state {:?} not reached, last {:?}",
            expected,
            *rx.borrow()
        ))),
    }
}
