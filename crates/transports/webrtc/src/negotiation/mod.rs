//! Offer/answer negotiation state machine
//!
//! [`NegotiationCoordinator`] is pure: it consumes [`Input`]s and returns the
//! [`Action`]s the session controller must perform, in order. It never
//! touches the transport or the engine itself.

pub mod coordinator;
pub mod state;

pub use coordinator::{Action, Input, NegotiationCoordinator};
pub use state::NegotiationState;
