//! Inference dispatch and session orchestration.
//!
//! The [`dispatcher`] runs every backend call on a dedicated worker thread
//! so the real-time loop never blocks on the network; the [`session`] owns
//! the agents and turns drained worker events into state transitions.

pub mod dispatcher;
pub mod session;

pub use dispatcher::{InferenceClient, ShutdownError};
pub use session::{Session, SessionEvent};
