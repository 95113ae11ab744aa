//! Core pipeline for the post-quantum operation relay.
//!
//! Wires the operation builder, the active signer and the relay into a
//! per-request lifecycle, tracks each request in a validated state machine and
//! exposes the session boundary as a pair of channels. Lifecycle events are
//! broadcast for observers.

pub mod builder;
pub mod engine;
pub mod state;

#[cfg(test)]
mod test_support;

pub use builder::{BuilderError, PipelineBuilder, PipelineFactories};
pub use engine::event_bus::EventBus;
pub use engine::lifecycle::OperationLifecycle;
pub use engine::{EngineError, SessionEngine};
pub use state::{OperationStateError, OperationStateMachine};
