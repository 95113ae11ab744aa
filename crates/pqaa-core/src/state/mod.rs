//! State management for pending operations.

pub mod operation;

pub use operation::{OperationStateError, OperationStateMachine};
