//! Common types module for the post-quantum operation pipeline.
//!
//! This module defines the data types shared by every crate in the workspace:
//! user intents, packed and relay-shaped operation records, signer metadata,
//! lifecycle status, session boundary messages and configuration validation.

/// Intent types delivered by the session layer.
pub mod intent;
/// Lifecycle status and failure taxonomy for pending operations.
pub mod lifecycle;
/// Session boundary and lifecycle event types.
pub mod events;
/// ERC-4337 v0.7 operation records (packed and relay-shaped).
pub mod operation;
/// Implementation registry trait.
pub mod registry;
/// Relay receipt types.
pub mod relay;
/// JSON-RPC 2.0 envelopes shared by the relay and plugin transports.
pub mod rpc;
/// Redacted, zeroizing hex secrets.
pub mod secret;
/// Signer backend metadata.
pub mod signer;
/// Utility functions for hex handling and formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use events::*;
pub use intent::Intent;
pub use lifecycle::*;
pub use operation::*;
pub use registry::ImplementationRegistry;
pub use relay::*;
pub use rpc::*;
pub use secret::SecretHex;
pub use signer::*;
pub use utils::{decode_fixed, decode_hex, encode_hex, truncate_id, without_0x_prefix, HexError};
pub use validation::*;
