//! Relay receipt types.
//!
//! Bundlers identify a submitted operation by its user-operation hash and
//! eventually report the transaction that included it.

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};

/// Receipt for an operation included on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReceipt {
	/// Operation id assigned by the relay (the user-operation hash).
	pub operation_id: B256,
	/// Hash of the bundle transaction that included the operation.
	pub transaction_hash: B256,
	/// Gas consumed by the operation.
	pub gas_used: U256,
	/// Whether the operation's call succeeded.
	pub success: bool,
	/// Revert reason reported by the relay, if any.
	pub reason: Option<String>,
}
