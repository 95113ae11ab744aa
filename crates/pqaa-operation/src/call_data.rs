//! Account call encoding.
//!
//! The smart account implements ERC-7579. A single call is expressed as
//! `execute(mode, executionCalldata)` with the all-zero mode (single call,
//! default exec type) and `executionCalldata = target ‖ value ‖ data`, packed
//! without padding.

use alloy_primitives::{Bytes, B256};
use alloy_sol_types::{sol, SolCall};
use pqaa_types::Intent;

sol! {
	/// ERC-7579 execution entry point of the smart account.
	interface IERC7579Account {
		function execute(bytes32 mode, bytes executionCalldata) external payable;
	}

	/// Nonce store of the EntryPoint v0.7.
	interface IEntryPoint {
		function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
	}
}

/// Execution mode for a single call with revert-on-failure semantics.
pub const SINGLE_CALL_MODE: B256 = B256::ZERO;

/// `target (20) ‖ value (32, big-endian) ‖ data`.
pub fn encode_single_execution(intent: &Intent) -> Bytes {
	let mut out = Vec::with_capacity(20 + 32 + intent.data.len());
	out.extend_from_slice(intent.destination.as_slice());
	out.extend_from_slice(&intent.value.to_be_bytes::<32>());
	out.extend_from_slice(&intent.data);
	out.into()
}

/// Full account call data for an intent.
pub fn encode_execute_call(intent: &Intent) -> Bytes {
	IERC7579Account::executeCall {
		mode: SINGLE_CALL_MODE,
		executionCalldata: encode_single_execution(intent),
	}
	.abi_encode()
	.into()
}
