//! ERC-4337 v0.7 operation records.
//!
//! Two shapes of the same operation exist. [`PackedUserOperation`] is what the
//! EntryPoint hashes and what validators see on-chain: gas values are packed in
//! pairs into 32-byte words. [`RelayUserOperation`] is what bundlers accept over
//! JSON-RPC: every gas value is a separate hex quantity and the optional
//! factory/paymaster fields are split out.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// The canonical packed user operation (EntryPoint v0.7 `PackedUserOperation`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackedUserOperation {
	pub sender: Address,
	pub nonce: U256,
	pub init_code: Bytes,
	pub call_data: Bytes,
	/// `verificationGasLimit (16 bytes) ‖ callGasLimit (16 bytes)`.
	pub account_gas_limits: B256,
	pub pre_verification_gas: U256,
	/// `maxPriorityFeePerGas (16 bytes) ‖ maxFeePerGas (16 bytes)`.
	pub gas_fees: B256,
	pub paymaster_and_data: Bytes,
	pub signature: Bytes,
}

/// An operation that has been built and hashed but not yet signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedOperation {
	/// The operation record; its signature field is empty.
	pub operation: PackedUserOperation,
	/// The hash the EntryPoint will compute for this operation.
	pub hash: B256,
	/// Chain the hash is bound to.
	pub chain_id: u64,
	/// EntryPoint the hash is bound to.
	pub entry_point: Address,
}

/// The unpacked operation shape accepted by `eth_sendUserOperation`.
///
/// All numeric fields are minimal hex quantities ("0x0" for zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayUserOperation {
	pub sender: String,
	pub nonce: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub factory: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub factory_data: Option<String>,
	pub call_data: String,
	pub call_gas_limit: String,
	pub verification_gas_limit: String,
	pub pre_verification_gas: String,
	pub max_fee_per_gas: String,
	pub max_priority_fee_per_gas: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub paymaster: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub paymaster_verification_gas_limit: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub paymaster_post_op_gas_limit: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub paymaster_data: Option<String>,
	pub signature: String,
}
