//! Operation construction and hashing.
//!
//! Turns an intent into an ERC-4337 v0.7 packed operation bound to one
//! account, one EntryPoint and one chain, and computes the hash the
//! EntryPoint (and the routing validator) will compute for it. The nonce is
//! read from the validating authority in the namespace of the active signer
//! kind; everything else is derived locally and deterministically.

use alloy_primitives::{Address, Bytes, U256};
use pqaa_types::{truncate_id, Intent, PackedUserOperation, SignerKind, UnsignedOperation};
use std::sync::Arc;
use thiserror::Error;

pub mod call_data;
pub mod gas;
pub mod hash;
pub mod nonce;
pub mod relay_format;

/// Re-export implementations
pub mod implementations {
	pub mod entry_point;
}

pub use gas::{pack_u128_pair, unpack_u128_pair, GasPolicy};
pub use hash::compute_user_op_hash;
pub use nonce::{NonceKeyLayout, NonceSource};
pub use relay_format::to_relay_format;

#[cfg(test)]
pub use nonce::MockNonceSource;

/// Errors that can occur while building an operation.
#[derive(Debug, Error)]
pub enum OperationError {
	/// The authority's nonce store could not be read.
	#[error("Nonce query failed: {0}")]
	NonceQueryFailed(String),
	/// A packed gas pair was not 32 bytes.
	#[error("Invalid packed width: expected 32 bytes, got {0}")]
	InvalidPackedWidth(usize),
	/// Finalization was attempted with an empty signature.
	#[error("Signature must not be empty")]
	EmptySignature,
	/// The nonce key layout cannot hold the configured fields.
	#[error("Invalid nonce layout: {0}")]
	InvalidNonceLayout(String),
	/// `initCode` is shorter than a factory address.
	#[error("Invalid initCode length: {0}")]
	InvalidInitCode(usize),
	/// `paymasterAndData` is shorter than its static prefix.
	#[error("Invalid paymasterAndData length: {0}")]
	InvalidPaymasterData(usize),
}

/// Builds unsigned operations for one account on one chain.
pub struct OperationBuilder {
	nonce_source: Arc<dyn NonceSource>,
	layout: NonceKeyLayout,
	gas: GasPolicy,
	entry_point: Address,
	chain_id: u64,
}

impl OperationBuilder {
	pub fn new(
		nonce_source: Arc<dyn NonceSource>,
		layout: NonceKeyLayout,
		gas: GasPolicy,
		entry_point: Address,
		chain_id: u64,
	) -> Self {
		Self {
			nonce_source,
			layout,
			gas,
			entry_point,
			chain_id,
		}
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	pub fn entry_point(&self) -> Address {
		self.entry_point
	}

	pub fn layout(&self) -> &NonceKeyLayout {
		&self.layout
	}

	/// Builds and hashes the operation for `intent`.
	///
	/// The only suspension point is the nonce query, and its failure is the
	/// only error.
	pub async fn build_unsigned(
		&self,
		intent: &Intent,
		account: Address,
		kind: SignerKind,
	) -> Result<UnsignedOperation, OperationError> {
		let call_data = call_data::encode_execute_call(intent);
		let key = self.layout.key(kind);
		let nonce = self.nonce_source.get_nonce(account, key).await?;

		let operation = PackedUserOperation {
			sender: account,
			nonce,
			init_code: Bytes::new(),
			call_data,
			account_gas_limits: self.gas.account_gas_limits(),
			pre_verification_gas: U256::from(self.gas.pre_verification_gas),
			gas_fees: self.gas.gas_fees(),
			paymaster_and_data: Bytes::new(),
			signature: Bytes::new(),
		};
		let hash = compute_user_op_hash(&operation, self.entry_point, self.chain_id);

		tracing::debug!(
			op_hash = %truncate_id(&hash.to_string()),
			signer_kind = %kind,
			"Built unsigned operation"
		);

		Ok(UnsignedOperation {
			operation,
			hash,
			chain_id: self.chain_id,
			entry_point: self.entry_point,
		})
	}
}

/// Attaches a signature to a built operation.
pub fn finalize(
	unsigned: UnsignedOperation,
	signature: Bytes,
) -> Result<PackedUserOperation, OperationError> {
	if signature.is_empty() {
		return Err(OperationError::EmptySignature);
	}
	let mut operation = unsigned.operation;
	operation.signature = signature;
	Ok(operation)
}
