//! Gas policy and 128-bit pair packing.
//!
//! EntryPoint v0.7 packs two gas values into one 32-byte word with the first
//! value in the high 16 bytes: `accountGasLimits = verificationGasLimit ‖
//! callGasLimit` and `gasFees = maxPriorityFeePerGas ‖ maxFeePerGas`.

use crate::OperationError;
use alloy_primitives::{B256, U256};

/// Width of a packed pair.
pub const PACKED_PAIR_LEN: usize = 32;

/// Packs two 128-bit values, `high` first.
pub fn pack_u128_pair(high: u128, low: u128) -> B256 {
	let mut word = [0u8; PACKED_PAIR_LEN];
	word[..16].copy_from_slice(&high.to_be_bytes());
	word[16..].copy_from_slice(&low.to_be_bytes());
	B256::from(word)
}

/// Splits a packed pair into `(high, low)`.
///
/// Anything other than exactly 32 bytes is rejected.
pub fn unpack_u128_pair(word: &[u8]) -> Result<(u128, u128), OperationError> {
	let word: &[u8; PACKED_PAIR_LEN] = word
		.try_into()
		.map_err(|_| OperationError::InvalidPackedWidth(word.len()))?;

	let mut high = [0u8; 16];
	let mut low = [0u8; 16];
	high.copy_from_slice(&word[..16]);
	low.copy_from_slice(&word[16..]);
	Ok((u128::from_be_bytes(high), u128::from_be_bytes(low)))
}

/// Gas values applied to every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPolicy {
	pub verification_gas_limit: u128,
	pub call_gas_limit: u128,
	pub pre_verification_gas: u128,
	pub max_priority_fee_per_gas: u128,
	pub max_fee_per_gas: u128,
}

impl Default for GasPolicy {
	fn default() -> Self {
		Self {
			verification_gas_limit: 5_000_000,
			call_gas_limit: 200_000,
			pre_verification_gas: 500_000,
			max_priority_fee_per_gas: 1_000_000_000,
			max_fee_per_gas: 2_000_000_000,
		}
	}
}

impl GasPolicy {
	pub fn account_gas_limits(&self) -> B256 {
		pack_u128_pair(self.verification_gas_limit, self.call_gas_limit)
	}

	pub fn gas_fees(&self) -> B256 {
		pack_u128_pair(self.max_priority_fee_per_gas, self.max_fee_per_gas)
	}

	pub fn pre_verification_gas(&self) -> U256 {
		U256::from(self.pre_verification_gas)
	}
}
