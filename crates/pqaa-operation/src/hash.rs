//! Canonical operation hash, as the EntryPoint v0.7 computes it.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::SolValue;
use pqaa_types::PackedUserOperation;

/// ABI encoding of every field except the signature, with the dynamic
/// fields replaced by their keccak256.
pub fn pack_for_hash(op: &PackedUserOperation) -> Vec<u8> {
	(
		op.sender,
		op.nonce,
		keccak256(&op.init_code),
		keccak256(&op.call_data),
		op.account_gas_limits,
		op.pre_verification_gas,
		op.gas_fees,
		keccak256(&op.paymaster_and_data),
	)
		.abi_encode()
}

/// `keccak256(abi.encode(keccak256(pack(op)), entryPoint, chainId))`.
///
/// The signature field does not contribute.
pub fn compute_user_op_hash(op: &PackedUserOperation, entry_point: Address, chain_id: u64) -> B256 {
	let packed_hash = keccak256(pack_for_hash(op));
	keccak256((packed_hash, entry_point, U256::from(chain_id)).abi_encode())
}
