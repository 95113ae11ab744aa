//! Conversion to the bundler's unpacked operation shape.
//!
//! This is the only place that knows how bundlers want operations spelled:
//! packed pairs are split, optional factory and paymaster fields are broken
//! out, and every numeric value becomes a minimal hex quantity.

use crate::gas::unpack_u128_pair;
use crate::OperationError;
use alloy_primitives::U256;
use pqaa_types::{encode_hex, PackedUserOperation, RelayUserOperation};

const ADDRESS_LEN: usize = 20;
/// `paymaster (20) ‖ verificationGasLimit (16) ‖ postOpGasLimit (16)`.
const PAYMASTER_STATIC_LEN: usize = ADDRESS_LEN + 16 + 16;

/// Minimal big-endian hex quantity, `"0x0"` for zero.
pub fn quantity(be_bytes: &[u8]) -> String {
	let digits = hex::encode(be_bytes);
	let trimmed = digits.trim_start_matches('0');
	if trimmed.is_empty() {
		"0x0".to_string()
	} else {
		format!("0x{}", trimmed)
	}
}

pub fn quantity_u128(value: u128) -> String {
	quantity(&value.to_be_bytes())
}

pub fn quantity_u256(value: U256) -> String {
	quantity(&value.to_be_bytes::<32>())
}

fn u128_at(bytes: &[u8]) -> u128 {
	let mut buf = [0u8; 16];
	buf.copy_from_slice(bytes);
	u128::from_be_bytes(buf)
}

/// Converts a packed operation into the relay's shape.
pub fn to_relay_format(op: &PackedUserOperation) -> Result<RelayUserOperation, OperationError> {
	let (verification_gas_limit, call_gas_limit) =
		unpack_u128_pair(op.account_gas_limits.as_slice())?;
	let (max_priority_fee_per_gas, max_fee_per_gas) = unpack_u128_pair(op.gas_fees.as_slice())?;

	let (factory, factory_data) = if op.init_code.is_empty() {
		(None, None)
	} else {
		if op.init_code.len() < ADDRESS_LEN {
			return Err(OperationError::InvalidInitCode(op.init_code.len()));
		}
		let (factory, data) = op.init_code.split_at(ADDRESS_LEN);
		(Some(encode_hex(factory)), Some(encode_hex(data)))
	};

	let mut relay = RelayUserOperation {
		sender: op.sender.to_checksum(None),
		nonce: quantity_u256(op.nonce),
		factory,
		factory_data,
		call_data: encode_hex(&op.call_data),
		call_gas_limit: quantity_u128(call_gas_limit),
		verification_gas_limit: quantity_u128(verification_gas_limit),
		pre_verification_gas: quantity_u256(op.pre_verification_gas),
		max_fee_per_gas: quantity_u128(max_fee_per_gas),
		max_priority_fee_per_gas: quantity_u128(max_priority_fee_per_gas),
		paymaster: None,
		paymaster_verification_gas_limit: None,
		paymaster_post_op_gas_limit: None,
		paymaster_data: None,
		signature: encode_hex(&op.signature),
	};

	if !op.paymaster_and_data.is_empty() {
		let pm = op.paymaster_and_data.as_ref();
		if pm.len() < PAYMASTER_STATIC_LEN {
			return Err(OperationError::InvalidPaymasterData(pm.len()));
		}
		relay.paymaster = Some(encode_hex(&pm[..ADDRESS_LEN]));
		relay.paymaster_verification_gas_limit =
			Some(quantity_u128(u128_at(&pm[ADDRESS_LEN..ADDRESS_LEN + 16])));
		relay.paymaster_post_op_gas_limit =
			Some(quantity_u128(u128_at(&pm[ADDRESS_LEN + 16..PAYMASTER_STATIC_LEN])));
		relay.paymaster_data = Some(encode_hex(&pm[PAYMASTER_STATIC_LEN..]));
	}

	Ok(relay)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gas::{pack_u128_pair, GasPolicy};
	use alloy_primitives::{address, Bytes, B256};

	fn op() -> PackedUserOperation {
		let policy = GasPolicy::default();
		PackedUserOperation {
			sender: address!("3333333333333333333333333333333333333333"),
			nonce: U256::from(1u8) << 248,
			init_code: Bytes::new(),
			call_data: Bytes::from(vec![0xe9, 0xae, 0x5c, 0x53]),
			account_gas_limits: policy.account_gas_limits(),
			pre_verification_gas: policy.pre_verification_gas(),
			gas_fees: policy.gas_fees(),
			paymaster_and_data: Bytes::new(),
			signature: Bytes::from(vec![0xaa; 65]),
		}
	}

	#[test]
	fn test_quantities_are_minimal() {
		assert_eq!(quantity_u128(0), "0x0");
		assert_eq!(quantity_u128(1), "0x1");
		assert_eq!(quantity_u128(0x100), "0x100");
		assert_eq!(quantity_u256(U256::ZERO), "0x0");
		assert_eq!(quantity(&[]), "0x0");
	}

	#[test]
	fn test_relay_format_splits_pairs() {
		let relay = to_relay_format(&op()).unwrap();

		assert_eq!(relay.sender, "0x3333333333333333333333333333333333333333");
		assert_eq!(relay.nonce, format!("0x1{}", "0".repeat(62)));
		assert_eq!(relay.verification_gas_limit, "0x4c4b40");
		assert_eq!(relay.call_gas_limit, "0x30d40");
		assert_eq!(relay.pre_verification_gas, "0x7a120");
		assert_eq!(relay.max_priority_fee_per_gas, "0x3b9aca00");
		assert_eq!(relay.max_fee_per_gas, "0x77359400");
		assert_eq!(relay.call_data, "0xe9ae5c53");
		assert!(relay.factory.is_none());
		assert!(relay.paymaster.is_none());
		assert_eq!(relay.signature.len(), 2 + 130);
	}

	#[test]
	fn test_zero_gas_renders_as_zero_quantity() {
		let mut op = op();
		op.account_gas_limits = B256::ZERO;
		op.gas_fees = pack_u128_pair(0, 7);

		let relay = to_relay_format(&op).unwrap();
		assert_eq!(relay.verification_gas_limit, "0x0");
		assert_eq!(relay.call_gas_limit, "0x0");
		assert_eq!(relay.max_priority_fee_per_gas, "0x0");
		assert_eq!(relay.max_fee_per_gas, "0x7");
	}

	#[test]
	fn test_factory_and_paymaster_split() {
		let mut op = op();
		let mut init_code = vec![0x55; 20];
		init_code.extend_from_slice(&[0x01, 0x02]);
		op.init_code = init_code.into();

		let mut pm = vec![0x66; 20];
		pm.extend_from_slice(&100_000u128.to_be_bytes());
		pm.extend_from_slice(&0u128.to_be_bytes());
		pm.extend_from_slice(&[0xde, 0xad]);
		op.paymaster_and_data = pm.into();

		let relay = to_relay_format(&op).unwrap();
		assert_eq!(relay.factory.as_deref(), Some(format!("0x{}", "55".repeat(20)).as_str()));
		assert_eq!(relay.factory_data.as_deref(), Some("0x0102"));
		assert_eq!(relay.paymaster_verification_gas_limit.as_deref(), Some("0x186a0"));
		assert_eq!(relay.paymaster_post_op_gas_limit.as_deref(), Some("0x0"));
		assert_eq!(relay.paymaster_data.as_deref(), Some("0xdead"));
	}

	#[test]
	fn test_truncated_paymaster_rejected() {
		let mut op = op();
		op.paymaster_and_data = Bytes::from(vec![0x66; 30]);
		assert!(matches!(
			to_relay_format(&op),
			Err(OperationError::InvalidPaymasterData(30))
		));
	}
}
