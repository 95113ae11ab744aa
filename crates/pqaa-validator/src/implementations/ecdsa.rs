//! secp256k1 ECDSA verifier.
//!
//! The installed "public key" is the signer's 20-byte address; a signature
//! is valid when the address recovered from the prehash matches it.

use crate::{ValidatorError, Verifier};
use alloy_primitives::{PrimitiveSignature, B256};
use pqaa_types::SignerKind;

const ADDRESS_LEN: usize = 20;

/// Verifies 65-byte recoverable signatures against an installed address.
#[derive(Debug, Default, Clone, Copy)]
pub struct EcdsaVerifier;

impl Verifier for EcdsaVerifier {
	fn kind(&self) -> SignerKind {
		SignerKind::Classical
	}

	fn check_public_key(&self, public_key: &[u8]) -> Result<(), ValidatorError> {
		if public_key.len() != ADDRESS_LEN {
			return Err(ValidatorError::InvalidPublicKey(format!(
				"expected a 20-byte address, got {} bytes",
				public_key.len()
			)));
		}
		Ok(())
	}

	fn verify(&self, public_key: &[u8], hash: &B256, signature: &[u8]) -> bool {
		if public_key.len() != ADDRESS_LEN {
			return false;
		}
		let Ok(signature) = PrimitiveSignature::try_from(signature) else {
			return false;
		};
		match signature.recover_address_from_prehash(hash) {
			Ok(recovered) => recovered.as_slice() == public_key,
			Err(_) => false,
		}
	}
}
