//! ML-DSA-65 verifier.

use crate::{ValidatorError, Verifier};
use alloy_primitives::B256;
use ml_dsa::{signature::Verifier as _, MlDsa65, Signature, VerifyingKey};
use pqaa_types::SignerKind;

/// Encoded ML-DSA-65 verifying key length.
pub const PUBLIC_KEY_LEN: usize = 1952;

/// Verifies ML-DSA-65 signatures over the raw 32-byte hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct MlDsaVerifier;

impl Verifier for MlDsaVerifier {
	fn kind(&self) -> SignerKind {
		SignerKind::PostQuantum
	}

	fn check_public_key(&self, public_key: &[u8]) -> Result<(), ValidatorError> {
		if public_key.len() != PUBLIC_KEY_LEN {
			return Err(ValidatorError::InvalidPublicKey(format!(
				"expected {} bytes, got {}",
				PUBLIC_KEY_LEN,
				public_key.len()
			)));
		}
		Ok(())
	}

	fn verify(&self, public_key: &[u8], hash: &B256, signature: &[u8]) -> bool {
		let Ok(pk_arr) = <[u8; PUBLIC_KEY_LEN]>::try_from(public_key) else {
			return false;
		};
		let Ok(signature) = Signature::<MlDsa65>::try_from(signature) else {
			return false;
		};
		let verifying_key = VerifyingKey::<MlDsa65>::decode(&pk_arr.into());
		verifying_key.verify(hash.as_slice(), &signature).is_ok()
	}
}
