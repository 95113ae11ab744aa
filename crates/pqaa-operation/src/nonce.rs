//! Nonce key layout and the nonce authority.
//!
//! EntryPoint v0.7 nonces are `key (192 bits) ‖ sequence (64 bits)`, with an
//! independent sequence per key. The signer kind's discriminant byte sits in
//! the key at a configured bit position, so each signer family has its own
//! nonce namespace and validators can route on the nonce alone.

use crate::OperationError;
use alloy_primitives::{aliases::U192, Address, U256};
use async_trait::async_trait;
use pqaa_types::SignerKind;

/// Width of the nonce key in bits.
pub const NONCE_KEY_BITS: u32 = 192;
/// Width of the per-key sequence in bits.
pub const SEQUENCE_BITS: usize = 64;

/// Where the discriminant (and optionally the validator) sit in the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceKeyLayout {
	discriminant_shift: u32,
	validator: Option<Address>,
}

impl Default for NonceKeyLayout {
	fn default() -> Self {
		Self {
			discriminant_shift: NONCE_KEY_BITS - 8,
			validator: None,
		}
	}
}

impl NonceKeyLayout {
	pub fn new(discriminant_shift: u32) -> Result<Self, OperationError> {
		if discriminant_shift > NONCE_KEY_BITS - 8 {
			return Err(OperationError::InvalidNonceLayout(format!(
				"discriminant shift {} exceeds {}",
				discriminant_shift,
				NONCE_KEY_BITS - 8
			)));
		}
		Ok(Self {
			discriminant_shift,
			validator: None,
		})
	}

	/// Embeds `validator` in the low 160 bits of every key.
	pub fn with_validator(mut self, validator: Address) -> Result<Self, OperationError> {
		if self.discriminant_shift < 160 {
			return Err(OperationError::InvalidNonceLayout(format!(
				"discriminant shift {} overlaps the validator address",
				self.discriminant_shift
			)));
		}
		self.validator = Some(validator);
		Ok(self)
	}

	pub fn discriminant_shift(&self) -> u32 {
		self.discriminant_shift
	}

	/// Key of the nonce namespace for `kind`.
	pub fn key(&self, kind: SignerKind) -> U192 {
		let mut key = U192::from(kind.discriminant()) << (self.discriminant_shift as usize);
		if let Some(validator) = self.validator {
			key |= U192::from_be_slice(validator.as_slice());
		}
		key
	}

	/// Discriminant byte carried by a full 256-bit nonce.
	pub fn discriminant(&self, nonce: U256) -> u8 {
		let shifted = nonce >> (SEQUENCE_BITS + self.discriminant_shift as usize);
		shifted.as_limbs()[0] as u8
	}

	/// Signer kind a nonce belongs to, if the discriminant is known.
	pub fn kind_of(&self, nonce: U256) -> Option<SignerKind> {
		SignerKind::from_discriminant(self.discriminant(nonce))
	}
}

/// Splits a nonce into its key and sequence.
pub fn split_nonce(nonce: U256) -> (U192, u64) {
	let limbs = nonce.as_limbs();
	(U192::from_limbs([limbs[1], limbs[2], limbs[3]]), limbs[0])
}

/// Builds a nonce from key and sequence.
pub fn join_nonce(key: U192, sequence: u64) -> U256 {
	let limbs = key.as_limbs();
	U256::from_limbs([sequence, limbs[0], limbs[1], limbs[2]])
}

/// The validating authority's nonce store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NonceSource: Send + Sync {
	/// Current nonce of `sender` in the namespace `key`.
	async fn get_nonce(&self, sender: Address, key: U192) -> Result<U256, OperationError>;
}
