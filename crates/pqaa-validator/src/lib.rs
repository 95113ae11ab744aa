//! Routing validator model.
//!
//! Mirrors the on-chain module that accepts or rejects operations for an
//! account: it routes on the nonce-key discriminant, looks up the public key
//! the account installed for that signer kind and hands the operation hash to
//! an opaque [`Verifier`]. A sender-bound entry point re-hashes the digest
//! together with the validator, chain, account and caller so a signature
//! cannot be replayed into another context.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;
use dashmap::DashMap;
use pqaa_operation::NonceKeyLayout;
use pqaa_types::{PackedUserOperation, SignerKind};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod ecdsa;
	pub mod ml_dsa;
}

pub use implementations::ecdsa::EcdsaVerifier;
pub use implementations::ml_dsa::MlDsaVerifier;

/// Validation data for an accepted operation.
pub const SIG_VALIDATION_SUCCESS: U256 = U256::ZERO;
/// Validation data for a rejected operation.
pub const SIG_VALIDATION_FAILED: U256 = U256::from_limbs([1, 0, 0, 0]);
/// ERC-1271 magic value for a valid signature.
pub const ERC1271_MAGIC_VALUE: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];
/// ERC-1271 value for an invalid signature.
pub const ERC1271_INVALID: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

#[derive(Debug, Error)]
pub enum ValidatorError {
	#[error("Invalid public key: {0}")]
	InvalidPublicKey(String),
	#[error("No verifier registered for {0}")]
	NoVerifier(SignerKind),
}

/// Signature verification capability for one signer kind.
///
/// `verify` answers `false` for any malformed input and never panics.
pub trait Verifier: Send + Sync {
	fn kind(&self) -> SignerKind;

	/// Rejects keys that can never verify anything.
	fn check_public_key(&self, public_key: &[u8]) -> Result<(), ValidatorError>;

	fn verify(&self, public_key: &[u8], hash: &B256, signature: &[u8]) -> bool;
}

/// Per-account key registry plus the verifier for each signer kind.
pub struct RoutingValidator {
	address: Address,
	chain_id: u64,
	layout: NonceKeyLayout,
	keys: DashMap<(Address, SignerKind), Bytes>,
	verifiers: HashMap<SignerKind, Arc<dyn Verifier>>,
}

impl RoutingValidator {
	/// Creates a validator with the ML-DSA-65 and ECDSA verifiers registered.
	pub fn new(address: Address, chain_id: u64, layout: NonceKeyLayout) -> Self {
		let mut verifiers: HashMap<SignerKind, Arc<dyn Verifier>> = HashMap::new();
		verifiers.insert(SignerKind::PostQuantum, Arc::new(MlDsaVerifier));
		verifiers.insert(SignerKind::Classical, Arc::new(EcdsaVerifier));
		Self {
			address,
			chain_id,
			layout,
			keys: DashMap::new(),
			verifiers,
		}
	}

	/// Replaces the verifier for its kind.
	pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
		self.verifiers.insert(verifier.kind(), verifier);
		self
	}

	pub fn address(&self) -> Address {
		self.address
	}

	fn verifier(&self, kind: SignerKind) -> Result<&Arc<dyn Verifier>, ValidatorError> {
		self.verifiers
			.get(&kind)
			.ok_or(ValidatorError::NoVerifier(kind))
	}

	/// Installs (or replaces) the public key `account` uses for `kind`.
	pub fn install(
		&self,
		account: Address,
		kind: SignerKind,
		public_key: Bytes,
	) -> Result<(), ValidatorError> {
		self.verifier(kind)?.check_public_key(&public_key)?;
		self.keys.insert((account, kind), public_key);
		tracing::debug!(%account, signer_kind = %kind, "Installed validator key");
		Ok(())
	}

	/// Removes a key; returns whether one was installed.
	pub fn uninstall(&self, account: Address, kind: SignerKind) -> bool {
		self.keys.remove(&(account, kind)).is_some()
	}

	pub fn public_key(&self, account: Address, kind: SignerKind) -> Option<Bytes> {
		self.keys.get(&(account, kind)).map(|key| key.value().clone())
	}

	fn check(&self, account: Address, kind: SignerKind, hash: &B256, signature: &[u8]) -> bool {
		let Some(public_key) = self.public_key(account, kind) else {
			tracing::debug!(%account, signer_kind = %kind, "No key installed");
			return false;
		};
		match self.verifier(kind) {
			Ok(verifier) => verifier.verify(&public_key, hash, signature),
			Err(_) => false,
		}
	}

	/// Validates an operation against its hash.
	///
	/// Returns [`SIG_VALIDATION_SUCCESS`] or [`SIG_VALIDATION_FAILED`]; an
	/// unknown discriminant or a missing key is a failure, never an error.
	pub fn validate_user_op(&self, op: &PackedUserOperation, op_hash: &B256) -> U256 {
		let Some(kind) = self.layout.kind_of(op.nonce) else {
			return SIG_VALIDATION_FAILED;
		};
		if self.check(op.sender, kind, op_hash, &op.signature) {
			SIG_VALIDATION_SUCCESS
		} else {
			SIG_VALIDATION_FAILED
		}
	}

	/// `keccak256(abi.encode(validator, chainId, account, caller, hash))`.
	pub fn sender_bound_hash(&self, account: Address, caller: Address, hash: &B256) -> B256 {
		keccak256(
			(
				self.address,
				U256::from(self.chain_id),
				account,
				caller,
				*hash,
			)
				.abi_encode(),
		)
	}

	/// ERC-1271 check for a signature bound to `caller`.
	///
	/// `data` is the signer kind's discriminant byte followed by a signature
	/// over [`RoutingValidator::sender_bound_hash`].
	pub fn is_valid_signature_with_sender(
		&self,
		account: Address,
		caller: Address,
		hash: &B256,
		data: &[u8],
	) -> [u8; 4] {
		let Some((discriminant, signature)) = data.split_first() else {
			return ERC1271_INVALID;
		};
		let Some(kind) = SignerKind::from_discriminant(*discriminant) else {
			return ERC1271_INVALID;
		};
		let bound = self.sender_bound_hash(account, caller, hash);
		if self.check(account, kind, &bound, signature) {
			ERC1271_MAGIC_VALUE
		} else {
			ERC1271_INVALID
		}
	}
}
