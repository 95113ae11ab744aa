//! Subcommand implementations.

use alloy_primitives::{aliases::U192, Address, B256, U256};
use async_trait::async_trait;
use pqaa_config::Config;
use pqaa_core::builder::{gas_policy, nonce_layout};
use pqaa_operation::nonce::join_nonce;
use pqaa_operation::{to_relay_format, NonceSource, OperationBuilder, OperationError};
use pqaa_signer::implementations::seed::{generate_seed, SeedScheme, SeedSigner};
use pqaa_signer::SignerInterface;
use pqaa_types::{decode_fixed, encode_hex, Intent, RelayUserOperation};
use pqaa_validator::{EcdsaVerifier, MlDsaVerifier, Verifier};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use zeroize::Zeroizing;

pub const SEED_FILE: &str = "sk.bin";
pub const PUBLIC_KEY_FILE: &str = "pk.bin";

#[derive(Debug, Error)]
pub enum CommandError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Invalid input: {0}")]
	InvalidInput(String),
	#[error("Invalid signature")]
	InvalidSignature,
	#[error("{0}")]
	Pipeline(String),
}

fn parse_hash(hash: &str) -> Result<B256, CommandError> {
	decode_fixed::<32>(hash)
		.map(B256::from)
		.map_err(|e| CommandError::InvalidInput(format!("hash: {}", e)))
}

pub fn read_seed(path: &Path) -> Result<Zeroizing<String>, CommandError> {
	let bytes = Zeroizing::new(std::fs::read(path)?);
	if bytes.len() != 32 {
		return Err(CommandError::InvalidInput(format!(
			"seed must be exactly 32 bytes, got {}",
			bytes.len()
		)));
	}
	Ok(Zeroizing::new(encode_hex(bytes.as_slice())))
}

/// Files written by [`keygen`].
#[derive(Debug)]
pub struct KeyFiles {
	pub seed: PathBuf,
	pub public_key: PathBuf,
	pub public_key_len: usize,
}

/// Generates a fresh seed and writes it with the derived public key.
pub async fn keygen(scheme: SeedScheme, output: &Path) -> Result<KeyFiles, CommandError> {
	std::fs::create_dir_all(output)?;

	let seed = generate_seed();
	let seed_hex = Zeroizing::new(encode_hex(seed.as_slice()));
	let signer = SeedSigner::from_seed_hex(scheme, &seed_hex)
		.map_err(|e| CommandError::Pipeline(e.to_string()))?;
	let public_key = signer
		.public_key()
		.await
		.map_err(|e| CommandError::Pipeline(e.to_string()))?;

	let files = KeyFiles {
		seed: output.join(SEED_FILE),
		public_key: output.join(PUBLIC_KEY_FILE),
		public_key_len: public_key.len(),
	};
	std::fs::write(&files.seed, seed.as_slice())?;
	std::fs::write(&files.public_key, &public_key)?;
	Ok(files)
}

/// Signs a 32-byte hash with a seed file and writes the raw signature.
pub async fn sign(
	scheme: SeedScheme,
	key: &Path,
	hash: &str,
	output: &Path,
) -> Result<usize, CommandError> {
	let hash = parse_hash(hash)?;
	let seed_hex = read_seed(key)?;
	let signer = SeedSigner::from_seed_hex(scheme, &seed_hex)
		.map_err(|e| CommandError::Pipeline(e.to_string()))?;
	let signature = signer
		.sign(hash.as_slice(), 0)
		.await
		.map_err(|e| CommandError::Pipeline(e.to_string()))?;
	std::fs::write(output, &signature)?;
	Ok(signature.len())
}

/// Verifies a raw signature file against a public key file.
pub fn verify(scheme: SeedScheme, key: &Path, hash: &str, sig: &Path) -> Result<(), CommandError> {
	let hash = parse_hash(hash)?;
	let public_key = std::fs::read(key)?;
	let signature = std::fs::read(sig)?;

	let verifier: Box<dyn Verifier> = match scheme {
		SeedScheme::MlDsa65 => Box::new(MlDsaVerifier),
		SeedScheme::Ecdsa => Box::new(EcdsaVerifier),
	};
	verifier
		.check_public_key(&public_key)
		.map_err(|e| CommandError::InvalidInput(e.to_string()))?;
	if verifier.verify(&public_key, &hash, &signature) {
		Ok(())
	} else {
		Err(CommandError::InvalidSignature)
	}
}

/// Nonce source that answers with a fixed sequence, for offline hashing.
struct FixedSequence(u64);

#[async_trait]
impl NonceSource for FixedSequence {
	async fn get_nonce(&self, _sender: Address, key: U192) -> Result<U256, OperationError> {
		Ok(join_nonce(key, self.0))
	}
}

/// Result of [`hash`].
#[derive(Debug)]
pub struct HashedOperation {
	pub hash: B256,
	pub operation: RelayUserOperation,
}

/// Builds and hashes the operation for an intent without contacting any node.
pub async fn hash(
	config: &Config,
	intent: &Intent,
	scheme: SeedScheme,
	sequence: u64,
) -> Result<HashedOperation, CommandError> {
	let layout = nonce_layout(config).map_err(|e| CommandError::InvalidInput(e.to_string()))?;
	let builder = OperationBuilder::new(
		Arc::new(FixedSequence(sequence)),
		layout,
		gas_policy(config),
		config.contracts.entry_point,
		config.network.chain_id,
	);
	let unsigned = builder
		.build_unsigned(intent, config.account.address, scheme.kind())
		.await
		.map_err(|e| CommandError::Pipeline(e.to_string()))?;
	let operation =
		to_relay_format(&unsigned.operation).map_err(|e| CommandError::Pipeline(e.to_string()))?;
	Ok(HashedOperation {
		hash: unsigned.hash,
		operation,
	})
}

pub fn hashed_to_json(hashed: &HashedOperation) -> serde_json::Value {
	json!({
		"hash": hashed.hash,
		"operation": hashed.operation,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, b256};
	use pqaa_config::builders::ConfigBuilder;

	#[tokio::test]
	async fn test_hash_matches_reference_value() {
		let config = ConfigBuilder::new().build();
		let intent = Intent::transfer(
			address!("1111111111111111111111111111111111111111"),
			U256::from(1_000_000_000_000_000u64),
		);

		let hashed = hash(&config, &intent, SeedScheme::MlDsa65, 0).await.unwrap();
		assert_eq!(
			hashed.hash,
			b256!("212f8b8fc5aaf75eec7c431faca6dd686e9669abff65b3f7720c1a5525e75ba9")
		);
		assert_eq!(hashed.operation.signature, "0x");

		let classical = hash(&config, &intent, SeedScheme::Ecdsa, 0).await.unwrap();
		assert_eq!(
			classical.hash,
			b256!("2b72bde802661a6a62fd1cbaf3c8ddd98459cd8c5286f4b231ee724ef0cd92a2")
		);
	}

	#[tokio::test]
	async fn test_keygen_sign_verify() {
		let dir = tempfile::tempdir().unwrap();
		let hash_hex = format!("0x{}", "ab".repeat(32));

		for (scheme, pk_len, sig_len) in [
			(SeedScheme::MlDsa65, 1952, 3309),
			(SeedScheme::Ecdsa, 20, 65),
		] {
			let out = dir.path().join(scheme.as_str());
			let files = keygen(scheme, &out).await.unwrap();
			assert_eq!(files.public_key_len, pk_len);
			assert_eq!(std::fs::read(&files.seed).unwrap().len(), 32);

			let sig_path = out.join("sig.bin");
			let written = sign(scheme, &files.seed, &hash_hex, &sig_path).await.unwrap();
			assert_eq!(written, sig_len);
			verify(scheme, &files.public_key, &hash_hex, &sig_path).unwrap();

			let mut signature = std::fs::read(&sig_path).unwrap();
			signature[5] ^= 0x01;
			std::fs::write(&sig_path, &signature).unwrap();
			assert!(matches!(
				verify(scheme, &files.public_key, &hash_hex, &sig_path),
				Err(CommandError::InvalidSignature)
			));
		}
	}

	#[tokio::test]
	async fn test_sign_rejects_bad_inputs() {
		let dir = tempfile::tempdir().unwrap();
		let key = dir.path().join("short.bin");
		std::fs::write(&key, [1u8; 16]).unwrap();
		let out = dir.path().join("sig.bin");

		let err = sign(SeedScheme::Ecdsa, &key, &format!("0x{}", "00".repeat(32)), &out)
			.await
			.unwrap_err();
		assert!(matches!(err, CommandError::InvalidInput(ref m) if m.contains("32 bytes")));

		let err = sign(SeedScheme::Ecdsa, &key, "0x1234", &out).await.unwrap_err();
		assert!(matches!(err, CommandError::InvalidInput(ref m) if m.starts_with("hash")));
	}
}
