//! In-memory signer derived from a 32-byte seed.
//!
//! The seed deterministically expands into either an ML-DSA-65 key pair or a
//! secp256k1 key. Key material never leaves process memory; seeds are held in
//! zeroizing buffers and the derived key is replaced only through
//! [`SignerInterface::configure`], which takes the write half of a lock that every
//! signing call holds for reading.

use crate::{check_hash, SignerError, SignerInterface};
use alloy_primitives::B256;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use ml_dsa::{signature::Signer as _, KeyGen, KeyPair, MlDsa65};
use pqaa_types::{
	decode_hex, Bytes, ConfigSchema, Field, FieldType, Schema, SecretHex, SignerInfo, SignerKind,
	ValidationError,
};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use zeroize::Zeroizing;

/// Width of a seed in bytes.
pub const SEED_LEN: usize = 32;

/// Key derivation scheme applied to the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedScheme {
	MlDsa65,
	Ecdsa,
}

impl SeedScheme {
	pub fn kind(self) -> SignerKind {
		match self {
			SeedScheme::MlDsa65 => SignerKind::PostQuantum,
			SeedScheme::Ecdsa => SignerKind::Classical,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			SeedScheme::MlDsa65 => "ml-dsa-65",
			SeedScheme::Ecdsa => "ecdsa",
		}
	}

	fn security_level(self) -> &'static str {
		match self {
			SeedScheme::MlDsa65 => "ML-DSA-65",
			SeedScheme::Ecdsa => "secp256k1",
		}
	}
}

impl fmt::Display for SeedScheme {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for SeedScheme {
	type Err = SignerError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"ml-dsa-65" => Ok(SeedScheme::MlDsa65),
			"ecdsa" => Ok(SeedScheme::Ecdsa),
			other => Err(SignerError::InvalidConfiguration(format!(
				"Unknown seed scheme '{}'",
				other
			))),
		}
	}
}

enum KeyMaterial {
	PostQuantum(Box<KeyPair<MlDsa65>>),
	Classical(PrivateKeySigner),
}

impl KeyMaterial {
	fn derive(scheme: SeedScheme, seed: &[u8; SEED_LEN]) -> Result<Self, SignerError> {
		match scheme {
			SeedScheme::MlDsa65 => {
				let key_pair = MlDsa65::from_seed(&(*seed).into());
				Ok(KeyMaterial::PostQuantum(Box::new(key_pair)))
			},
			SeedScheme::Ecdsa => PrivateKeySigner::from_bytes(&B256::from(*seed))
				.map(KeyMaterial::Classical)
				.map_err(|e| SignerError::InvalidSeed(format!("not a valid secp256k1 scalar: {}", e))),
		}
	}
}

/// Copies decoded seed bytes into a fixed buffer, requiring exactly 32 bytes.
fn seed_array(bytes: &[u8]) -> Result<Zeroizing<[u8; SEED_LEN]>, SignerError> {
	if bytes.len() != SEED_LEN {
		return Err(SignerError::InvalidSeed(format!(
			"expected {} bytes, got {}",
			SEED_LEN,
			bytes.len()
		)));
	}
	let mut seed = Zeroizing::new([0u8; SEED_LEN]);
	seed.copy_from_slice(bytes);
	Ok(seed)
}

/// Decodes a hex seed, requiring exactly 32 bytes.
fn decode_seed(seed_hex: &str) -> Result<Zeroizing<[u8; SEED_LEN]>, SignerError> {
	let bytes = Zeroizing::new(
		decode_hex(seed_hex).map_err(|e| SignerError::InvalidSeed(e.to_string()))?,
	);
	seed_array(&bytes)
}

/// Generates a fresh random seed.
pub fn generate_seed() -> Zeroizing<[u8; SEED_LEN]> {
	Zeroizing::new(rand::random::<[u8; SEED_LEN]>())
}

/// Signer holding key material derived from a seed.
pub struct SeedSigner {
	scheme: SeedScheme,
	key: RwLock<Option<KeyMaterial>>,
	signatures: AtomicU64,
}

impl SeedSigner {
	/// Creates an unconfigured signer.
	pub fn new(scheme: SeedScheme) -> Self {
		Self {
			scheme,
			key: RwLock::new(None),
			signatures: AtomicU64::new(0),
		}
	}

	/// Creates a signer that is configured from the start.
	pub fn from_seed_hex(scheme: SeedScheme, seed_hex: &str) -> Result<Self, SignerError> {
		let seed = decode_seed(seed_hex)?;
		Ok(Self {
			scheme,
			key: RwLock::new(Some(KeyMaterial::derive(scheme, &seed)?)),
			signatures: AtomicU64::new(0),
		})
	}

	pub fn scheme(&self) -> SeedScheme {
		self.scheme
	}

	pub async fn is_configured(&self) -> bool {
		self.key.read().await.is_some()
	}
}

/// Configuration schema for the seed signer.
pub struct SeedSignerSchema;

impl SeedSignerSchema {
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		Self.validate(config)
	}
}

impl ConfigSchema for SeedSignerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("scheme", FieldType::OneOf(&["ml-dsa-65", "ecdsa"]))],
			vec![Field::new(
				"seed",
				FieldType::Hex {
					bytes: Some(SEED_LEN),
				},
			)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl SignerInterface for SeedSigner {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(SeedSignerSchema)
	}

	fn kind(&self) -> SignerKind {
		self.scheme.kind()
	}

	async fn is_ready(&self) -> bool {
		self.is_configured().await
	}

	/// Waits for signing calls in flight to finish. On error the previous
	/// key, if any, stays in place.
	async fn configure(&self, seed: &SecretHex) -> Result<(), SignerError> {
		let bytes = seed
			.decode()
			.map_err(|e| SignerError::InvalidSeed(e.to_string()))?;
		let material = KeyMaterial::derive(self.scheme, &*seed_array(&bytes)?)?;

		let mut key = self.key.write().await;
		*key = Some(material);
		self.signatures.store(0, Ordering::Relaxed);
		tracing::info!(scheme = %self.scheme, "Seed signer configured");
		Ok(())
	}

	async fn sign(&self, hash: &[u8], _chain_id: u64) -> Result<Bytes, SignerError> {
		let hash = check_hash(hash)?;
		let key = self.key.read().await;

		let signature = match key.as_ref().ok_or(SignerError::NotConfigured)? {
			KeyMaterial::PostQuantum(key_pair) => {
				let signature = key_pair.signing_key().sign(&hash);
				Bytes::copy_from_slice(&signature.encode()[..])
			},
			KeyMaterial::Classical(signer) => {
				let signature = signer
					.sign_hash_sync(&B256::from(hash))
					.map_err(|e| SignerError::SigningFailed(e.to_string()))?;
				Bytes::copy_from_slice(&signature.as_bytes())
			},
		};

		self.signatures.fetch_add(1, Ordering::Relaxed);
		Ok(signature)
	}

	async fn public_key(&self) -> Result<Bytes, SignerError> {
		let key = self.key.read().await;
		match key.as_ref().ok_or(SignerError::NotConfigured)? {
			KeyMaterial::PostQuantum(key_pair) => Ok(Bytes::copy_from_slice(
				&key_pair.verifying_key().encode()[..],
			)),
			KeyMaterial::Classical(signer) => Ok(Bytes::copy_from_slice(signer.address().as_slice())),
		}
	}

	async fn info(&self) -> Result<SignerInfo, SignerError> {
		Ok(SignerInfo {
			has_key: self.is_configured().await,
			nonce: Some(self.signatures.load(Ordering::Relaxed)),
			security_level: self.scheme.security_level().to_string(),
		})
	}
}

/// Factory function to create a seed signer from configuration.
///
/// Configuration parameters:
/// - `scheme`: "ml-dsa-65" or "ecdsa"
/// - `seed` (optional): 32-byte hex seed, usually `${ENV_VAR}`; without it the
///   signer starts unconfigured
pub fn create_seed_signer(
	config: &toml::Value,
) -> Result<Box<dyn SignerInterface>, SignerError> {
	SeedSignerSchema::validate_config(config)
		.map_err(|e| SignerError::InvalidConfiguration(e.to_string()))?;

	let scheme: SeedScheme = config
		.get("scheme")
		.and_then(|v| v.as_str())
		.ok_or_else(|| SignerError::InvalidConfiguration("scheme is required".into()))?
		.parse()?;

	let signer = match config.get("seed").and_then(|v| v.as_str()) {
		Some(seed) => {
			let seed = SecretHex::from(seed);
			seed.with_exposed(|s| SeedSigner::from_seed_hex(scheme, s))?
		},
		None => SeedSigner::new(scheme),
	};

	Ok(Box::new(signer))
}

/// Registry for the seed signer implementation.
pub struct Registry;

impl pqaa_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "seed";
	type Factory = crate::SignerFactory;

	fn factory() -> Self::Factory {
		create_seed_signer
	}
}

impl crate::SignerRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::PrimitiveSignature;
	use ml_dsa::signature::Verifier;
	use std::sync::Arc;

	const SEED: &str = "0x000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
	const HASH: [u8; 32] = [0xab; 32];

	#[tokio::test]
	async fn test_post_quantum_signature_length() {
		let signer = SeedSigner::from_seed_hex(SeedScheme::MlDsa65, SEED).unwrap();
		let signature = signer.sign(&HASH, 412346).await.unwrap();
		assert_eq!(signature.len(), 3309);
		assert_eq!(signer.public_key().await.unwrap().len(), 1952);
		assert_eq!(signer.kind(), SignerKind::PostQuantum);
	}

	#[tokio::test]
	async fn test_post_quantum_signature_verifies() {
		let signer = SeedSigner::from_seed_hex(SeedScheme::MlDsa65, SEED).unwrap();
		let signature = signer.sign(&HASH, 1).await.unwrap();
		let public_key = signer.public_key().await.unwrap();

		let pk_arr: [u8; 1952] = public_key.as_ref().try_into().unwrap();
		let vk = ml_dsa::VerifyingKey::<MlDsa65>::decode(&pk_arr.into());
		let sig = ml_dsa::Signature::<MlDsa65>::try_from(signature.as_ref()).unwrap();
		assert!(vk.verify(&HASH, &sig).is_ok());
	}

	#[tokio::test]
	async fn test_same_seed_same_public_key() {
		let a = SeedSigner::from_seed_hex(SeedScheme::MlDsa65, SEED).unwrap();
		let b = SeedSigner::new(SeedScheme::MlDsa65);
		b.configure(&SecretHex::from(SEED.trim_start_matches("0x")))
			.await
			.unwrap();
		assert_eq!(a.public_key().await.unwrap(), b.public_key().await.unwrap());
	}

	#[tokio::test]
	async fn test_classical_signature_recovers_address() {
		let signer = SeedSigner::from_seed_hex(SeedScheme::Ecdsa, SEED).unwrap();
		let signature = signer.sign(&HASH, 1).await.unwrap();
		assert_eq!(signature.len(), 65);

		let again = signer.sign(&HASH, 1).await.unwrap();
		assert_eq!(signature, again);

		let parsed = PrimitiveSignature::try_from(signature.as_ref()).unwrap();
		let recovered = parsed
			.recover_address_from_prehash(&B256::from(HASH))
			.unwrap();
		assert_eq!(
			recovered.as_slice(),
			signer.public_key().await.unwrap().as_ref()
		);
	}

	#[tokio::test]
	async fn test_sign_without_key_fails() {
		let signer = SeedSigner::new(SeedScheme::MlDsa65);
		assert!(!signer.is_ready().await);
		assert!(matches!(
			signer.sign(&HASH, 1).await,
			Err(SignerError::NotConfigured)
		));
		assert!(matches!(
			signer.public_key().await,
			Err(SignerError::NotConfigured)
		));
	}

	#[tokio::test]
	async fn test_hash_length_checked_first() {
		// Unconfigured, yet the width error wins.
		let signer = SeedSigner::new(SeedScheme::Ecdsa);
		assert!(matches!(
			signer.sign(&[0u8; 33], 1).await,
			Err(SignerError::InvalidHashLength { actual: 33 })
		));
	}

	#[tokio::test]
	async fn test_invalid_seeds_rejected() {
		let signer = SeedSigner::new(SeedScheme::MlDsa65);
		for bad in ["0x0102", "0x123", "zz", ""] {
			assert!(matches!(
				signer.configure(&SecretHex::from(bad)).await,
				Err(SignerError::InvalidSeed(_))
			));
		}
		assert!(!signer.is_configured().await);

		// Zero is not a secp256k1 scalar.
		let classical = SeedSigner::new(SeedScheme::Ecdsa);
		let zero = format!("0x{}", "00".repeat(32));
		assert!(matches!(
			classical.configure(&SecretHex::from(zero)).await,
			Err(SignerError::InvalidSeed(_))
		));
	}

	#[tokio::test]
	async fn test_failed_reconfigure_keeps_previous_key() {
		let signer = SeedSigner::from_seed_hex(SeedScheme::Ecdsa, SEED).unwrap();
		let before = signer.public_key().await.unwrap();
		assert!(signer.configure(&SecretHex::from("0x01")).await.is_err());
		assert_eq!(signer.public_key().await.unwrap(), before);
	}

	#[tokio::test]
	async fn test_configure_serialized_with_sign() {
		let signer = Arc::new(SeedSigner::from_seed_hex(SeedScheme::Ecdsa, SEED).unwrap());
		let other_seed = SecretHex::from(format!("0x{}", "11".repeat(32)));

		let mut handles = Vec::new();
		for i in 0..8 {
			let signer = signer.clone();
			let other_seed = other_seed.clone();
			handles.push(tokio::spawn(async move {
				if i % 2 == 0 {
					signer.configure(&other_seed).await.map(|_| 0)
				} else {
					signer.sign(&HASH, 1).await.map(|s| s.len())
				}
			}));
		}
		for handle in handles {
			let result = handle.await.unwrap().unwrap();
			assert!(result == 0 || result == 65);
		}
	}

	#[tokio::test]
	async fn test_info_counts_signatures() {
		let signer = SeedSigner::from_seed_hex(SeedScheme::MlDsa65, SEED).unwrap();
		signer.sign(&HASH, 1).await.unwrap();
		signer.sign(&HASH, 1).await.unwrap();

		let info = signer.info().await.unwrap();
		assert!(info.has_key);
		assert_eq!(info.nonce, Some(2));
		assert_eq!(info.security_level, "ML-DSA-65");
	}

	#[test]
	fn test_generated_seeds_differ() {
		assert_ne!(*generate_seed(), *generate_seed());
	}

	#[tokio::test]
	async fn test_factory_reads_scheme_and_seed() {
		let config: toml::Value = toml::from_str(&format!(
			"scheme = \"ecdsa\"\nseed = \"{}\"\n",
			SEED
		))
		.unwrap();
		let signer = create_seed_signer(&config).unwrap();
		assert_eq!(signer.kind(), SignerKind::Classical);
		assert!(signer.is_ready().await);

		let config: toml::Value = toml::from_str("scheme = \"ml-dsa-65\"").unwrap();
		let signer = create_seed_signer(&config).unwrap();
		assert!(!signer.is_ready().await);

		let config: toml::Value = toml::from_str("scheme = \"ml-dsa-65\"\nseed = \"0x01\"").unwrap();
		assert!(matches!(
			create_seed_signer(&config),
			Err(SignerError::InvalidConfiguration(_))
		));
	}
}
