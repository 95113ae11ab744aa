//! Signer backends for operation hashes.
//!
//! A signer produces a signature over the 32-byte operation hash. Two
//! backends exist behind [`SignerInterface`]: an in-memory signer derived from
//! a 32-byte seed, and a remote signing plugin reached over JSON-RPC. The
//! [`SignerService`] owns every configured backend and exposes exactly one of
//! them as active; the active backend can be switched at runtime.

use async_trait::async_trait;
use pqaa_types::{
	Bytes, ConfigSchema, ImplementationRegistry, SecretHex, SignerInfo, SignerKind,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Re-export implementations
pub mod implementations {
	pub mod remote;
	pub mod seed;
}

/// Length of the hash every backend signs.
pub const HASH_LEN: usize = 32;

/// Errors that can occur during signing.
#[derive(Debug, Error)]
pub enum SignerError {
	/// The input was not a 32-byte hash.
	#[error("Invalid hash length: expected 32 bytes, got {actual}")]
	InvalidHashLength { actual: usize },
	/// Seed material was malformed or of the wrong width.
	#[error("Invalid seed: {0}")]
	InvalidSeed(String),
	/// The seed signer holds no key yet.
	#[error("Signer not configured")]
	NotConfigured,
	/// The plugin runtime or the plugin itself refused the request.
	#[error("{0}")]
	RemoteSigner(String),
	/// The returned signature has an impossible length.
	#[error("Invalid signature length: {0}")]
	InvalidSignatureLength(String),
	/// The plugin answered with something that is not the expected shape.
	#[error("Malformed response: {0}")]
	MalformedResponse(String),
	/// The underlying signature primitive failed.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// Error in the backend's configuration table.
	#[error("Invalid configuration: {0}")]
	InvalidConfiguration(String),
	/// No backend with the requested name is registered.
	#[error("Unknown signer implementation: {0}")]
	UnknownImplementation(String),
}

/// Checks the hash width before any key material is touched.
pub fn check_hash(hash: &[u8]) -> Result<[u8; HASH_LEN], SignerError> {
	hash.try_into()
		.map_err(|_| SignerError::InvalidHashLength { actual: hash.len() })
}

/// Trait defining the interface for signer backends.
#[async_trait]
pub trait SignerInterface: Send + Sync {
	/// Returns the configuration schema for this backend.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Signature family this backend produces.
	fn kind(&self) -> SignerKind;

	/// Whether the backend can sign right now without further setup.
	async fn is_ready(&self) -> bool;

	/// Establishes whatever the backend needs before it can sign.
	///
	/// Idempotent. Backends without a connection step succeed immediately.
	async fn connect(&self) -> Result<(), SignerError> {
		Ok(())
	}

	/// Replaces the backend's key material with one derived from `seed`.
	///
	/// Only backends that hold keys in memory accept seed material.
	async fn configure(&self, _seed: &SecretHex) -> Result<(), SignerError> {
		Err(SignerError::InvalidConfiguration(format!(
			"{} backend does not accept seed material",
			self.kind()
		)))
	}

	/// Signs a 32-byte operation hash.
	///
	/// Any other input length fails with [`SignerError::InvalidHashLength`]
	/// before the backend is contacted. The chain id is forwarded to backends
	/// that display or bind it; it is not mixed into the signed bytes.
	async fn sign(&self, hash: &[u8], chain_id: u64) -> Result<Bytes, SignerError>;

	/// Encoded public key (1952 bytes for ML-DSA-65, the 20-byte address for ECDSA).
	async fn public_key(&self) -> Result<Bytes, SignerError>;

	/// Diagnostic status.
	async fn info(&self) -> Result<SignerInfo, SignerError>;
}

/// Signs with `backend` and checks the signature width against its kind.
pub async fn sign_checked(
	backend: &dyn SignerInterface,
	hash: &[u8],
	chain_id: u64,
) -> Result<Bytes, SignerError> {
	let signature = backend.sign(hash, chain_id).await?;
	let kind = backend.kind();
	if signature.len() != kind.signature_len() {
		return Err(SignerError::InvalidSignatureLength(format!(
			"expected {} bytes for {}, got {}",
			kind.signature_len(),
			kind,
			signature.len()
		)));
	}
	Ok(signature)
}

/// Type alias for signer factory functions.
pub type SignerFactory = fn(&toml::Value) -> Result<Box<dyn SignerInterface>, SignerError>;

/// Registry trait for signer implementations.
pub trait SignerRegistry: ImplementationRegistry<Factory = SignerFactory> {}

/// Get all registered signer implementations.
pub fn get_all_implementations() -> Vec<(&'static str, SignerFactory)> {
	use implementations::{remote, seed};

	vec![
		(seed::Registry::NAME, seed::Registry::factory()),
		(remote::Registry::NAME, remote::Registry::factory()),
	]
}

/// Owns the configured backends and routes signing to the active one.
pub struct SignerService {
	backends: HashMap<String, Arc<dyn SignerInterface>>,
	active: RwLock<String>,
}

impl SignerService {
	/// Creates a service with `primary` active.
	pub fn new(
		backends: HashMap<String, Arc<dyn SignerInterface>>,
		primary: &str,
	) -> Result<Self, SignerError> {
		if !backends.contains_key(primary) {
			return Err(SignerError::UnknownImplementation(primary.to_string()));
		}
		Ok(Self {
			backends,
			active: RwLock::new(primary.to_string()),
		})
	}

	/// Creates a service with a single backend.
	pub fn single(name: &str, backend: Arc<dyn SignerInterface>) -> Self {
		let mut backends = HashMap::new();
		backends.insert(name.to_string(), backend);
		Self {
			backends,
			active: RwLock::new(name.to_string()),
		}
	}

	/// Switches the active backend.
	///
	/// Signing calls already in flight finish on the backend they started on.
	pub async fn activate(&self, name: &str) -> Result<(), SignerError> {
		if !self.backends.contains_key(name) {
			return Err(SignerError::UnknownImplementation(name.to_string()));
		}
		let mut active = self.active.write().await;
		tracing::info!(from = %*active, to = %name, "Switching active signer");
		*active = name.to_string();
		Ok(())
	}

	pub async fn active_name(&self) -> String {
		self.active.read().await.clone()
	}

	/// Returns the active backend.
	pub async fn active(&self) -> Result<Arc<dyn SignerInterface>, SignerError> {
		let name = self.active.read().await;
		self.backends
			.get(name.as_str())
			.cloned()
			.ok_or_else(|| SignerError::UnknownImplementation(name.clone()))
	}

	/// Returns a backend by name.
	pub fn get(&self, name: &str) -> Option<Arc<dyn SignerInterface>> {
		self.backends.get(name).cloned()
	}

	/// Signature family of the active backend.
	pub async fn kind(&self) -> Result<SignerKind, SignerError> {
		Ok(self.active().await?.kind())
	}

	/// Signs with the active backend.
	pub async fn sign(&self, hash: &[u8], chain_id: u64) -> Result<Bytes, SignerError> {
		let backend = self.active().await?;
		sign_checked(backend.as_ref(), hash, chain_id).await
	}

	/// Connects the active backend.
	pub async fn connect(&self) -> Result<(), SignerError> {
		self.active().await?.connect().await
	}

	/// Loads seed material into the named backend.
	pub async fn configure(&self, name: &str, seed: &SecretHex) -> Result<(), SignerError> {
		let backend = self
			.get(name)
			.ok_or_else(|| SignerError::UnknownImplementation(name.to_string()))?;
		backend.configure(seed).await
	}

	pub async fn public_key(&self) -> Result<Bytes, SignerError> {
		self.active().await?.public_key().await
	}

	pub async fn info(&self) -> Result<SignerInfo, SignerError> {
		self.active().await?.info().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::seed::{SeedScheme, SeedSigner};

	const SEED: &str = "0x000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

	async fn service() -> SignerService {
		let mut backends: HashMap<String, Arc<dyn SignerInterface>> = HashMap::new();
		backends.insert("pq".into(), Arc::new(SeedSigner::new(SeedScheme::MlDsa65)));
		backends.insert("classical".into(), Arc::new(SeedSigner::new(SeedScheme::Ecdsa)));
		let service = SignerService::new(backends, "pq").unwrap();

		let seed = SecretHex::from(SEED);
		service.configure("pq", &seed).await.unwrap();
		service.configure("classical", &seed).await.unwrap();
		service
	}

	/// Claims post-quantum but answers with a classical-width signature.
	struct MislabeledSigner;

	#[async_trait]
	impl SignerInterface for MislabeledSigner {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(implementations::seed::SeedSignerSchema)
		}

		fn kind(&self) -> SignerKind {
			SignerKind::PostQuantum
		}

		async fn is_ready(&self) -> bool {
			true
		}

		async fn sign(&self, _hash: &[u8], _chain_id: u64) -> Result<Bytes, SignerError> {
			Ok(Bytes::from(vec![1u8; 65]))
		}

		async fn public_key(&self) -> Result<Bytes, SignerError> {
			Ok(Bytes::new())
		}

		async fn info(&self) -> Result<SignerInfo, SignerError> {
			Ok(SignerInfo {
				has_key: true,
				nonce: None,
				security_level: "none".into(),
			})
		}
	}

	#[test]
	fn test_check_hash_rejects_other_widths() {
		assert!(check_hash(&[0u8; 32]).is_ok());
		assert!(matches!(
			check_hash(&[0u8; 31]),
			Err(SignerError::InvalidHashLength { actual: 31 })
		));
		assert!(matches!(
			check_hash(&[]),
			Err(SignerError::InvalidHashLength { actual: 0 })
		));
	}

	#[tokio::test]
	async fn test_runtime_switch_changes_signature_family() {
		let service = service().await;
		let hash = [0x42u8; 32];

		assert_eq!(service.kind().await.unwrap(), SignerKind::PostQuantum);
		assert_eq!(service.sign(&hash, 1).await.unwrap().len(), 3309);

		service.activate("classical").await.unwrap();
		assert_eq!(service.active_name().await, "classical");
		assert_eq!(service.kind().await.unwrap(), SignerKind::Classical);
		assert_eq!(service.sign(&hash, 1).await.unwrap().len(), 65);
	}

	#[tokio::test]
	async fn test_unknown_backend_rejected() {
		let service = service().await;
		assert!(matches!(
			service.activate("hardware").await,
			Err(SignerError::UnknownImplementation(_))
		));
		assert_eq!(service.active_name().await, "pq");
	}

	#[tokio::test]
	async fn test_signature_width_must_match_kind() {
		let service = SignerService::single("odd", Arc::new(MislabeledSigner));
		let err = service.sign(&[0u8; 32], 1).await.unwrap_err();
		assert!(matches!(err, SignerError::InvalidSignatureLength(ref m) if m.contains("3309")));
	}

	#[tokio::test]
	async fn test_configure_by_name() {
		let service = service().await;
		assert!(service.get("pq").unwrap().is_ready().await);

		assert!(matches!(
			service.configure("hardware", &SecretHex::from(SEED)).await,
			Err(SignerError::UnknownImplementation(_))
		));
		assert!(matches!(
			service.configure("pq", &SecretHex::from("0x01")).await,
			Err(SignerError::InvalidSeed(_))
		));
	}

	#[tokio::test]
	async fn test_default_connect_and_configure() {
		let service = SignerService::single("odd", Arc::new(MislabeledSigner));
		assert!(service.connect().await.is_ok());
		assert!(matches!(
			service.configure("odd", &SecretHex::from(SEED)).await,
			Err(SignerError::InvalidConfiguration(_))
		));
	}

	#[test]
	fn test_remote_message_displays_verbatim() {
		let err = SignerError::RemoteSigner("User rejected the request.".into());
		assert_eq!(err.to_string(), "User rejected the request.");
	}

	#[test]
	fn test_registry_names() {
		let names: Vec<_> = get_all_implementations().into_iter().map(|(n, _)| n).collect();
		assert_eq!(names, vec!["seed", "remote"]);
	}
}
