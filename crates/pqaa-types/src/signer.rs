//! Signer backend metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Signature family produced by a signer backend.
///
/// The kind doubles as the discriminant the routing validator uses to pick a
/// verifier, and it selects an independent nonce sequence for the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignerKind {
	/// secp256k1 ECDSA, 65-byte signatures.
	Classical,
	/// ML-DSA-65, 3309-byte signatures.
	PostQuantum,
}

impl SignerKind {
	/// Discriminant byte embedded in the nonce key.
	pub fn discriminant(self) -> u8 {
		match self {
			SignerKind::Classical => 0,
			SignerKind::PostQuantum => 1,
		}
	}

	/// Inverse of [`SignerKind::discriminant`].
	pub fn from_discriminant(value: u8) -> Option<Self> {
		match value {
			0 => Some(SignerKind::Classical),
			1 => Some(SignerKind::PostQuantum),
			_ => None,
		}
	}

	/// Fixed signature length produced by this family.
	pub fn signature_len(self) -> usize {
		match self {
			SignerKind::Classical => 65,
			SignerKind::PostQuantum => 3309,
		}
	}
}

impl fmt::Display for SignerKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SignerKind::Classical => write!(f, "classical"),
			SignerKind::PostQuantum => write!(f, "post-quantum"),
		}
	}
}

/// Diagnostic status reported by a signer backend.
///
/// Not needed for signing; exposed so operators can see whether a key is
/// loaded and which parameter set is in use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerInfo {
	/// Whether the backend currently holds usable key material.
	pub has_key: bool,
	/// Number of signatures produced by the backend, when it tracks one.
	#[serde(default)]
	pub nonce: Option<u64>,
	/// Security level label, e.g. "ML-DSA-65".
	pub security_level: String,
}
