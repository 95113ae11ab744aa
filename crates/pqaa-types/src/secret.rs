//! Redacted hex secrets.
//!
//! Seed material reaches the process as a hex string (configuration or an
//! environment variable). `SecretHex` keeps that string in zeroizing memory,
//! never prints it, and decodes it into zeroizing bytes on demand.

use crate::utils::{decode_hex, HexError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "***REDACTED***";

/// A hex-encoded secret that is wiped on drop and never logged.
#[derive(Clone)]
pub struct SecretHex(Zeroizing<String>);

impl SecretHex {
	pub fn new(s: String) -> Self {
		Self(Zeroizing::new(s))
	}

	/// Decodes the secret with the strict hex codec.
	pub fn decode(&self) -> Result<Zeroizing<Vec<u8>>, HexError> {
		decode_hex(&self.0).map(Zeroizing::new)
	}

	/// Exposes the raw string to a closure, limiting where it is visible.
	pub fn with_exposed<F, R>(&self, f: F) -> R
	where
		F: FnOnce(&str) -> R,
	{
		f(&self.0)
	}
}

impl fmt::Debug for SecretHex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretHex({})", REDACTED)
	}
}

impl fmt::Display for SecretHex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<&str> for SecretHex {
	fn from(s: &str) -> Self {
		Self::new(s.to_string())
	}
}

impl From<String> for SecretHex {
	fn from(s: String) -> Self {
		Self::new(s)
	}
}

impl PartialEq for SecretHex {
	fn eq(&self, other: &Self) -> bool {
		self.0.as_str() == other.0.as_str()
	}
}

impl Eq for SecretHex {}

// Serialization always redacts; secrets are read from config, never written back.
impl Serialize for SecretHex {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(REDACTED)
	}
}

impl<'de> Deserialize<'de> for SecretHex {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		String::deserialize(deserializer).map(SecretHex::new)
	}
}
