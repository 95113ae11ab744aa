//! Configuration module for the operation pipeline.
//!
//! Configuration is read from TOML at startup. It names the chain, the smart
//! account, the EntryPoint and validator contracts, the gas policy, the nonce
//! key layout, and the pluggable signer and relay implementations with their
//! raw per-implementation tables.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["signer.toml", "relay.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)
//!
//! String values may reference environment variables as `${VAR}` or
//! `${VAR:-default}`; seeds are usually supplied this way.

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

use alloy_primitives::{address, Address};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Canonical EntryPoint v0.7 deployment.
pub const ENTRY_POINT_V07: Address = address!("0000000071727de22e5e9d8baf0edac6f37da032");

/// Width of the nonce key in bits.
const NONCE_KEY_BITS: u32 = 192;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Chain the operations are bound to.
	pub network: NetworkConfig,
	/// The smart account operations are built for.
	pub account: AccountConfig,
	/// EntryPoint and validator contract addresses.
	pub contracts: ContractsConfig,
	/// Gas policy constants.
	#[serde(default)]
	pub gas: GasConfig,
	/// Nonce key layout.
	#[serde(default)]
	pub nonce: NonceConfig,
	/// Signer backends.
	pub signer: SignerConfig,
	/// Relay (bundler) configuration.
	pub relay: RelayConfig,
}

/// Chain identity and the node used for nonce queries.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	pub chain_id: u64,
	/// HTTP endpoint of a node exposing the EntryPoint.
	pub rpc_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Address of the deployed smart account.
	pub address: Address,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractsConfig {
	/// EntryPoint the operation hash is bound to.
	#[serde(default = "default_entry_point")]
	pub entry_point: Address,
	/// Routing validator module installed on the account.
	pub validator: Address,
}

fn default_entry_point() -> Address {
	ENTRY_POINT_V07
}

/// Gas policy applied to every operation.
///
/// Each value must fit into 16 bytes; `u64` keeps them well inside that and
/// inside what TOML integers can express.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GasConfig {
	#[serde(default = "default_verification_gas_limit")]
	pub verification_gas_limit: u64,
	#[serde(default = "default_call_gas_limit")]
	pub call_gas_limit: u64,
	#[serde(default = "default_pre_verification_gas")]
	pub pre_verification_gas: u64,
	#[serde(default = "default_max_priority_fee_per_gas")]
	pub max_priority_fee_per_gas: u64,
	#[serde(default = "default_max_fee_per_gas")]
	pub max_fee_per_gas: u64,
}

impl Default for GasConfig {
	fn default() -> Self {
		Self {
			verification_gas_limit: default_verification_gas_limit(),
			call_gas_limit: default_call_gas_limit(),
			pre_verification_gas: default_pre_verification_gas(),
			max_priority_fee_per_gas: default_max_priority_fee_per_gas(),
			max_fee_per_gas: default_max_fee_per_gas(),
		}
	}
}

// ML-DSA verification is expensive on-chain.
fn default_verification_gas_limit() -> u64 {
	5_000_000
}

fn default_call_gas_limit() -> u64 {
	200_000
}

// Covers calldata for a 3309-byte signature.
fn default_pre_verification_gas() -> u64 {
	500_000
}

fn default_max_priority_fee_per_gas() -> u64 {
	1_000_000_000
}

fn default_max_fee_per_gas() -> u64 {
	2_000_000_000
}

/// Layout of the 192-bit nonce key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NonceConfig {
	/// Bit position of the signer-kind discriminant byte inside the key.
	#[serde(default = "default_discriminant_shift")]
	pub discriminant_shift: u32,
	/// Place the validator address in the low 160 bits of the key, for
	/// accounts that select the validation module from the nonce.
	#[serde(default)]
	pub embed_validator: bool,
}

impl Default for NonceConfig {
	fn default() -> Self {
		Self {
			discriminant_shift: default_discriminant_shift(),
			embed_validator: false,
		}
	}
}

/// Top byte of the 192-bit key.
fn default_discriminant_shift() -> u32 {
	NONCE_KEY_BITS - 8
}

/// Configuration for signer backends.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignerConfig {
	/// Which implementation is active at startup.
	pub primary: String,
	/// Map of signer implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Total time to wait for a receipt before reporting a timeout.
	#[serde(default = "default_receipt_timeout_seconds")]
	pub receipt_timeout_seconds: u64,
	/// Delay between receipt polls.
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// Map of relay implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

fn default_receipt_timeout_seconds() -> u64 {
	120
}

fn default_poll_interval_ms() -> u64 {
	1000
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Receipt timeout as a `Duration`.
	pub fn receipt_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.relay.receipt_timeout_seconds)
	}

	/// Poll interval as a `Duration`.
	pub fn poll_interval(&self) -> std::time::Duration {
		std::time::Duration::from_millis(self.relay.poll_interval_ms)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.network.chain_id == 0 {
			return Err(ConfigError::Validation("chain_id must be non-zero".into()));
		}
		if self.network.rpc_url.is_empty() {
			return Err(ConfigError::Validation("rpc_url cannot be empty".into()));
		}
		if self.account.address == Address::ZERO {
			return Err(ConfigError::Validation(
				"Account address cannot be the zero address".into(),
			));
		}
		if self.contracts.validator == Address::ZERO {
			return Err(ConfigError::Validation(
				"Validator address cannot be the zero address".into(),
			));
		}

		if self.gas.max_fee_per_gas < self.gas.max_priority_fee_per_gas {
			return Err(ConfigError::Validation(format!(
				"max_fee_per_gas ({}) must not be below max_priority_fee_per_gas ({})",
				self.gas.max_fee_per_gas, self.gas.max_priority_fee_per_gas
			)));
		}

		if self.nonce.discriminant_shift > NONCE_KEY_BITS - 8 {
			return Err(ConfigError::Validation(format!(
				"discriminant_shift {} leaves no room for an 8-bit discriminant in a {}-bit key",
				self.nonce.discriminant_shift, NONCE_KEY_BITS
			)));
		}
		if self.nonce.embed_validator && self.nonce.discriminant_shift < 160 {
			return Err(ConfigError::Validation(format!(
				"discriminant_shift {} overlaps the embedded validator address (bits 0..160)",
				self.nonce.discriminant_shift
			)));
		}

		validate_primary("signer", &self.signer.primary, &self.signer.implementations)?;
		validate_primary("relay", &self.relay.primary, &self.relay.implementations)?;

		if self.relay.poll_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"relay poll_interval_ms must be greater than 0".into(),
			));
		}
		if self.relay.receipt_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"relay receipt_timeout_seconds must be greater than 0".into(),
			));
		}
		if self.relay.receipt_timeout_seconds > 3600 {
			return Err(ConfigError::Validation(
				"relay receipt_timeout_seconds cannot exceed 3600 (1 hour)".into(),
			));
		}

		Ok(())
	}
}

fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses TOML, resolving environment variables first and validating after.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
