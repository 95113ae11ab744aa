//! Fluent builder for test and development configurations.

use crate::{
	AccountConfig, Config, ContractsConfig, GasConfig, NetworkConfig, NonceConfig, RelayConfig,
	SignerConfig, ENTRY_POINT_V07,
};
use alloy_primitives::{address, Address};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults target a local devnet (chain 412346) with an `ml-dsa-65` seed
/// signer and a bundler on `localhost:4337`.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	chain_id: u64,
	rpc_url: String,
	account: Address,
	entry_point: Address,
	validator: Address,
	gas: GasConfig,
	discriminant_shift: u32,
	signer_primary: String,
	signer_implementations: HashMap<String, toml::Value>,
	relay_url: String,
	receipt_timeout_seconds: u64,
	poll_interval_ms: u64,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let mut seed = toml::map::Map::new();
		seed.insert("scheme".into(), toml::Value::String("ml-dsa-65".into()));

		let mut signer_implementations = HashMap::new();
		signer_implementations.insert("seed".to_string(), toml::Value::Table(seed));

		Self {
			chain_id: 412346,
			rpc_url: "http://localhost:8547".to_string(),
			account: address!("3333333333333333333333333333333333333333"),
			entry_point: ENTRY_POINT_V07,
			validator: address!("4444444444444444444444444444444444444444"),
			gas: GasConfig::default(),
			discriminant_shift: NonceConfig::default().discriminant_shift,
			signer_primary: "seed".to_string(),
			signer_implementations,
			relay_url: "http://localhost:4337".to_string(),
			receipt_timeout_seconds: 120,
			poll_interval_ms: 1000,
		}
	}

	pub fn chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = chain_id;
		self
	}

	pub fn account(mut self, account: Address) -> Self {
		self.account = account;
		self
	}

	pub fn validator(mut self, validator: Address) -> Self {
		self.validator = validator;
		self
	}

	pub fn gas(mut self, gas: GasConfig) -> Self {
		self.gas = gas;
		self
	}

	pub fn discriminant_shift(mut self, shift: u32) -> Self {
		self.discriminant_shift = shift;
		self
	}

	/// Adds (or replaces) a signer implementation table and makes it primary.
	pub fn signer(mut self, name: &str, table: toml::Value) -> Self {
		self.signer_implementations.insert(name.to_string(), table);
		self.signer_primary = name.to_string();
		self
	}

	pub fn relay_url(mut self, url: impl Into<String>) -> Self {
		self.relay_url = url.into();
		self
	}

	pub fn receipt_timeout_seconds(mut self, seconds: u64) -> Self {
		self.receipt_timeout_seconds = seconds;
		self
	}

	pub fn poll_interval_ms(mut self, ms: u64) -> Self {
		self.poll_interval_ms = ms;
		self
	}

	pub fn build(self) -> Config {
		let mut bundler = toml::map::Map::new();
		bundler.insert("url".into(), toml::Value::String(self.relay_url));

		let mut relay_implementations = HashMap::new();
		relay_implementations.insert("bundler".to_string(), toml::Value::Table(bundler));

		Config {
			network: NetworkConfig {
				chain_id: self.chain_id,
				rpc_url: self.rpc_url,
			},
			account: AccountConfig {
				address: self.account,
			},
			contracts: ContractsConfig {
				entry_point: self.entry_point,
				validator: self.validator,
			},
			gas: self.gas,
			nonce: NonceConfig {
				discriminant_shift: self.discriminant_shift,
				embed_validator: false,
			},
			signer: SignerConfig {
				primary: self.signer_primary,
				implementations: self.signer_implementations,
			},
			relay: RelayConfig {
				primary: "bundler".to_string(),
				receipt_timeout_seconds: self.receipt_timeout_seconds,
				poll_interval_ms: self.poll_interval_ms,
				implementations: relay_implementations,
			},
		}
	}
}
