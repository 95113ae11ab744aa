//! Builder for constructing a session engine from configuration.
//!
//! Signer backends and relays are created through name-keyed factory maps,
//! so the binary decides which implementations exist and the configuration
//! decides which of them are instantiated and which one is primary.

use crate::engine::{event_bus::EventBus, lifecycle::OperationLifecycle, SessionEngine};
use crate::state::OperationStateMachine;
use pqaa_config::Config;
use pqaa_operation::implementations::entry_point::EntryPointNonceSource;
use pqaa_operation::{GasPolicy, NonceKeyLayout, NonceSource, OperationBuilder};
use pqaa_relay::{RelayError, RelayInterface, RelayService};
use pqaa_signer::{SignerError, SignerInterface, SignerService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component.
pub struct PipelineFactories<SF, RF> {
	pub signer_factories: HashMap<String, SF>,
	pub relay_factories: HashMap<String, RF>,
}

/// Gas policy from the `[gas]` section.
pub fn gas_policy(config: &Config) -> GasPolicy {
	GasPolicy {
		verification_gas_limit: config.gas.verification_gas_limit.into(),
		call_gas_limit: config.gas.call_gas_limit.into(),
		pre_verification_gas: config.gas.pre_verification_gas.into(),
		max_priority_fee_per_gas: config.gas.max_priority_fee_per_gas.into(),
		max_fee_per_gas: config.gas.max_fee_per_gas.into(),
	}
}

/// Nonce key layout from the `[nonce]` and `[contracts]` sections.
pub fn nonce_layout(config: &Config) -> Result<NonceKeyLayout, BuilderError> {
	let layout = NonceKeyLayout::new(config.nonce.discriminant_shift)
		.map_err(|e| BuilderError::Config(e.to_string()))?;
	if config.nonce.embed_validator {
		return layout
			.with_validator(config.contracts.validator)
			.map_err(|e| BuilderError::Config(e.to_string()));
	}
	Ok(layout)
}

/// Builder for a [`SessionEngine`] with pluggable implementations.
pub struct PipelineBuilder {
	config: Config,
	event_bus: EventBus,
}

impl PipelineBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			event_bus: EventBus::default(),
		}
	}

	/// Builds the signer service from every configured signer table.
	pub fn build_signer<SF>(
		&self,
		factories: &HashMap<String, SF>,
	) -> Result<SignerService, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn SignerInterface>, SignerError>,
	{
		let mut backends: HashMap<String, Arc<dyn SignerInterface>> = HashMap::new();
		for (name, table) in &self.config.signer.implementations {
			let Some(factory) = factories.get(name) else {
				tracing::warn!(component = "signer", implementation = %name, "No factory registered");
				continue;
			};
			match factory(table) {
				Ok(backend) => {
					let is_primary = &self.config.signer.primary == name;
					tracing::info!(component = "signer", implementation = %name, primary = %is_primary, "Loaded");
					backends.insert(name.clone(), Arc::from(backend));
				},
				Err(e) => {
					tracing::error!(
						component = "signer",
						implementation = %name,
						error = %e,
						"Failed to create signer implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create signer implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if backends.is_empty() {
			return Err(BuilderError::Config(
				"No valid signer implementations available".into(),
			));
		}

		SignerService::new(backends, &self.config.signer.primary)
			.map_err(|_| BuilderError::MissingComponent(format!("signer '{}'", self.config.signer.primary)))
	}

	/// Builds the relay service from the primary relay table.
	pub fn build_relay<RF>(
		&self,
		factories: &HashMap<String, RF>,
	) -> Result<RelayService, BuilderError>
	where
		RF: Fn(&toml::Value) -> Result<Box<dyn RelayInterface>, RelayError>,
	{
		let primary = &self.config.relay.primary;
		let table = self
			.config
			.relay
			.implementations
			.get(primary)
			.ok_or_else(|| BuilderError::MissingComponent(format!("relay '{}'", primary)))?;
		let factory = factories
			.get(primary)
			.ok_or_else(|| BuilderError::MissingComponent(format!("relay factory '{}'", primary)))?;

		let relay = factory(table).map_err(|e| {
			tracing::error!(component = "relay", implementation = %primary, error = %e, "Failed to create relay implementation");
			BuilderError::Config(format!(
				"Failed to create relay implementation '{}': {}",
				primary, e
			))
		})?;
		tracing::info!(component = "relay", implementation = %primary, "Loaded");

		Ok(RelayService::new(
			Arc::from(relay),
			self.config.poll_interval(),
		))
	}

	/// Builds the engine with the given nonce source.
	pub fn build_with_nonce_source<SF, RF>(
		self,
		factories: PipelineFactories<SF, RF>,
		nonce_source: Arc<dyn NonceSource>,
	) -> Result<SessionEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn SignerInterface>, SignerError>,
		RF: Fn(&toml::Value) -> Result<Box<dyn RelayInterface>, RelayError>,
	{
		let signer = self.build_signer(&factories.signer_factories)?;
		let relay = self.build_relay(&factories.relay_factories)?;

		let builder = OperationBuilder::new(
			nonce_source,
			nonce_layout(&self.config)?,
			gas_policy(&self.config),
			self.config.contracts.entry_point,
			self.config.network.chain_id,
		);

		let lifecycle = OperationLifecycle::new(
			self.config.account.address,
			Arc::new(builder),
			Arc::new(signer),
			Arc::new(relay),
			Arc::new(OperationStateMachine::new()),
			self.event_bus.clone(),
			self.config.receipt_timeout(),
		);

		Ok(SessionEngine::new(Arc::new(lifecycle), self.event_bus))
	}

	/// Builds the engine, reading nonces from the configured EntryPoint.
	pub fn build<SF, RF>(
		self,
		factories: PipelineFactories<SF, RF>,
	) -> Result<SessionEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn SignerInterface>, SignerError>,
		RF: Fn(&toml::Value) -> Result<Box<dyn RelayInterface>, RelayError>,
	{
		let nonce_source = EntryPointNonceSource::new(
			&self.config.network.rpc_url,
			self.config.contracts.entry_point,
		)
		.map_err(|e| BuilderError::Config(e.to_string()))?;
		self.build_with_nonce_source(factories, Arc::new(nonce_source))
	}
}
