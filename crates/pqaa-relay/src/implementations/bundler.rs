//! ERC-4337 bundler relay over HTTP JSON-RPC.
//!
//! Submission is `eth_sendUserOperation [operation, entryPoint]`, receipt
//! lookup is `eth_getUserOperationReceipt [operationId]`, which answers
//! `null` while the operation is pending.

use crate::{RelayError, RelayInterface};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use pqaa_types::{
	ConfigSchema, Field, FieldType, JsonRpcRequest, JsonRpcResponse, OperationReceipt,
	RelayUserOperation, RpcReply, Schema, ValidationError,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Receipt as reported by the bundler.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundlerReceipt {
	user_op_hash: B256,
	actual_gas_used: U256,
	success: bool,
	#[serde(default)]
	reason: Option<String>,
	receipt: TransactionRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRef {
	transaction_hash: B256,
}

/// Interprets an `eth_getUserOperationReceipt` result.
pub fn parse_receipt(value: Value) -> Result<OperationReceipt, RelayError> {
	let receipt: BundlerReceipt =
		serde_json::from_value(value).map_err(|e| RelayError::MalformedResponse(e.to_string()))?;
	Ok(OperationReceipt {
		operation_id: receipt.user_op_hash,
		transaction_hash: receipt.receipt.transaction_hash,
		gas_used: receipt.actual_gas_used,
		success: receipt.success,
		reason: receipt.reason.filter(|r| !r.is_empty()),
	})
}

/// Bundler relay client.
pub struct BundlerRelay {
	client: reqwest::Client,
	url: String,
	next_id: AtomicU64,
}

impl BundlerRelay {
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| RelayError::Transport(format!("Failed to build HTTP client: {}", e)))?;
		Ok(Self {
			client,
			url: url.into(),
			next_id: AtomicU64::new(1),
		})
	}

	async fn call<T: DeserializeOwned>(
		&self,
		method: &str,
		params: Value,
	) -> Result<Option<T>, RelayError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let request = JsonRpcRequest::new(id, method, params);
		tracing::trace!(method, id, "Relay request");

		let response: JsonRpcResponse = self
			.client
			.post(&self.url)
			.json(&request)
			.send()
			.await
			.map_err(|e| RelayError::Transport(e.to_string()))?
			.json()
			.await
			.map_err(|e| RelayError::MalformedResponse(e.to_string()))?;

		match response
			.into_reply::<T>()
			.map_err(|e| RelayError::MalformedResponse(e.to_string()))?
		{
			RpcReply::Result(value) => Ok(value),
			RpcReply::Error(error) => Err(RelayError::Rejected {
				code: error.code,
				message: error.message,
			}),
		}
	}
}

/// Configuration schema for the bundler relay.
pub struct BundlerSchema;

impl BundlerSchema {
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		Self.validate(config)
	}
}

impl ConfigSchema for BundlerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::Url)],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(600),
				},
			)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl RelayInterface for BundlerRelay {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(BundlerSchema)
	}

	async fn submit(
		&self,
		operation: &RelayUserOperation,
		entry_point: Address,
	) -> Result<B256, RelayError> {
		let params = json!([operation, entry_point.to_checksum(None)]);
		self.call::<B256>("eth_sendUserOperation", params)
			.await?
			.ok_or_else(|| RelayError::MalformedResponse("empty operation id".into()))
	}

	async fn get_receipt(
		&self,
		operation_id: B256,
	) -> Result<Option<OperationReceipt>, RelayError> {
		match self
			.call::<Value>("eth_getUserOperationReceipt", json!([operation_id]))
			.await?
		{
			Some(value) => parse_receipt(value).map(Some),
			None => Ok(None),
		}
	}
}

/// Factory function to create a bundler relay from configuration.
///
/// Configuration parameters:
/// - `url`: bundler JSON-RPC endpoint
/// - `timeout_seconds` (optional): per-request timeout, default 30
pub fn create_bundler_relay(config: &toml::Value) -> Result<Box<dyn RelayInterface>, RelayError> {
	BundlerSchema::validate_config(config)
		.map_err(|e| RelayError::InvalidConfiguration(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| RelayError::InvalidConfiguration("url is required".into()))?;
	let timeout_seconds = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(BundlerRelay::new(
		url,
		Duration::from_secs(timeout_seconds),
	)?))
}

/// Registry for the bundler relay implementation.
pub struct Registry;

impl pqaa_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "bundler";
	type Factory = crate::RelayFactory;

	fn factory() -> Self::Factory {
		create_bundler_relay
	}
}

impl crate::RelayRegistry for Registry {}
