//! Relay client for signed operations.
//!
//! A relay (an ERC-4337 bundler) accepts a signed operation, answers with an
//! operation id and eventually reports the transaction that included it.
//! [`RelayInterface`] is the raw protocol surface; [`RelayService`] adds the
//! packed-to-relay conversion and the receipt polling loop.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use pqaa_operation::to_relay_format;
use pqaa_types::{
	truncate_id, ConfigSchema, ImplementationRegistry, OperationReceipt, PackedUserOperation,
	RelayUserOperation,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod bundler;
}

/// Errors that can occur while talking to a relay.
#[derive(Debug, Error)]
pub enum RelayError {
	/// The relay answered with a structured error. Never retried.
	#[error("{message}")]
	Rejected { code: i64, message: String },
	/// The request did not reach the relay or the connection failed.
	#[error("Relay transport error: {0}")]
	Transport(String),
	/// The relay answered with an unexpected payload.
	#[error("Malformed relay response: {0}")]
	MalformedResponse(String),
	/// No receipt arrived in time. The operation may still be included.
	#[error("No receipt for {operation_id} after {seconds}s; outcome unknown")]
	ReceiptTimeout { operation_id: String, seconds: u64 },
	/// The operation could not be converted to the relay's shape.
	#[error("Invalid operation: {0}")]
	InvalidOperation(String),
	/// Error in the relay's configuration table.
	#[error("Invalid configuration: {0}")]
	InvalidConfiguration(String),
}

/// Trait defining the interface for relay implementations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelayInterface: Send + Sync {
	/// Returns the configuration schema for this relay.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Submits a signed operation and returns the relay's operation id.
	async fn submit(
		&self,
		operation: &RelayUserOperation,
		entry_point: Address,
	) -> Result<B256, RelayError>;

	/// Fetches the receipt for an operation id; `None` while still pending.
	async fn get_receipt(&self, operation_id: B256)
		-> Result<Option<OperationReceipt>, RelayError>;
}

/// Type alias for relay factory functions.
pub type RelayFactory = fn(&toml::Value) -> Result<Box<dyn RelayInterface>, RelayError>;

/// Registry trait for relay implementations.
pub trait RelayRegistry: ImplementationRegistry<Factory = RelayFactory> {}

/// Get all registered relay implementations.
pub fn get_all_implementations() -> Vec<(&'static str, RelayFactory)> {
	use implementations::bundler;

	vec![(bundler::Registry::NAME, bundler::Registry::factory())]
}

/// Submits operations and waits for their receipts.
pub struct RelayService {
	relay: Arc<dyn RelayInterface>,
	poll_interval: Duration,
}

impl RelayService {
	pub fn new(relay: Arc<dyn RelayInterface>, poll_interval: Duration) -> Self {
		Self {
			relay,
			poll_interval,
		}
	}

	/// Converts and submits a signed operation.
	///
	/// A relay rejection is returned as-is with its message unmodified.
	pub async fn submit(
		&self,
		operation: &PackedUserOperation,
		entry_point: Address,
	) -> Result<B256, RelayError> {
		let relay_op =
			to_relay_format(operation).map_err(|e| RelayError::InvalidOperation(e.to_string()))?;
		let operation_id = self.relay.submit(&relay_op, entry_point).await?;
		tracing::info!(
			operation_id = %truncate_id(&operation_id.to_string()),
			"Submitted operation to relay"
		);
		Ok(operation_id)
	}

	/// Polls for a receipt until one arrives or `timeout` elapses.
	///
	/// The first poll happens immediately. Transport failures while polling
	/// are logged and retried on the next tick; any other error ends the wait.
	pub async fn await_receipt(
		&self,
		operation_id: B256,
		timeout: Duration,
	) -> Result<OperationReceipt, RelayError> {
		let deadline = tokio::time::Instant::now() + timeout;
		let short_id = truncate_id(&operation_id.to_string());

		tracing::debug!(
			operation_id = %short_id,
			timeout_secs = timeout.as_secs(),
			"Waiting for receipt"
		);

		loop {
			match self.relay.get_receipt(operation_id).await {
				Ok(Some(receipt)) => {
					tracing::info!(
						operation_id = %short_id,
						tx_hash = %truncate_id(&receipt.transaction_hash.to_string()),
						success = receipt.success,
						"Receipt received"
					);
					return Ok(receipt);
				},
				Ok(None) => {},
				Err(RelayError::Transport(e)) => {
					tracing::warn!(operation_id = %short_id, error = %e, "Receipt poll failed");
				},
				Err(e) => return Err(e),
			}

			let now = tokio::time::Instant::now();
			if now >= deadline {
				return Err(RelayError::ReceiptTimeout {
					operation_id: operation_id.to_string(),
					seconds: timeout.as_secs(),
				});
			}
			tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
		}
	}
}
