//! Nonce source backed by the EntryPoint contract.

use crate::call_data::IEntryPoint;
use crate::nonce::NonceSource;
use crate::OperationError;
use alloy_primitives::{aliases::U192, Address, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use alloy_transport_http::Http;
use async_trait::async_trait;
use pqaa_types::truncate_id;
use std::sync::Arc;

/// Reads nonces with `eth_call` to `EntryPoint.getNonce(sender, key)`.
pub struct EntryPointNonceSource {
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	entry_point: Address,
}

impl EntryPointNonceSource {
	pub fn new(rpc_url: &str, entry_point: Address) -> Result<Self, OperationError> {
		let url = rpc_url.parse().map_err(|e| {
			OperationError::NonceQueryFailed(format!("Invalid RPC URL '{}': {}", rpc_url, e))
		})?;
		let provider = ProviderBuilder::new().on_http(url);

		Ok(Self {
			provider: Arc::new(provider),
			entry_point,
		})
	}
}

#[async_trait]
impl NonceSource for EntryPointNonceSource {
	async fn get_nonce(&self, sender: Address, key: U192) -> Result<U256, OperationError> {
		let call_data = IEntryPoint::getNonceCall { sender, key }.abi_encode();
		let request = TransactionRequest::default()
			.to(self.entry_point)
			.input(call_data.into());

		let result = self
			.provider
			.call(&request)
			.await
			.map_err(|e| OperationError::NonceQueryFailed(format!("getNonce call failed: {}", e)))?;

		let decoded = IEntryPoint::getNonceCall::abi_decode_returns(&result, true).map_err(|e| {
			OperationError::NonceQueryFailed(format!("Invalid getNonce response: {}", e))
		})?;

		tracing::debug!(
			sender = %truncate_id(&sender.to_string()),
			nonce = %decoded.nonce,
			"Fetched nonce"
		);
		Ok(decoded.nonce)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_invalid_url_rejected() {
		let result = EntryPointNonceSource::new("not a url", Address::ZERO);
		assert!(matches!(result, Err(OperationError::NonceQueryFailed(_))));
	}

	#[tokio::test]
	async fn test_unreachable_node_is_nonce_failure() {
		let source = EntryPointNonceSource::new(
			"http://127.0.0.1:1",
			address!("0000000071727de22e5e9d8baf0edac6f37da032"),
		)
		.unwrap();
		let result = source.get_nonce(Address::ZERO, U192::ZERO).await;
		assert!(matches!(result, Err(OperationError::NonceQueryFailed(_))));
	}
}
