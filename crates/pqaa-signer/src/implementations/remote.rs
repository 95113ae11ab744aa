//! Remote signing plugin backend.
//!
//! The plugin keeps its key in its own encrypted storage and is reached
//! through the host wallet's JSON-RPC: `wallet_getSnaps` and
//! `wallet_requestSnaps` manage the connection, `wallet_invokeSnap` forwards
//! a plugin method. This backend never sees key material, only hex payloads,
//! which are decoded strictly.

use crate::{check_hash, SignerError, SignerInterface};
use async_trait::async_trait;
use pqaa_types::{
	decode_hex, encode_hex, Bytes, ConfigSchema, Field, FieldType, JsonRpcRequest,
	JsonRpcResponse, RpcReply, Schema, SignerInfo, SignerKind, ValidationError,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default plugin id of the ML-DSA signing plugin.
pub const DEFAULT_PLUGIN_ID: &str = "local:http://localhost:8080";

/// Carries plugin-runtime calls to the host wallet.
#[async_trait]
pub trait PluginTransport: Send + Sync {
	/// Performs one JSON-RPC call and returns its result.
	///
	/// Transport failures and error replies both map to
	/// [`SignerError::RemoteSigner`] with the host's message unmodified.
	async fn request(&self, method: &str, params: Value) -> Result<Value, SignerError>;
}

/// Plugin transport over HTTP JSON-RPC.
pub struct HttpPluginTransport {
	client: reqwest::Client,
	url: String,
	next_id: AtomicU64,
}

impl HttpPluginTransport {
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SignerError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| SignerError::RemoteSigner(format!("Failed to build HTTP client: {}", e)))?;
		Ok(Self {
			client,
			url: url.into(),
			next_id: AtomicU64::new(1),
		})
	}
}

#[async_trait]
impl PluginTransport for HttpPluginTransport {
	async fn request(&self, method: &str, params: Value) -> Result<Value, SignerError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let request = JsonRpcRequest::new(id, method, params);

		let response: JsonRpcResponse = self
			.client
			.post(&self.url)
			.json(&request)
			.send()
			.await
			.map_err(|e| SignerError::RemoteSigner(e.to_string()))?
			.json()
			.await
			.map_err(|e| SignerError::MalformedResponse(e.to_string()))?;

		match response
			.into_reply::<Value>()
			.map_err(|e| SignerError::MalformedResponse(e.to_string()))?
		{
			RpcReply::Result(value) => Ok(value.unwrap_or(Value::Null)),
			RpcReply::Error(error) => Err(SignerError::RemoteSigner(error.message)),
		}
	}
}

/// Signer backed by a remote plugin.
pub struct RemotePluginSigner {
	transport: Box<dyn PluginTransport>,
	plugin_id: String,
	kind: SignerKind,
}

impl RemotePluginSigner {
	pub fn new(transport: Box<dyn PluginTransport>, plugin_id: impl Into<String>) -> Self {
		Self {
			transport,
			plugin_id: plugin_id.into(),
			kind: SignerKind::PostQuantum,
		}
	}

	/// Overrides the signature family the plugin produces.
	pub fn with_kind(mut self, kind: SignerKind) -> Self {
		self.kind = kind;
		self
	}

	/// Queries the host for the plugin. Never cached.
	pub async fn is_connected(&self) -> Result<bool, SignerError> {
		let plugins = self.transport.request("wallet_getSnaps", json!([])).await?;
		Ok(plugins.get(&self.plugin_id).is_some())
	}

	async fn invoke(&self, method: &str, params: Option<Value>) -> Result<Value, SignerError> {
		let mut request = json!({ "method": method });
		if let Some(params) = params {
			request["params"] = params;
		}
		self.transport
			.request(
				"wallet_invokeSnap",
				json!({ "snapId": self.plugin_id, "request": request }),
			)
			.await
	}

	fn field<'a>(value: &'a Value, name: &str) -> Result<&'a str, SignerError> {
		value.get(name).and_then(Value::as_str).ok_or_else(|| {
			SignerError::MalformedResponse(format!("missing string field '{}'", name))
		})
	}
}

/// Decodes a hex signature, separating width errors from garbage.
fn decode_signature(hex: &str, kind: SignerKind) -> Result<Bytes, SignerError> {
	let bytes = decode_hex(hex).map_err(|e| {
		if e.is_odd_length() {
			SignerError::InvalidSignatureLength(e.to_string())
		} else {
			SignerError::MalformedResponse(e.to_string())
		}
	})?;
	if bytes.len() != kind.signature_len() {
		return Err(SignerError::InvalidSignatureLength(format!(
			"expected {} bytes for {}, got {}",
			kind.signature_len(),
			kind,
			bytes.len()
		)));
	}
	Ok(Bytes::from(bytes))
}

/// Configuration schema for the remote plugin signer.
pub struct RemoteSignerSchema;

impl RemoteSignerSchema {
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		Self.validate(config)
	}
}

impl ConfigSchema for RemoteSignerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::Url)],
			vec![
				Field::new("plugin_id", FieldType::String),
				Field::new("kind", FieldType::OneOf(&["post-quantum", "classical"])),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(600),
					},
				),
			],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl SignerInterface for RemotePluginSigner {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(RemoteSignerSchema)
	}

	fn kind(&self) -> SignerKind {
		self.kind
	}

	async fn is_ready(&self) -> bool {
		match self.is_connected().await {
			Ok(connected) => connected,
			Err(e) => {
				tracing::debug!(error = %e, "Plugin connectivity check failed");
				false
			},
		}
	}

	/// Asks the host to install or enable the plugin.
	///
	/// Does nothing when the plugin is already connected.
	async fn connect(&self) -> Result<(), SignerError> {
		if self.is_connected().await? {
			return Ok(());
		}
		let mut plugins = serde_json::Map::new();
		plugins.insert(self.plugin_id.clone(), json!({}));
		self.transport
			.request("wallet_requestSnaps", Value::Object(plugins))
			.await?;
		tracing::info!(plugin_id = %self.plugin_id, "Connected signing plugin");
		Ok(())
	}

	async fn sign(&self, hash: &[u8], chain_id: u64) -> Result<Bytes, SignerError> {
		let hash = check_hash(hash)?;
		let result = self
			.invoke(
				"signOperationHash",
				Some(json!({ "hash": encode_hex(&hash), "chainId": chain_id })),
			)
			.await?;
		decode_signature(Self::field(&result, "signature")?, self.kind)
	}

	async fn public_key(&self) -> Result<Bytes, SignerError> {
		let result = self.invoke("getPublicKey", None).await?;
		let public_key = decode_hex(Self::field(&result, "publicKey")?)
			.map_err(|e| SignerError::MalformedResponse(e.to_string()))?;
		Ok(Bytes::from(public_key))
	}

	async fn info(&self) -> Result<SignerInfo, SignerError> {
		let result = self.invoke("getInfo", None).await?;
		serde_json::from_value(result).map_err(|e| SignerError::MalformedResponse(e.to_string()))
	}
}

/// Factory function to create a remote plugin signer from configuration.
///
/// Configuration parameters:
/// - `url`: JSON-RPC endpoint of the host wallet
/// - `plugin_id` (optional): defaults to [`DEFAULT_PLUGIN_ID`]
/// - `kind` (optional): "post-quantum" (default) or "classical"
/// - `timeout_seconds` (optional): per-request timeout, default 60
pub fn create_remote_signer(
	config: &toml::Value,
) -> Result<Box<dyn SignerInterface>, SignerError> {
	RemoteSignerSchema::validate_config(config)
		.map_err(|e| SignerError::InvalidConfiguration(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| SignerError::InvalidConfiguration("url is required".into()))?;
	let plugin_id = config
		.get("plugin_id")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_PLUGIN_ID);
	let kind = match config.get("kind").and_then(|v| v.as_str()) {
		Some("classical") => SignerKind::Classical,
		_ => SignerKind::PostQuantum,
	};
	let timeout_seconds = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.unwrap_or(60) as u64;

	let transport = HttpPluginTransport::new(url, Duration::from_secs(timeout_seconds))?;
	Ok(Box::new(
		RemotePluginSigner::new(Box::new(transport), plugin_id).with_kind(kind),
	))
}

/// Registry for the remote plugin signer implementation.
pub struct Registry;

impl pqaa_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "remote";
	type Factory = crate::SignerFactory;

	fn factory() -> Self::Factory {
		create_remote_signer
	}
}

impl crate::SignerRegistry for Registry {}
