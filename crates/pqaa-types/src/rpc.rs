//! JSON-RPC 2.0 envelopes.
//!
//! Both the bundler relay and the signing plugin host speak JSON-RPC. Each
//! request carries a numeric id; the response echoes it back together with
//! either a result or a structured error whose message is surfaced verbatim.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
	pub jsonrpc: String,
	pub id: u64,
	pub method: String,
	pub params: Value,
}

impl JsonRpcRequest {
	pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
		Self {
			jsonrpc: "2.0".to_string(),
			id,
			method: method.into(),
			params,
		}
	}
}

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

/// A JSON-RPC response with an untyped result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
	/// Echo of the request id; kept untyped because some relays answer with strings.
	#[serde(default)]
	pub id: Option<Value>,
	#[serde(default)]
	pub result: Option<Value>,
	#[serde(default)]
	pub error: Option<JsonRpcError>,
}

/// Outcome of interpreting a JSON-RPC response.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcReply<T> {
	/// The call succeeded; `None` when the result was `null`.
	Result(Option<T>),
	/// The remote side answered with an error object.
	Error(JsonRpcError),
}

impl JsonRpcResponse {
	/// Splits the response into a typed result or the remote error.
	///
	/// Fails only when the result is present but does not match `T`.
	pub fn into_reply<T: DeserializeOwned>(self) -> Result<RpcReply<T>, serde_json::Error> {
		if let Some(error) = self.error {
			return Ok(RpcReply::Error(error));
		}
		match self.result {
			None | Some(Value::Null) => Ok(RpcReply::Result(None)),
			Some(value) => Ok(RpcReply::Result(Some(serde_json::from_value(value)?))),
		}
	}
}
