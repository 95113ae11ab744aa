//! Intent types.
//!
//! An intent is what the session layer hands to the pipeline when a paired
//! application asks the user to send a call: a destination, a native value and
//! raw call data. It lives only until the operation record has been built.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// A single call requested by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
	/// Call target.
	#[serde(rename = "to")]
	pub destination: Address,
	/// Native value in wei.
	#[serde(default)]
	pub value: U256,
	/// Raw call data, empty for plain transfers.
	#[serde(default)]
	pub data: Bytes,
}

impl Intent {
	/// Creates an intent for a plain value transfer.
	pub fn transfer(destination: Address, value: U256) -> Self {
		Self {
			destination,
			value,
			data: Bytes::new(),
		}
	}
}
