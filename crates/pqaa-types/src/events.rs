//! Session boundary and lifecycle event types.
//!
//! The session layer talks to the pipeline through two channels: it pushes
//! [`SessionRequest`]s in and drains [`SessionOutcome`]s out, correlating them
//! by the request id it chose. Observers can additionally subscribe to
//! [`LifecycleEvent`]s on the event bus.

use crate::{Failure, Intent, OperationStatus};
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// The user's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserDecision {
	Approved,
	Declined,
}

/// A request delivered by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
	/// Caller-supplied id used to address the outcome.
	pub request_id: u64,
	pub intent: Intent,
	pub decision: UserDecision,
}

/// Structured rejection returned to the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
	/// JSON-RPC error code (4001 for user declines).
	pub code: i64,
	/// Human-readable message naming the failed stage and the underlying error.
	pub message: String,
	pub failure: Failure,
}

impl From<Failure> for Rejection {
	fn from(failure: Failure) -> Self {
		Self {
			code: failure.code.rpc_code(),
			message: failure.to_string(),
			failure,
		}
	}
}

/// Terminal result for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
	pub request_id: u64,
	/// On success, the "0x"-prefixed inclusion transaction hash.
	pub result: Result<String, Rejection>,
}

/// Events published while an operation moves through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LifecycleEvent {
	/// The pending operation entered a new status.
	StatusChanged {
		request_id: u64,
		status: OperationStatus,
	},
	/// The operation record was built and hashed.
	Built {
		request_id: u64,
		operation_hash: B256,
	},
	/// The relay accepted the operation.
	Submitted {
		request_id: u64,
		operation_id: B256,
	},
	/// The operation reached `Confirmed`.
	Confirmed {
		request_id: u64,
		transaction_hash: B256,
	},
	/// The operation reached `Failed`.
	Failed { request_id: u64, failure: Failure },
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{FailureCode, PipelineStage};

	#[test]
	fn test_rejection_from_failure_keeps_message() {
		let failure = Failure::new(
			FailureCode::SignerError,
			PipelineStage::Sign,
			"Signer not configured",
		);
		let rejection = Rejection::from(failure.clone());

		assert_eq!(rejection.code, -32603);
		assert!(rejection.message.contains("sign"));
		assert!(rejection.message.contains("Signer not configured"));
		assert_eq!(rejection.failure, failure);
	}
}
