//! Lifecycle status and failure taxonomy for pending operations.

use crate::Intent;
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a pending operation.
///
/// `Idle -> Building -> Signing -> Submitting -> Waiting -> Confirmed`, with
/// `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
	/// Intent received, user has not decided yet.
	Idle,
	/// Operation record and hash are being built.
	Building,
	/// Waiting for the active signer backend.
	Signing,
	/// Handing the signed record to the relay.
	Submitting,
	/// Polling the relay for a receipt.
	Waiting,
	/// Included on-chain.
	Confirmed,
	/// Terminal failure with its classification.
	Failed(FailureCode),
}

impl OperationStatus {
	/// Whether no further transition is possible.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OperationStatus::Confirmed | OperationStatus::Failed(_))
	}
}

/// Pipeline stage in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
	Build,
	Sign,
	Submit,
	Confirm,
}

impl fmt::Display for PipelineStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			PipelineStage::Build => "build",
			PipelineStage::Sign => "sign",
			PipelineStage::Submit => "submit",
			PipelineStage::Confirm => "confirm",
		};
		f.write_str(name)
	}
}

/// Classification of a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCode {
	/// The user declined before the pipeline started.
	UserRejected,
	/// The intent could not be turned into an operation.
	InvalidRequest,
	/// The nonce authority could not be queried.
	AuthorityError,
	/// The signer backend was not ready or refused to sign.
	SignerError,
	/// The relay rejected the operation.
	RelayError,
	/// No receipt within the polling budget. The outcome is unknown: the
	/// operation may still be included later.
	Timeout,
	/// Included on-chain but the account call reverted.
	Reverted,
}

impl FailureCode {
	/// Stable string form used in logs and rejection payloads.
	pub fn as_str(&self) -> &'static str {
		match self {
			FailureCode::UserRejected => "user-rejected",
			FailureCode::InvalidRequest => "invalid-request",
			FailureCode::AuthorityError => "authority-error",
			FailureCode::SignerError => "signer-error",
			FailureCode::RelayError => "relay-error",
			FailureCode::Timeout => "timeout",
			FailureCode::Reverted => "reverted",
		}
	}

	/// JSON-RPC error code reported to the session layer.
	///
	/// Declines use the EIP-1193 "user rejected" code so wallets and dapps can
	/// tell them apart from pipeline errors.
	pub fn rpc_code(&self) -> i64 {
		match self {
			FailureCode::UserRejected => 4001,
			FailureCode::InvalidRequest => -32602,
			_ => -32603,
		}
	}
}

impl fmt::Display for FailureCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A terminal failure with the stage and the underlying error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
	pub code: FailureCode,
	/// `None` for declines, which never enter the pipeline.
	pub stage: Option<PipelineStage>,
	/// The originating error's message, unmodified.
	pub message: String,
}

impl Failure {
	pub fn new(code: FailureCode, stage: PipelineStage, message: impl Into<String>) -> Self {
		Self {
			code,
			stage: Some(stage),
			message: message.into(),
		}
	}

	/// The failure reported when the user declines a request.
	pub fn user_rejected() -> Self {
		Self {
			code: FailureCode::UserRejected,
			stage: None,
			message: "User rejected the request".to_string(),
		}
	}
}

impl fmt::Display for Failure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.stage {
			Some(stage) => write!(f, "[{}] {}: {}", stage, self.code, self.message),
			None => write!(f, "{}: {}", self.code, self.message),
		}
	}
}

/// In-memory state of one user-approved request.
///
/// Created when the intent arrives and discarded once the terminal status has
/// been reported to the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperationState {
	pub request_id: u64,
	pub status: OperationStatus,
	/// The intent this operation was built from.
	pub intent: Intent,
	/// Hash of the built operation, set after `Building`.
	pub operation_hash: Option<B256>,
	/// Id assigned by the relay, set after `Submitting`.
	pub relay_operation_id: Option<B256>,
	/// Inclusion transaction, set on `Confirmed`.
	pub transaction_hash: Option<B256>,
	pub last_error: Option<Failure>,
}

impl PendingOperationState {
	pub fn new(request_id: u64, intent: Intent) -> Self {
		Self {
			request_id,
			status: OperationStatus::Idle,
			intent,
			operation_hash: None,
			relay_operation_id: None,
			transaction_hash: None,
			last_error: None,
		}
	}
}
