//! Operation lifecycle.
//!
//! Drives one approved request through build, sign, submit and confirm,
//! keeping the pending state and the event bus in step. Every stage error
//! becomes a terminal [`Failure`] carrying the originating message.

use super::event_bus::EventBus;
use crate::state::OperationStateMachine;
use alloy_primitives::{Address, B256};
use pqaa_operation::{finalize, OperationBuilder, OperationError};
use pqaa_relay::{RelayError, RelayService};
use pqaa_signer::{sign_checked, SignerService};
use pqaa_types::{
	truncate_id, Failure, FailureCode, Intent, LifecycleEvent, OperationStatus, PipelineStage,
	Rejection, SessionOutcome, SessionRequest, UserDecision,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

fn build_failure(error: OperationError) -> Failure {
	let code = match error {
		OperationError::NonceQueryFailed(_) => FailureCode::AuthorityError,
		_ => FailureCode::InvalidRequest,
	};
	Failure::new(code, PipelineStage::Build, error.to_string())
}

fn relay_failure(error: RelayError, stage: PipelineStage) -> Failure {
	let code = match error {
		RelayError::ReceiptTimeout { .. } => FailureCode::Timeout,
		_ => FailureCode::RelayError,
	};
	Failure::new(code, stage, error.to_string())
}

/// Runs requests through the operation pipeline.
pub struct OperationLifecycle {
	account: Address,
	builder: Arc<OperationBuilder>,
	signer: Arc<SignerService>,
	relay: Arc<RelayService>,
	state: Arc<OperationStateMachine>,
	event_bus: EventBus,
	receipt_timeout: Duration,
}

impl OperationLifecycle {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		account: Address,
		builder: Arc<OperationBuilder>,
		signer: Arc<SignerService>,
		relay: Arc<RelayService>,
		state: Arc<OperationStateMachine>,
		event_bus: EventBus,
		receipt_timeout: Duration,
	) -> Self {
		Self {
			account,
			builder,
			signer,
			relay,
			state,
			event_bus,
			receipt_timeout,
		}
	}

	pub fn account(&self) -> Address {
		self.account
	}

	pub fn signer(&self) -> &Arc<SignerService> {
		&self.signer
	}

	pub fn state(&self) -> &Arc<OperationStateMachine> {
		&self.state
	}

	/// Processes one request to its terminal outcome.
	///
	/// The pending state is discarded once the outcome is produced. A request
	/// whose id is already pending is refused without touching that entry.
	#[instrument(skip_all, fields(request_id = request.request_id))]
	pub async fn handle(&self, request: SessionRequest) -> SessionOutcome {
		let request_id = request.request_id;

		if let Err(e) = self.state.create(request_id, request.intent.clone()).await {
			let failure = Failure::new(
				FailureCode::InvalidRequest,
				PipelineStage::Build,
				e.to_string(),
			);
			return SessionOutcome {
				request_id,
				result: Err(Rejection::from(failure)),
			};
		}

		let result = match self
			.run_pipeline(request_id, &request.intent, request.decision)
			.await
		{
			Ok(transaction_hash) => Ok(transaction_hash.to_string()),
			Err(failure) => Err(Rejection::from(self.fail(request_id, failure).await)),
		};

		self.state.remove(request_id).await;
		SessionOutcome { request_id, result }
	}

	async fn run_pipeline(
		&self,
		request_id: u64,
		intent: &Intent,
		decision: UserDecision,
	) -> Result<B256, Failure> {
		if decision == UserDecision::Declined {
			tracing::info!("User declined request");
			return Err(Failure::user_rejected());
		}

		// Build
		self.advance(request_id, OperationStatus::Building, PipelineStage::Build)
			.await?;
		// One backend per request: the nonce namespace and the signature must agree.
		let backend = self.signer.active().await.map_err(|e| {
			Failure::new(FailureCode::SignerError, PipelineStage::Build, e.to_string())
		})?;
		let kind = backend.kind();
		let unsigned = self
			.builder
			.build_unsigned(intent, self.account, kind)
			.await
			.map_err(build_failure)?;
		let operation_hash = unsigned.hash;
		self.record(request_id, |s| s.operation_hash = Some(operation_hash))
			.await;
		self.event_bus
			.publish(LifecycleEvent::Built {
				request_id,
				operation_hash,
			})
			.ok();

		// Sign
		self.advance(request_id, OperationStatus::Signing, PipelineStage::Sign)
			.await?;
		let signature = sign_checked(backend.as_ref(), operation_hash.as_slice(), unsigned.chain_id)
			.await
			.map_err(|e| Failure::new(FailureCode::SignerError, PipelineStage::Sign, e.to_string()))?;
		let entry_point = unsigned.entry_point;
		let operation = finalize(unsigned, signature).map_err(|e| {
			Failure::new(FailureCode::SignerError, PipelineStage::Sign, e.to_string())
		})?;

		// Submit
		self.advance(
			request_id,
			OperationStatus::Submitting,
			PipelineStage::Submit,
		)
		.await?;
		let operation_id = self
			.relay
			.submit(&operation, entry_point)
			.await
			.map_err(|e| relay_failure(e, PipelineStage::Submit))?;
		self.record(request_id, |s| s.relay_operation_id = Some(operation_id))
			.await;
		self.event_bus
			.publish(LifecycleEvent::Submitted {
				request_id,
				operation_id,
			})
			.ok();

		// Confirm
		self.advance(request_id, OperationStatus::Waiting, PipelineStage::Confirm)
			.await?;
		let receipt = self
			.relay
			.await_receipt(operation_id, self.receipt_timeout)
			.await
			.map_err(|e| relay_failure(e, PipelineStage::Confirm))?;
		if !receipt.success {
			let message = receipt
				.reason
				.unwrap_or_else(|| "Operation reverted".to_string());
			return Err(Failure::new(
				FailureCode::Reverted,
				PipelineStage::Confirm,
				message,
			));
		}

		let transaction_hash = receipt.transaction_hash;
		self.record(request_id, |s| s.transaction_hash = Some(transaction_hash))
			.await;
		self.advance(request_id, OperationStatus::Confirmed, PipelineStage::Confirm)
			.await?;
		self.event_bus
			.publish(LifecycleEvent::Confirmed {
				request_id,
				transaction_hash,
			})
			.ok();

		tracing::info!(
			op_hash = %truncate_id(&operation_hash.to_string()),
			tx_hash = %truncate_id(&transaction_hash.to_string()),
			"Operation confirmed"
		);
		Ok(transaction_hash)
	}

	async fn advance(
		&self,
		request_id: u64,
		status: OperationStatus,
		stage: PipelineStage,
	) -> Result<(), Failure> {
		self.state
			.transition(request_id, status)
			.await
			.map_err(|e| Failure::new(FailureCode::InvalidRequest, stage, e.to_string()))?;
		tracing::debug!(?status, "Status changed");
		self.event_bus
			.publish(LifecycleEvent::StatusChanged { request_id, status })
			.ok();
		Ok(())
	}

	async fn record<F>(&self, request_id: u64, updater: F)
	where
		F: FnOnce(&mut pqaa_types::PendingOperationState),
	{
		if let Err(e) = self.state.update_with(request_id, updater).await {
			tracing::warn!(error = %e, "Failed to update pending state");
		}
	}

	async fn fail(&self, request_id: u64, failure: Failure) -> Failure {
		let status = OperationStatus::Failed(failure.code);
		if let Err(e) = self.state.transition(request_id, status).await {
			tracing::warn!(error = %e, "Failed to mark operation as failed");
		}
		let last_error = failure.clone();
		self.record(request_id, move |s| s.last_error = Some(last_error))
			.await;

		match failure.code {
			FailureCode::UserRejected => {},
			_ => tracing::warn!(
				stage = ?failure.stage,
				code = %failure.code,
				error = %failure.message,
				"Operation failed"
			),
		}

		self.event_bus
			.publish(LifecycleEvent::StatusChanged { request_id, status })
			.ok();
		self.event_bus
			.publish(LifecycleEvent::Failed {
				request_id,
				failure: failure.clone(),
			})
			.ok();
		failure
	}
}
