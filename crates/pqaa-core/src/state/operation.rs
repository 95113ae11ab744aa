//! Pending-operation state machine.
//!
//! Holds one [`PendingOperationState`] per in-flight request and validates
//! every status change against a static transition table:
//! Idle -> Building -> Signing -> Submitting -> Waiting -> Confirmed, with
//! Failed reachable from every non-terminal state.

use once_cell::sync::Lazy;
use pqaa_types::{Intent, OperationStatus, PendingOperationState};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum OperationStateError {
	#[error("Invalid state transition from {from:?} to {to:?}")]
	InvalidTransition {
		from: OperationStatus,
		to: OperationStatus,
	},
	#[error("Request not found: {0}")]
	NotFound(u64),
	#[error("Request {0} is already pending")]
	DuplicateRequest(u64),
}

/// In-memory store of pending operations keyed by request id.
#[derive(Default)]
pub struct OperationStateMachine {
	pending: RwLock<HashMap<u64, PendingOperationState>>,
}

impl OperationStateMachine {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records a new request in `Idle`.
	pub async fn create(
		&self,
		request_id: u64,
		intent: Intent,
	) -> Result<PendingOperationState, OperationStateError> {
		let mut pending = self.pending.write().await;
		if pending.contains_key(&request_id) {
			return Err(OperationStateError::DuplicateRequest(request_id));
		}
		let state = PendingOperationState::new(request_id, intent);
		pending.insert(request_id, state.clone());
		Ok(state)
	}

	/// Updates a pending operation with a closure.
	pub async fn update_with<F>(
		&self,
		request_id: u64,
		updater: F,
	) -> Result<PendingOperationState, OperationStateError>
	where
		F: FnOnce(&mut PendingOperationState),
	{
		let mut pending = self.pending.write().await;
		let state = pending
			.get_mut(&request_id)
			.ok_or(OperationStateError::NotFound(request_id))?;
		updater(state);
		Ok(state.clone())
	}

	/// Moves a pending operation to `new_status` if the table allows it.
	pub async fn transition(
		&self,
		request_id: u64,
		new_status: OperationStatus,
	) -> Result<PendingOperationState, OperationStateError> {
		let mut pending = self.pending.write().await;
		let state = pending
			.get_mut(&request_id)
			.ok_or(OperationStateError::NotFound(request_id))?;

		if !Self::is_valid_transition(&state.status, &new_status) {
			return Err(OperationStateError::InvalidTransition {
				from: state.status,
				to: new_status,
			});
		}
		state.status = new_status;
		Ok(state.clone())
	}

	pub async fn get(&self, request_id: u64) -> Option<PendingOperationState> {
		self.pending.read().await.get(&request_id).cloned()
	}

	/// Discards a request once its outcome has been reported.
	pub async fn remove(&self, request_id: u64) -> Option<PendingOperationState> {
		self.pending.write().await.remove(&request_id)
	}

	pub async fn pending_count(&self) -> usize {
		self.pending.read().await.len()
	}

	/// Checks if a state transition is valid
	pub fn is_valid_transition(from: &OperationStatus, to: &OperationStatus) -> bool {
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
		enum StatusKind {
			Idle,
			Building,
			Signing,
			Submitting,
			Waiting,
			Confirmed,
			Failed,
		}

		static TRANSITIONS: Lazy<HashMap<StatusKind, HashSet<StatusKind>>> = Lazy::new(|| {
			let mut m = HashMap::new();
			m.insert(
				StatusKind::Idle,
				HashSet::from([StatusKind::Building, StatusKind::Failed]),
			);
			m.insert(
				StatusKind::Building,
				HashSet::from([StatusKind::Signing, StatusKind::Failed]),
			);
			m.insert(
				StatusKind::Signing,
				HashSet::from([StatusKind::Submitting, StatusKind::Failed]),
			);
			m.insert(
				StatusKind::Submitting,
				HashSet::from([StatusKind::Waiting, StatusKind::Failed]),
			);
			m.insert(
				StatusKind::Waiting,
				HashSet::from([StatusKind::Confirmed, StatusKind::Failed]),
			);
			m.insert(StatusKind::Confirmed, HashSet::new()); // terminal
			m.insert(StatusKind::Failed, HashSet::new()); // terminal
			m
		});

		let status_kind = |status: &OperationStatus| -> StatusKind {
			match status {
				OperationStatus::Idle => StatusKind::Idle,
				OperationStatus::Building => StatusKind::Building,
				OperationStatus::Signing => StatusKind::Signing,
				OperationStatus::Submitting => StatusKind::Submitting,
				OperationStatus::Waiting => StatusKind::Waiting,
				OperationStatus::Confirmed => StatusKind::Confirmed,
				OperationStatus::Failed(_) => StatusKind::Failed,
			}
		};

		TRANSITIONS
			.get(&status_kind(from))
			.is_some_and(|set| set.contains(&status_kind(to)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, U256};
	use pqaa_types::FailureCode;

	fn intent() -> Intent {
		Intent::transfer(
			address!("1111111111111111111111111111111111111111"),
			U256::from(1u8),
		)
	}

	#[tokio::test]
	async fn test_happy_path_sequence() {
		let machine = OperationStateMachine::new();
		machine.create(1, intent()).await.unwrap();

		for status in [
			OperationStatus::Building,
			OperationStatus::Signing,
			OperationStatus::Submitting,
			OperationStatus::Waiting,
			OperationStatus::Confirmed,
		] {
			let state = machine.transition(1, status).await.unwrap();
			assert_eq!(state.status, status);
		}
	}

	#[tokio::test]
	async fn test_no_skipping_and_terminal_states_stick() {
		let machine = OperationStateMachine::new();
		machine.create(1, intent()).await.unwrap();

		assert!(matches!(
			machine.transition(1, OperationStatus::Submitting).await,
			Err(OperationStateError::InvalidTransition { .. })
		));

		machine
			.transition(1, OperationStatus::Failed(FailureCode::UserRejected))
			.await
			.unwrap();
		assert!(machine
			.transition(1, OperationStatus::Building)
			.await
			.is_err());
		assert!(machine
			.transition(1, OperationStatus::Failed(FailureCode::Timeout))
			.await
			.is_err());
	}

	#[test]
	fn test_failed_reachable_from_every_non_terminal_state() {
		let failed = OperationStatus::Failed(FailureCode::SignerError);
		for from in [
			OperationStatus::Idle,
			OperationStatus::Building,
			OperationStatus::Signing,
			OperationStatus::Submitting,
			OperationStatus::Waiting,
		] {
			assert!(OperationStateMachine::is_valid_transition(&from, &failed));
		}
		assert!(!OperationStateMachine::is_valid_transition(
			&OperationStatus::Confirmed,
			&failed
		));
	}

	#[tokio::test]
	async fn test_duplicate_and_missing_requests() {
		let machine = OperationStateMachine::new();
		machine.create(7, intent()).await.unwrap();
		assert!(matches!(
			machine.create(7, intent()).await,
			Err(OperationStateError::DuplicateRequest(7))
		));
		assert!(matches!(
			machine.transition(8, OperationStatus::Building).await,
			Err(OperationStateError::NotFound(8))
		));

		assert!(machine.remove(7).await.is_some());
		assert_eq!(machine.pending_count().await, 0);
		assert!(machine.create(7, intent()).await.is_ok());
	}
}
