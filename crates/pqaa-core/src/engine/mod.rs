//! Session engine.
//!
//! The session layer pushes requests into an inbound channel and drains
//! outcomes from an outbound one. Requests are processed strictly one at a
//! time, so a session never has more than one operation in flight.

pub mod event_bus;
pub mod lifecycle;

use lifecycle::OperationLifecycle;
use pqaa_types::{truncate_id, SessionOutcome, SessionRequest};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Signer not ready: {0}")]
	SignerNotReady(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// Owns the lifecycle and the event bus for one session.
#[derive(Clone)]
pub struct SessionEngine {
	lifecycle: Arc<OperationLifecycle>,
	event_bus: event_bus::EventBus,
}

impl SessionEngine {
	pub fn new(lifecycle: Arc<OperationLifecycle>, event_bus: event_bus::EventBus) -> Self {
		Self {
			lifecycle,
			event_bus,
		}
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	pub fn lifecycle(&self) -> &Arc<OperationLifecycle> {
		&self.lifecycle
	}

	/// Checks that the active signer can sign before requests are accepted.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		let signer = self.lifecycle.signer();
		let name = signer.active_name().await;
		let backend = signer
			.active()
			.await
			.map_err(|e| EngineError::Service(e.to_string()))?;
		backend
			.connect()
			.await
			.map_err(|e| EngineError::SignerNotReady(format!("{}: {}", name, e)))?;
		if !backend.is_ready().await {
			return Err(EngineError::SignerNotReady(name));
		}
		tracing::info!(
			account = %self.lifecycle.account(),
			signer = %name,
			signer_kind = %backend.kind(),
			"Session engine ready"
		);
		Ok(())
	}

	/// Processes requests until the inbound channel closes.
	///
	/// An outcome that cannot be delivered is logged and dropped; the loop
	/// keeps serving requests.
	pub async fn run(
		&self,
		mut requests: mpsc::Receiver<SessionRequest>,
		outcomes: mpsc::Sender<SessionOutcome>,
	) {
		while let Some(request) = requests.recv().await {
			let outcome = self.lifecycle.handle(request).await;
			let request_id = outcome.request_id;
			if let Err(e) = outcomes.send(outcome).await {
				tracing::warn!(
					request_id,
					result = %describe(&e.0),
					"Failed to deliver outcome to session"
				);
			}
		}
		tracing::info!("Session request channel closed");
	}
}

fn describe(outcome: &SessionOutcome) -> String {
	match &outcome.result {
		Ok(tx_hash) => truncate_id(tx_hash),
		Err(rejection) => rejection.message.clone(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::*;
	use pqaa_signer::SignerInterface;
	use pqaa_types::FailureCode;

	fn engine(h: Harness) -> SessionEngine {
		SessionEngine::new(Arc::new(h.lifecycle), h.event_bus)
	}

	#[tokio::test]
	async fn test_outcomes_follow_request_order() {
		let h = Harness::new(Script::default());
		let engine = SessionEngine::new(Arc::new(h.lifecycle), h.event_bus.clone());

		let (request_tx, request_rx) = mpsc::channel(4);
		let (outcome_tx, mut outcome_rx) = mpsc::channel(4);
		request_tx.send(declined(1)).await.unwrap();
		request_tx.send(approved(2)).await.unwrap();
		drop(request_tx);

		engine.run(request_rx, outcome_tx).await;

		let first = outcome_rx.recv().await.unwrap();
		assert_eq!(first.request_id, 1);
		assert_eq!(
			first.result.unwrap_err().failure.code,
			FailureCode::UserRejected
		);

		let second = outcome_rx.recv().await.unwrap();
		assert_eq!(second.request_id, 2);
		assert_eq!(second.result.unwrap(), TX_HASH.to_string());

		assert_eq!(h.signer.calls(), 1);
	}

	#[tokio::test]
	async fn test_closed_outcome_channel_does_not_stop_engine() {
		let engine = engine(Harness::new(Script::default()));

		let (request_tx, request_rx) = mpsc::channel(4);
		let (outcome_tx, outcome_rx) = mpsc::channel(4);
		drop(outcome_rx);
		request_tx.send(approved(1)).await.unwrap();
		request_tx.send(approved(2)).await.unwrap();
		drop(request_tx);

		engine.run(request_rx, outcome_tx).await;
		assert_eq!(engine.lifecycle().state().pending_count().await, 0);
	}

	#[tokio::test]
	async fn test_initialize_checks_signer() {
		let ready = engine(Harness::new(Script::default()));
		assert!(ready.initialize().await.is_ok());

		let engine = engine(Harness::new(Script {
			signer_error: Some("locked".into()),
			..Script::default()
		}));
		assert!(matches!(
			engine.initialize().await,
			Err(EngineError::SignerNotReady(_))
		));
	}

	#[tokio::test]
	async fn test_initialize_connects_signer() {
		let h = Harness::new(Script {
			needs_connect: true,
			..Script::default()
		});
		let signer = h.signer.clone();
		assert!(!signer.is_ready().await);

		let engine = engine(h);
		engine.initialize().await.unwrap();
		assert_eq!(signer.connects(), 1);
		assert!(signer.is_ready().await);
	}
}
