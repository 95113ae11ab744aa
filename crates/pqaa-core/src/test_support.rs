//! Counting stubs for pipeline tests.

use crate::engine::{event_bus::EventBus, lifecycle::OperationLifecycle};
use crate::state::OperationStateMachine;
use alloy_primitives::{address, aliases::U192, b256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use pqaa_operation::nonce::join_nonce;
use pqaa_operation::{GasPolicy, NonceKeyLayout, NonceSource, OperationBuilder, OperationError};
use pqaa_relay::implementations::bundler::BundlerSchema;
use pqaa_relay::{RelayError, RelayInterface, RelayService};
use pqaa_signer::implementations::seed::SeedSignerSchema;
use pqaa_signer::{SignerError, SignerInterface, SignerService};
use pqaa_types::{
	ConfigSchema, Intent, OperationReceipt, RelayUserOperation, SessionRequest, SignerInfo,
	SignerKind, UserDecision,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ACCOUNT: Address = address!("3333333333333333333333333333333333333333");
pub const ENTRY_POINT: Address = address!("0000000071727de22e5e9d8baf0edac6f37da032");
pub const CHAIN_ID: u64 = 412346;
pub const OP_ID: B256 = b256!("212f8b8fc5aaf75eec7c431faca6dd686e9669abff65b3f7720c1a5525e75ba9");
pub const TX_HASH: B256 = b256!("00000000000000000000000000000000000000000000000000000000000000aa");
pub const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

pub fn intent() -> Intent {
	Intent::transfer(
		address!("1111111111111111111111111111111111111111"),
		U256::from(1_000_000_000_000_000u64),
	)
}

pub fn approved(request_id: u64) -> SessionRequest {
	SessionRequest {
		request_id,
		intent: intent(),
		decision: UserDecision::Approved,
	}
}

pub fn declined(request_id: u64) -> SessionRequest {
	SessionRequest {
		request_id,
		intent: intent(),
		decision: UserDecision::Declined,
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReceiptScript {
	#[default]
	Success,
	Reverted,
	Never,
}

/// What each stub should do.
#[derive(Debug, Clone, Default)]
pub struct Script {
	pub nonce_error: Option<String>,
	pub signer_error: Option<String>,
	pub relay_rejection: Option<String>,
	pub receipt: ReceiptScript,
	/// The signer reports not ready until `connect` is called.
	pub needs_connect: bool,
}

pub struct StubNonce {
	calls: AtomicUsize,
	error: Option<String>,
}

impl StubNonce {
	pub fn new(error: Option<String>) -> Self {
		Self {
			calls: AtomicUsize::new(0),
			error,
		}
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl NonceSource for StubNonce {
	async fn get_nonce(&self, _sender: Address, key: U192) -> Result<U256, OperationError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		match &self.error {
			Some(message) => Err(OperationError::NonceQueryFailed(message.clone())),
			None => Ok(join_nonce(key, 0)),
		}
	}
}

pub struct StubSigner {
	calls: AtomicUsize,
	connects: AtomicUsize,
	connected: AtomicBool,
	error: Option<String>,
}

impl StubSigner {
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn connects(&self) -> usize {
		self.connects.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl SignerInterface for StubSigner {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(SeedSignerSchema)
	}

	fn kind(&self) -> SignerKind {
		SignerKind::PostQuantum
	}

	async fn is_ready(&self) -> bool {
		self.error.is_none() && self.connected.load(Ordering::SeqCst)
	}

	async fn connect(&self) -> Result<(), SignerError> {
		self.connects.fetch_add(1, Ordering::SeqCst);
		self.connected.store(true, Ordering::SeqCst);
		Ok(())
	}

	async fn sign(&self, _hash: &[u8], _chain_id: u64) -> Result<Bytes, SignerError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		match &self.error {
			Some(message) => Err(SignerError::RemoteSigner(message.clone())),
			None => Ok(Bytes::from(vec![0x5a; 3309])),
		}
	}

	async fn public_key(&self) -> Result<Bytes, SignerError> {
		Ok(Bytes::from(vec![0x01; 1952]))
	}

	async fn info(&self) -> Result<SignerInfo, SignerError> {
		Ok(SignerInfo {
			has_key: true,
			nonce: Some(self.calls() as u64),
			security_level: "ML-DSA-65".into(),
		})
	}
}

pub struct StubRelay {
	submits: AtomicUsize,
	polls: AtomicUsize,
	rejection: Option<String>,
	receipt: ReceiptScript,
	submitted: Mutex<Option<RelayUserOperation>>,
}

impl StubRelay {
	pub fn new(script: &Script) -> Self {
		Self {
			submits: AtomicUsize::new(0),
			polls: AtomicUsize::new(0),
			rejection: script.relay_rejection.clone(),
			receipt: script.receipt,
			submitted: Mutex::new(None),
		}
	}

	pub fn submits(&self) -> usize {
		self.submits.load(Ordering::SeqCst)
	}

	pub fn polls(&self) -> usize {
		self.polls.load(Ordering::SeqCst)
	}

	pub fn submitted(&self) -> Option<RelayUserOperation> {
		self.submitted.lock().unwrap().clone()
	}
}

#[async_trait]
impl RelayInterface for StubRelay {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(BundlerSchema)
	}

	async fn submit(
		&self,
		operation: &RelayUserOperation,
		_entry_point: Address,
	) -> Result<B256, RelayError> {
		self.submits.fetch_add(1, Ordering::SeqCst);
		*self.submitted.lock().unwrap() = Some(operation.clone());
		match &self.rejection {
			Some(message) => Err(RelayError::Rejected {
				code: -32507,
				message: message.clone(),
			}),
			None => Ok(OP_ID),
		}
	}

	async fn get_receipt(
		&self,
		operation_id: B256,
	) -> Result<Option<OperationReceipt>, RelayError> {
		self.polls.fetch_add(1, Ordering::SeqCst);
		let receipt = |success: bool, reason: Option<&str>| OperationReceipt {
			operation_id,
			transaction_hash: TX_HASH,
			gas_used: U256::from(91_000u64),
			success,
			reason: reason.map(str::to_string),
		};
		Ok(match self.receipt {
			ReceiptScript::Success => Some(receipt(true, None)),
			ReceiptScript::Reverted => Some(receipt(false, Some("0x08c379a0"))),
			ReceiptScript::Never => None,
		})
	}
}

/// Wires a lifecycle around the given collaborators.
pub fn lifecycle_with(
	nonce: Arc<dyn NonceSource>,
	signer: Arc<SignerService>,
	relay: Arc<StubRelay>,
	state: Arc<OperationStateMachine>,
	event_bus: EventBus,
) -> OperationLifecycle {
	let builder = OperationBuilder::new(
		nonce,
		NonceKeyLayout::default(),
		GasPolicy::default(),
		ENTRY_POINT,
		CHAIN_ID,
	);
	OperationLifecycle::new(
		ACCOUNT,
		Arc::new(builder),
		signer,
		Arc::new(RelayService::new(relay, Duration::from_secs(1))),
		state,
		event_bus,
		RECEIPT_TIMEOUT,
	)
}

/// A lifecycle wired to counting stubs.
pub struct Harness {
	pub lifecycle: OperationLifecycle,
	pub nonce: Arc<StubNonce>,
	pub signer: Arc<StubSigner>,
	pub relay: Arc<StubRelay>,
	pub state: Arc<OperationStateMachine>,
	pub event_bus: EventBus,
}

impl Harness {
	pub fn new(script: Script) -> Self {
		let nonce = Arc::new(StubNonce::new(script.nonce_error.clone()));
		let signer = Arc::new(StubSigner {
			calls: AtomicUsize::new(0),
			connects: AtomicUsize::new(0),
			connected: AtomicBool::new(!script.needs_connect),
			error: script.signer_error.clone(),
		});
		let relay = Arc::new(StubRelay::new(&script));
		let state = Arc::new(OperationStateMachine::new());
		let event_bus = EventBus::new(64);

		let lifecycle = lifecycle_with(
			nonce.clone(),
			Arc::new(SignerService::single("stub", signer.clone())),
			relay.clone(),
			state.clone(),
			event_bus.clone(),
		);

		Self {
			lifecycle,
			nonce,
			signer,
			relay,
			state,
			event_bus,
		}
	}
}
