//! Transaction registry: pending outgoing calls keyed by transaction id.
//!
//! Every proxy call opens a transaction here and parks the sending half of a
//! oneshot channel. The matching `return` envelope removes the entry and
//! settles the caller's future through it. Removal happens before the send,
//! so a transaction settles at most once and a duplicate return finds
//! nothing.

use std::sync::atomic::{AtomicU64, Ordering};

use collab_protocol::{ReturnEnvelope, TransactionId};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, ProtocolFault, Result};

type Settle = oneshot::Sender<Result<Value>>;

pub(crate) struct TransactionRegistry {
	origin: String,
	last_id: AtomicU64,
	pending: DashMap<TransactionId, Settle>,
}

impl TransactionRegistry {
	pub fn new(origin: impl Into<String>) -> Self {
		Self {
			origin: origin.into(),
			last_id: AtomicU64::new(0),
			pending: DashMap::new(),
		}
	}

	fn mint(&self) -> TransactionId {
		TransactionId::new(&self.origin, self.last_id.fetch_add(1, Ordering::SeqCst))
	}

	/// Mints a fresh id and parks its continuation.
	pub fn open(&self) -> (TransactionId, oneshot::Receiver<Result<Value>>) {
		let id = self.mint();
		let (tx, rx) = oneshot::channel();
		self.pending.insert(id.clone(), tx);
		(id, rx)
	}

	/// Drops a transaction whose `call` envelope never left.
	pub fn abandon(&self, id: &TransactionId) {
		self.pending.remove(id);
	}

	/// Settles the transaction a `return` envelope refers to.
	pub fn settle(&self, ret: ReturnEnvelope) -> std::result::Result<(), ProtocolFault> {
		let Some((id, settle)) = self.pending.remove(&ret.transaction_id) else {
			return Err(ProtocolFault::UnknownTransaction {
				transaction_id: ret.transaction_id,
			});
		};

		let outcome = ret.outcome().map_err(Error::from_remote);
		tracing::debug!(transaction = %id, ok = outcome.is_ok(), "settling transaction");

		if settle.send(outcome).is_err() {
			tracing::warn!(transaction = %id, "caller dropped its pending call before the return arrived");
		}
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}
}
