//! Engine: one side of one channel.
//!
//! An engine owns a [`Methods`] table it serves to the peer, a transaction
//! registry for the calls it makes, and the subscription to its channel
//! adapter. The caller only ever sees the [`Proxy`] it returns.
//!
//! # Message Flow
//!
//! 1. A proxy call mints `<name>:<counter>`, parks a oneshot sender in the
//!    registry and sends a `call` envelope
//! 2. The peer's dispatcher runs the named method and answers with a
//!    `return` envelope carrying the value or the error string
//! 3. This engine's handler removes the transaction and settles the
//!    caller's future
//!
//! Faults that belong to no caller (returns for unknown transactions,
//! undecodable envelopes) are logged and broadcast on the fault channel.

mod dispatch;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use collab_protocol::Envelope;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

use crate::adapter::{ChannelAdapter, MessageHandler, Subscription};
use crate::error::{ProtocolFault, Result};
use crate::method::Methods;
use crate::proxy::Proxy;
use crate::registry::TransactionRegistry;

const DEFAULT_FAULT_CAPACITY: usize = 64;

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
	/// Transaction-id prefix. Must differ from the peer's name.
	pub name: String,
	/// Protocol faults buffered per [`Proxy::faults`] subscriber before the
	/// oldest are dropped.
	#[serde(default = "default_fault_capacity")]
	pub fault_capacity: usize,
}

fn default_fault_capacity() -> usize {
	DEFAULT_FAULT_CAPACITY
}

impl EngineConfig {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			fault_capacity: DEFAULT_FAULT_CAPACITY,
		}
	}

	pub fn with_fault_capacity(mut self, capacity: usize) -> Self {
		self.fault_capacity = capacity;
		self
	}
}

/// Builds an engine and connects it to a channel.
#[derive(Debug)]
pub struct EngineBuilder {
	config: EngineConfig,
	methods: Methods,
}

impl EngineBuilder {
	pub fn new(name: impl Into<String>) -> Self {
		Self::from_config(EngineConfig::new(name))
	}

	pub fn from_config(config: EngineConfig) -> Self {
		Self {
			config,
			methods: Methods::new(),
		}
	}

	/// Sets the methods this side exposes to the peer.
	pub fn methods(mut self, methods: Methods) -> Self {
		self.methods = methods;
		self
	}

	pub fn fault_capacity(mut self, capacity: usize) -> Self {
		self.config.fault_capacity = capacity;
		self
	}

	/// Registers the engine's handler with `adapter` and returns the proxy
	/// for the peer's methods. Calls may be issued immediately.
	///
	/// Asynchronous methods run on the runtime this is called from, whichever
	/// thread the adapter later delivers messages on.
	///
	/// # Panics
	///
	/// Panics if called outside a tokio runtime.
	pub fn connect<A>(self, adapter: A) -> Proxy
	where
		A: ChannelAdapter + 'static,
	{
		let EngineBuilder { config, methods } = self;
		let (faults, _) = broadcast::channel(config.fault_capacity.max(1));

		let state = Arc::new(EngineState {
			runtime: Handle::current(),
			registry: TransactionRegistry::new(config.name.clone()),
			name: config.name,
			methods,
			adapter: Arc::new(adapter),
			faults,
			subscription: Mutex::new(None),
			closed: AtomicBool::new(false),
		});

		let engine: Weak<EngineState> = Arc::downgrade(&state);
		let handler: MessageHandler = Arc::new(move |message| {
			if let Some(state) = engine.upgrade() {
				state.handle_message(message);
			}
		});
		let subscription = state.adapter.register_handler(handler);
		*state.subscription.lock() = Some(subscription);

		tracing::debug!(engine = %state.name, methods = state.methods.len(), "engine connected");
		Proxy::new(state)
	}
}

/// Connects a new engine named `name`, serving `methods`, to `adapter`.
///
/// Shorthand for [`EngineBuilder`] with default settings.
pub fn collab<A>(name: impl Into<String>, methods: Methods, adapter: A) -> Proxy
where
	A: ChannelAdapter + 'static,
{
	EngineBuilder::new(name).methods(methods).connect(adapter)
}

pub(crate) struct EngineState {
	pub(crate) name: String,
	pub(crate) methods: Methods,
	pub(crate) registry: TransactionRegistry,
	adapter: Arc<dyn ChannelAdapter>,
	runtime: Handle,
	faults: broadcast::Sender<ProtocolFault>,
	subscription: Mutex<Option<Subscription>>,
	closed: AtomicBool,
}

impl EngineState {
	/// Entry point for every message the adapter delivers.
	pub(crate) fn handle_message(self: &Arc<Self>, message: Value) {
		let envelope = match Envelope::deserialize(&message) {
			Ok(envelope) => envelope,
			Err(e) => {
				self.report(ProtocolFault::MalformedEnvelope {
					reason: e.to_string(),
					message,
				});
				return;
			}
		};

		tracing::debug!(engine = %self.name, transaction = %envelope.transaction_id(), "received envelope");
		match envelope {
			Envelope::Call(call) => self.dispatch_call(call),
			Envelope::Return(ret) => {
				if let Err(fault) = self.registry.settle(ret) {
					self.report(fault);
				}
			}
		}
	}

	pub(crate) fn send(&self, envelope: Envelope) -> Result<()> {
		let message = envelope.to_value()?;
		self.adapter.send_message(message)
	}

	fn report(&self, fault: ProtocolFault) {
		tracing::error!(engine = %self.name, "Protocol fault: {}", fault);
		// Err only means nobody is subscribed.
		let _ = self.faults.send(fault);
	}

	pub(crate) fn subscribe_faults(&self) -> broadcast::Receiver<ProtocolFault> {
		self.faults.subscribe()
	}

	pub(crate) fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Releases the adapter subscription. Pending transactions are left as they are.
	pub(crate) fn close(&self) {
		if self.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		if let Some(subscription) = self.subscription.lock().take() {
			subscription.unregister();
		}
		tracing::debug!(engine = %self.name, pending = self.registry.len(), "engine cleaned up");
	}
}
