//! Proxy: the local stand-in for the peer's methods.
//!
//! There is no compile-time knowledge of the peer's table. Any name may be
//! looked up with [`Proxy::method`]; whether it exists is only known when the
//! peer answers. [`remote_interface!`](crate::remote_interface) layers a typed
//! client on top.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use collab_protocol::{CallEnvelope, Envelope, TransactionId};
use futures_util::future::FusedFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};

use crate::args::IntoArgs;
use crate::engine::EngineState;
use crate::error::{Error, ProtocolFault, Result};

/// Proxy name reserved for [`Proxy::cleanup_proxy`]; never sent to the peer.
pub const CLEANUP_PROXY: &str = "cleanupProxy";

/// Handle to the peer's methods, returned by [`collab`](crate::collab).
///
/// Cloning is cheap and every clone drives the same engine. The engine lives
/// until the last clone is dropped, so a method that calls back through its
/// own engine must hold a [`WeakProxy`] instead.
#[derive(Clone)]
pub struct Proxy {
	engine: Arc<EngineState>,
}

impl Proxy {
	pub(crate) fn new(engine: Arc<EngineState>) -> Self {
		Self { engine }
	}

	/// Looks up a remote method by name.
	///
	/// Fails at access time for names that can never be called: the empty
	/// string and [`CLEANUP_PROXY`].
	pub fn method(&self, name: &str) -> Result<RemoteMethod> {
		if name.is_empty() || name == CLEANUP_PROXY {
			return Err(Error::InvalidMethodName(name.to_string()));
		}
		Ok(RemoteMethod {
			engine: Arc::clone(&self.engine),
			name: name.to_string(),
		})
	}

	/// Calls `name` on the peer. The `call` envelope is sent before this returns.
	pub fn call(&self, name: &str, args: impl IntoArgs) -> PendingCall {
		match self.method(name) {
			Ok(method) => method.call(args),
			Err(e) => PendingCall::failed(e),
		}
	}

	/// Calls `name` on the peer and decodes the returned value as `T`.
	pub fn invoke<T: DeserializeOwned>(&self, name: &str, args: impl IntoArgs) -> TypedCall<T> {
		self.call(name, args).decode()
	}

	/// Unregisters this engine's message handler.
	///
	/// Later calls fail with [`Error::EngineClosed`]. Calls already in flight
	/// are not failed; they stay pending because their returns can no longer
	/// be received.
	pub fn cleanup_proxy(&self) {
		self.engine.close();
	}

	pub fn is_closed(&self) -> bool {
		self.engine.is_closed()
	}

	/// Subscribes to protocol faults: returns for unknown transactions and
	/// undecodable envelopes.
	pub fn faults(&self) -> broadcast::Receiver<ProtocolFault> {
		self.engine.subscribe_faults()
	}

	/// Number of calls still awaiting a return.
	pub fn pending(&self) -> usize {
		self.engine.registry.len()
	}

	/// This side's engine name, the prefix of every transaction id it mints.
	pub fn name(&self) -> &str {
		&self.engine.name
	}

	/// Returns a handle that does not keep the engine alive.
	pub fn downgrade(&self) -> WeakProxy {
		WeakProxy {
			engine: Arc::downgrade(&self.engine),
		}
	}
}

impl fmt::Debug for Proxy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Proxy")
			.field("name", &self.engine.name)
			.field("pending", &self.engine.registry.len())
			.field("closed", &self.engine.is_closed())
			.finish()
	}
}

/// Non-owning [`Proxy`], for methods registered on the same engine.
#[derive(Clone)]
pub struct WeakProxy {
	engine: Weak<EngineState>,
}

impl WeakProxy {
	/// Returns the proxy, or `None` once every [`Proxy`] clone is dropped.
	pub fn upgrade(&self) -> Option<Proxy> {
		self.engine.upgrade().map(Proxy::new)
	}
}

impl fmt::Debug for WeakProxy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WeakProxy").field("alive", &(self.engine.strong_count() > 0)).finish()
	}
}

/// A named remote method, obtained from [`Proxy::method`].
#[derive(Clone)]
pub struct RemoteMethod {
	engine: Arc<EngineState>,
	name: String,
}

impl RemoteMethod {
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Sends a `call` envelope and returns the future of its result.
	///
	/// The transaction is registered and the envelope handed to the adapter
	/// before this returns; the returned future only waits.
	pub fn call(&self, args: impl IntoArgs) -> PendingCall {
		let engine = &self.engine;
		if engine.is_closed() {
			return PendingCall::failed(Error::EngineClosed);
		}

		let args = match args.into_args() {
			Ok(args) => args,
			Err(e) => return PendingCall::failed(e.into()),
		};

		let (transaction_id, rx) = engine.registry.open();
		tracing::debug!(engine = %engine.name, transaction = %transaction_id, method = %self.name, "sending call");

		let envelope = Envelope::Call(CallEnvelope::new(transaction_id.clone(), self.name.as_str(), args));
		if let Err(e) = engine.send(envelope) {
			tracing::error!(engine = %engine.name, transaction = %transaction_id, "Failed to send call: {}", e);
			engine.registry.abandon(&transaction_id);
			return PendingCall {
				transaction_id: Some(transaction_id),
				state: CallState::Failed(Some(e)),
			};
		}

		PendingCall {
			transaction_id: Some(transaction_id),
			state: CallState::Waiting(rx),
		}
	}
}

impl fmt::Debug for RemoteMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RemoteMethod").field("name", &self.name).finish()
	}
}

/// Future of a remote call's value.
///
/// Settles once, when the matching `return` arrives. There is no timeout: a
/// peer that never answers leaves this pending forever. Dropping it does not
/// retract the call.
#[must_use = "the call is already sent; await the PendingCall to observe its result"]
pub struct PendingCall {
	transaction_id: Option<TransactionId>,
	state: CallState,
}

enum CallState {
	Waiting(oneshot::Receiver<Result<Value>>),
	Failed(Option<Error>),
	Done,
}

impl PendingCall {
	fn failed(error: Error) -> Self {
		Self {
			transaction_id: None,
			state: CallState::Failed(Some(error)),
		}
	}

	/// Id of the transaction, or `None` if the call failed before one was minted.
	pub fn transaction_id(&self) -> Option<&TransactionId> {
		self.transaction_id.as_ref()
	}

	/// Decodes the settled value as `T`.
	pub fn decode<T: DeserializeOwned>(self) -> TypedCall<T> {
		TypedCall {
			inner: self,
			_marker: PhantomData,
		}
	}
}

impl Future for PendingCall {
	type Output = Result<Value>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.get_mut();
		let output = match &mut this.state {
			CallState::Waiting(rx) => match Pin::new(rx).poll(cx) {
				// The sender only disappears if the engine was dropped with this call in flight.
				Poll::Ready(result) => result.map_err(|_| Error::EngineClosed).and_then(|r| r),
				Poll::Pending => return Poll::Pending,
			},
			CallState::Failed(error) => Err(error.take().unwrap_or(Error::EngineClosed)),
			CallState::Done => return Poll::Pending,
		};
		this.state = CallState::Done;
		Poll::Ready(output)
	}
}

impl FusedFuture for PendingCall {
	fn is_terminated(&self) -> bool {
		matches!(self.state, CallState::Done)
	}
}

impl fmt::Debug for PendingCall {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = match self.state {
			CallState::Waiting(_) => "waiting",
			CallState::Failed(_) => "failed",
			CallState::Done => "done",
		};
		f.debug_struct("PendingCall")
			.field("transaction_id", &self.transaction_id)
			.field("state", &state)
			.finish()
	}
}

/// [`PendingCall`] whose value is decoded as `T`.
#[must_use = "the call is already sent; await the TypedCall to observe its result"]
pub struct TypedCall<T> {
	inner: PendingCall,
	_marker: PhantomData<fn() -> T>,
}

impl<T> TypedCall<T> {
	pub fn transaction_id(&self) -> Option<&TransactionId> {
		self.inner.transaction_id()
	}
}

impl<T: DeserializeOwned> Future for TypedCall<T> {
	type Output = Result<T>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.get_mut();
		match Pin::new(&mut this.inner).poll(cx) {
			Poll::Ready(result) => Poll::Ready(result.and_then(|value| serde_json::from_value(value).map_err(Error::from))),
			Poll::Pending => Poll::Pending,
		}
	}
}

impl<T> fmt::Debug for TypedCall<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("TypedCall").field(&self.inner).finish()
	}
}
