//! Channel adapter contract.
//!
//! The engine knows nothing about how messages travel. It needs exactly two
//! primitives from the host environment: a way to send one JSON message to
//! the peer, and a way to be told about every message the peer sends. The
//! second returns a [`Subscription`] the engine owns and releases on cleanup.
//!
//! [`Inbox`] is the shared plumbing the bundled adapters in
//! [`transport`](crate::transport) build on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;

/// Callback invoked with every message delivered by the channel.
pub type MessageHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Unique identifier for a registered handler within one [`Inbox`].
pub type HandlerId = u64;

type HandlerMap = Arc<Mutex<IndexMap<HandlerId, MessageHandler>>>;

/// Transport primitives an engine is built on.
///
/// Implementations must deliver each sent message to the peer's registered
/// handlers with its JSON structure intact. No ordering is required beyond
/// per-message atomicity, but handlers on one side must not be invoked
/// concurrently.
pub trait ChannelAdapter: Send + Sync {
	/// Sends one message to the peer. Must not block.
	fn send_message(&self, message: Value) -> Result<()>;

	/// Registers a handler for incoming messages until the returned
	/// [`Subscription`] is released. The handler may be called from any
	/// thread.
	fn register_handler(&self, handler: MessageHandler) -> Subscription;
}

impl<T: ChannelAdapter + ?Sized> ChannelAdapter for Arc<T> {
	fn send_message(&self, message: Value) -> Result<()> {
		(**self).send_message(message)
	}

	fn register_handler(&self, handler: MessageHandler) -> Subscription {
		(**self).register_handler(handler)
	}
}

/// Registration of a message handler.
///
/// Dropping the subscription unregisters the handler, as does calling
/// [`unregister`](Self::unregister) explicitly.
#[must_use = "dropping a Subscription unregisters its handler"]
pub struct Subscription {
	release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
	pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
		Self {
			release: Some(Box::new(release)),
		}
	}

	/// A subscription with nothing to release.
	pub fn noop() -> Self {
		Self { release: None }
	}

	pub fn unregister(mut self) {
		self.release_now();
	}

	fn release_now(&mut self) {
		if let Some(release) = self.release.take() {
			release();
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.release_now();
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription").field("active", &self.release.is_some()).finish()
	}
}

/// Incoming-message queue fanned out to registered handlers.
///
/// Messages pushed through the sender returned by [`Inbox::new`] are buffered
/// until the first handler registers, then delivered one at a time, in
/// arrival order, to every handler in registration order. The pump task is
/// spawned on first registration and aborted when the inbox is dropped, so
/// registration must happen inside a tokio runtime.
pub struct Inbox {
	handlers: HandlerMap,
	last_id: AtomicU64,
	queue: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
	pump: Mutex<Option<JoinHandle<()>>>,
}

impl Inbox {
	pub fn new() -> (Self, mpsc::UnboundedSender<Value>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let inbox = Self {
			handlers: Arc::new(Mutex::new(IndexMap::new())),
			last_id: AtomicU64::new(0),
			queue: Mutex::new(Some(rx)),
			pump: Mutex::new(None),
		};
		(inbox, tx)
	}

	pub fn register(&self, handler: MessageHandler) -> Subscription {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		self.handlers.lock().insert(id, handler);
		self.start_pump();

		let handlers: Weak<Mutex<IndexMap<HandlerId, MessageHandler>>> = Arc::downgrade(&self.handlers);
		Subscription::new(move || {
			if let Some(handlers) = handlers.upgrade() {
				handlers.lock().shift_remove(&id);
				tracing::debug!(handler = id, "message handler unregistered");
			}
		})
	}

	pub fn handler_count(&self) -> usize {
		self.handlers.lock().len()
	}

	fn start_pump(&self) {
		let Some(mut queue) = self.queue.lock().take() else {
			return;
		};
		let handlers = Arc::clone(&self.handlers);

		let task = tokio::spawn(async move {
			while let Some(message) = queue.recv().await {
				let current: Vec<MessageHandler> = handlers.lock().values().cloned().collect();
				if current.is_empty() {
					tracing::debug!("no handler registered, message dropped");
					continue;
				}
				for handler in current {
					handler(message.clone());
				}
			}
			tracing::debug!("inbox closed");
		});
		*self.pump.lock() = Some(task);
	}
}

impl Drop for Inbox {
	fn drop(&mut self) {
		if let Some(task) = self.pump.lock().take() {
			task.abort();
		}
	}
}
