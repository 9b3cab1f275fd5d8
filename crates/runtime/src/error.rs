//! Error types for the collab runtime.

use collab_protocol::TransactionId;
use serde_json::Value;
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Prefix the dispatcher puts on the error string for a method it does not have.
///
/// Faults cross the channel as strings, so the caller recognises this
/// condition by the prefix alone.
pub(crate) const UNKNOWN_METHOD_PREFIX: &str = "Unknown method: ";

/// Errors surfaced to callers of the runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// The remote side has no method with this name.
	///
	/// Recognised by the `"Unknown method: "` prefix on the returned error
	/// string. A remote method whose own error text starts with that prefix
	/// is reported as this variant too.
	#[error("Unknown method: {0}")]
	UnknownMethod(String),

	/// The remote method failed; carries the remote's message.
	#[error("Remote error: {0}")]
	Remote(String),

	/// Proxy access with a name that cannot be called.
	#[error("Invalid method name: {0:?}")]
	InvalidMethodName(String),

	/// The engine was cleaned up or dropped before the call could complete.
	#[error("Engine closed")]
	EngineClosed,

	/// The channel adapter can no longer deliver messages.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// Transport-level error.
	#[error("Transport error: {0}")]
	Transport(String),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Maps an error string received in a `return` envelope to an [`Error`].
	///
	/// Only the prefix is inspected; see [`Error::UnknownMethod`].
	pub(crate) fn from_remote(message: String) -> Self {
		match message.strip_prefix(UNKNOWN_METHOD_PREFIX) {
			Some(name) => Error::UnknownMethod(name.to_string()),
			None => Error::Remote(message),
		}
	}

	/// Returns true if the remote side did not know the called method.
	pub fn is_unknown_method(&self) -> bool {
		matches!(self, Error::UnknownMethod(_))
	}

	/// Returns true if the remote method ran and failed.
	pub fn is_remote(&self) -> bool {
		matches!(self, Error::Remote(_))
	}

	/// Returns the remote's message if this is a [`Error::Remote`].
	pub fn remote_message(&self) -> Option<&str> {
		match self {
			Error::Remote(message) => Some(message),
			_ => None,
		}
	}
}

/// Protocol-integrity fault that cannot be attributed to any caller.
///
/// These never travel through a call's future. The engine logs them and
/// broadcasts them to subscribers of [`Proxy::faults`](crate::Proxy::faults).
#[derive(Debug, Clone, Error)]
pub enum ProtocolFault {
	/// A `return` arrived for an id this engine never issued or already settled.
	#[error("Return for unknown transaction: {transaction_id}")]
	UnknownTransaction { transaction_id: TransactionId },

	/// An incoming message is not a valid envelope.
	#[error("Malformed envelope: {reason}")]
	MalformedEnvelope { reason: String, message: Value },
}
