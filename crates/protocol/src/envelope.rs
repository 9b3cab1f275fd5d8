use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::TransactionId;

/// The only message exchanged over a channel.
///
/// Tagged by a `type` field holding `"call"` or `"return"`. Anything else on
/// the wire fails to deserialize and is reported by the receiving engine as a
/// malformed envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
	/// Request to run a method on the receiving side.
	Call(CallEnvelope),
	/// Outcome of a call previously sent by the receiving side.
	Return(ReturnEnvelope),
}

/// Request to invoke `function_name` with positional `args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEnvelope {
	pub transaction_id: TransactionId,
	pub function_name: String,
	/// Positional arguments, each a JSON value.
	#[serde(default)]
	pub args: Vec<Value>,
}

/// Outcome of a call.
///
/// Exactly one of `value` and `error` is meaningful. The absence of `error`
/// signals success even when `value` is absent too; see [`outcome`](Self::outcome).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnEnvelope {
	pub transaction_id: TransactionId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	/// Failure message. Faults cross the channel as plain strings only.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl Envelope {
	pub fn transaction_id(&self) -> &TransactionId {
		match self {
			Envelope::Call(call) => &call.transaction_id,
			Envelope::Return(ret) => &ret.transaction_id,
		}
	}

	pub fn to_value(&self) -> serde_json::Result<Value> {
		serde_json::to_value(self)
	}

	pub fn from_value(value: Value) -> serde_json::Result<Self> {
		serde_json::from_value(value)
	}
}

impl CallEnvelope {
	pub fn new(transaction_id: TransactionId, function_name: impl Into<String>, args: Vec<Value>) -> Self {
		Self {
			transaction_id,
			function_name: function_name.into(),
			args,
		}
	}
}

impl ReturnEnvelope {
	pub fn success(transaction_id: TransactionId, value: Value) -> Self {
		Self {
			transaction_id,
			value: Some(value),
			error: None,
		}
	}

	pub fn failure(transaction_id: TransactionId, message: impl Into<String>) -> Self {
		Self {
			transaction_id,
			value: None,
			error: Some(message.into()),
		}
	}

	/// Builds the envelope for a settled method result.
	pub fn from_outcome(transaction_id: TransactionId, outcome: Result<Value, String>) -> Self {
		match outcome {
			Ok(value) => Self::success(transaction_id, value),
			Err(message) => Self::failure(transaction_id, message),
		}
	}

	/// Reads the envelope as a result: `error` wins, a missing `value` is `null`.
	pub fn outcome(self) -> Result<Value, String> {
		match self.error {
			Some(message) => Err(message),
			None => Ok(self.value.unwrap_or(Value::Null)),
		}
	}
}

impl From<CallEnvelope> for Envelope {
	fn from(call: CallEnvelope) -> Self {
		Envelope::Call(call)
	}
}

impl From<ReturnEnvelope> for Envelope {
	fn from(ret: ReturnEnvelope) -> Self {
		Envelope::Return(ret)
	}
}
