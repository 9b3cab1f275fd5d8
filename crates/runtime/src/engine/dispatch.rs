//! Call dispatcher: runs local methods for incoming `call` envelopes.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use collab_protocol::{CallEnvelope, Envelope, ReturnEnvelope};
use futures_util::FutureExt;
use serde_json::Value;

use super::EngineState;
use crate::error::UNKNOWN_METHOD_PREFIX;
use crate::method::{MethodFn, MethodResult};

impl EngineState {
	/// Answers one `call` envelope with exactly one `return` envelope.
	///
	/// Nothing escapes this function: unknown methods, method errors and
	/// panics all become an `error` on the return.
	pub(super) fn dispatch_call(self: &Arc<Self>, call: CallEnvelope) {
		let CallEnvelope {
			transaction_id,
			function_name,
			args,
		} = call;

		let Some(method) = self.methods.get(&function_name).cloned() else {
			tracing::warn!(
				engine = %self.name,
				method = %function_name,
				transaction = %transaction_id,
				"peer called a method this side does not expose"
			);
			self.send_return(ReturnEnvelope::failure(transaction_id, format!("{UNKNOWN_METHOD_PREFIX}{function_name}")));
			return;
		};

		match invoke(&method, args) {
			MethodResult::Immediate(outcome) => {
				self.send_return(ReturnEnvelope::from_outcome(transaction_id, outcome));
			}
			MethodResult::Deferred(pending) => {
				let engine = Arc::clone(self);
				self.runtime.spawn(async move {
					let outcome = match AssertUnwindSafe(pending).catch_unwind().await {
						Ok(outcome) => outcome,
						Err(payload) => Err(panic_message(payload)),
					};
					engine.send_return(ReturnEnvelope::from_outcome(transaction_id, outcome));
				});
			}
		}
	}

	fn send_return(&self, ret: ReturnEnvelope) {
		let transaction_id = ret.transaction_id.clone();
		if let Err(e) = self.send(Envelope::Return(ret)) {
			tracing::error!(engine = %self.name, transaction = %transaction_id, "Failed to send return: {}", e);
		}
	}
}

fn invoke(method: &MethodFn, args: Vec<Value>) -> MethodResult {
	match panic::catch_unwind(AssertUnwindSafe(|| method(args))) {
		Ok(result) => result,
		Err(payload) => MethodResult::Immediate(Err(panic_message(payload))),
	}
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		format!("method panicked: {message}")
	} else if let Some(message) = payload.downcast_ref::<String>() {
		format!("method panicked: {message}")
	} else {
		"method panicked".to_string()
	}
}
