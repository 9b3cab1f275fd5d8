use serde_json::Value;
use tokio::sync::mpsc;

use crate::adapter::{ChannelAdapter, Inbox, MessageHandler, Subscription};
use crate::error::{Error, Result};

/// One end of an in-process channel.
///
/// Messages sent on one end are delivered to the handlers of the other.
/// Both ends must be used from within a tokio runtime.
pub struct MemoryChannel {
	outbound: mpsc::UnboundedSender<Value>,
	inbox: Inbox,
}

impl MemoryChannel {
	/// Creates two connected ends.
	pub fn pair() -> (MemoryChannel, MemoryChannel) {
		let (left_inbox, to_left) = Inbox::new();
		let (right_inbox, to_right) = Inbox::new();

		let left = MemoryChannel {
			outbound: to_right,
			inbox: left_inbox,
		};
		let right = MemoryChannel {
			outbound: to_left,
			inbox: right_inbox,
		};
		(left, right)
	}
}

impl ChannelAdapter for MemoryChannel {
	fn send_message(&self, message: Value) -> Result<()> {
		self.outbound.send(message).map_err(|_| Error::ChannelClosed)
	}

	fn register_handler(&self, handler: MessageHandler) -> Subscription {
		self.inbox.register(handler)
	}
}
