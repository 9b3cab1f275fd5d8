use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier pairing one `call` envelope with its `return`.
///
/// Formatted as `<engine-name>:<counter>`. Each engine mints ids from its own
/// name and a monotonically increasing counter, so the two peers of a channel
/// never collide as long as their names differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
	/// Builds the id for the `sequence`-th call issued by engine `origin`.
	pub fn new(origin: &str, sequence: u64) -> Self {
		Self(format!("{origin}:{sequence}"))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Name of the engine that minted this id.
	///
	/// Engine names may themselves contain `:`, so the split happens at the
	/// last separator. Ids from foreign peers that lack a separator return
	/// the whole string.
	pub fn origin(&self) -> &str {
		match self.0.rsplit_once(':') {
			Some((origin, _)) => origin,
			None => &self.0,
		}
	}

	/// Counter part of the id, if the peer used the numeric format.
	pub fn sequence(&self) -> Option<u64> {
		self.0.rsplit_once(':').and_then(|(_, seq)| seq.parse().ok())
	}
}

impl fmt::Display for TransactionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<String> for TransactionId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl From<&str> for TransactionId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn formats_name_and_counter() {
		let id = TransactionId::new("main", 7);
		assert_eq!(id.as_str(), "main:7");
		assert_eq!(id.origin(), "main");
		assert_eq!(id.sequence(), Some(7));
	}

	#[test]
	fn origin_splits_at_last_separator() {
		let id = TransactionId::new("worker:render", 12);
		assert_eq!(id.origin(), "worker:render");
		assert_eq!(id.sequence(), Some(12));
	}

	#[test]
	fn foreign_ids_without_counter() {
		let id = TransactionId::from("opaque-id");
		assert_eq!(id.origin(), "opaque-id");
		assert_eq!(id.sequence(), None);
	}

	#[test]
	fn serializes_as_plain_string() {
		let id = TransactionId::new("iframe", 3);
		assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("iframe:3"));
	}
}
