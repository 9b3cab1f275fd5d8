//! Wire types for the collab RPC protocol.
//!
//! Two peers exchange exactly one kind of message, the [`Envelope`]. A peer
//! asks the other side to run a method with a [`CallEnvelope`] and the other
//! side answers with a [`ReturnEnvelope`] addressed to the same
//! [`TransactionId`].
//!
//! ```text
//! side A                                   side B
//!   │  {"type":"call","transactionId":"a:0", │
//!   │   "functionName":"add","args":[2,3]}   │
//!   ├───────────────────────────────────────►│
//!   │                                        │ add(2, 3)
//!   │  {"type":"return","transactionId":"a:0",
//!   │   "value":5}                           │
//!   │◄───────────────────────────────────────┤
//! ```
//!
//! The types here carry no behaviour beyond (de)serialization; correlation
//! and dispatch live in the runtime crate.

mod envelope;
mod transaction;

pub use envelope::{CallEnvelope, Envelope, ReturnEnvelope};
pub use transaction::TransactionId;
