//! collab - bidirectional RPC between two isolated contexts
//!
//! Two sides connected by nothing but an asynchronous message channel call
//! each other's registered methods as if they were local. Every call returns
//! a future that settles when the peer's answer arrives.
//!
//! - **Methods**: the functions this side exposes to the peer
//! - **Engine**: pairs outgoing calls with incoming returns and answers
//!   incoming calls
//! - **Proxy**: the handle through which the peer's methods are called
//! - **Channel adapter**: the transport, supplied by the host environment
//!
//! # Architecture
//!
//! ```text
//! side "main"                          side "worker"
//! ┌─────────────────┐                  ┌─────────────────┐
//! │ Proxy           │ ───── call ────► │ Dispatcher      │
//! │                 │                  │   └─► Methods   │
//! │ Registry        │ ◄──── return ─── │                 │
//! └─────────────────┘                  └─────────────────┘
//!          └────────── ChannelAdapter ──────────┘
//! ```
//!
//! Both sides run the same engine; each is simultaneously a caller and a
//! callee.

pub mod adapter;
pub mod args;
mod client;
pub mod engine;
pub mod error;
pub mod method;
pub mod proxy;
mod registry;
pub mod transport;

pub use adapter::{ChannelAdapter, Inbox, MessageHandler, Subscription};
pub use args::{Args, FromArgs, IntoArgs};
pub use collab_protocol::{CallEnvelope, Envelope, ReturnEnvelope, TransactionId};
pub use engine::{EngineBuilder, EngineConfig, collab};
pub use error::{Error, ProtocolFault, Result};
pub use method::{MethodFuture, MethodResult, Methods};
pub use proxy::{CLEANUP_PROXY, PendingCall, Proxy, RemoteMethod, TypedCall, WeakProxy};
pub use transport::{MemoryChannel, StreamChannel, WebSocketChannel};
