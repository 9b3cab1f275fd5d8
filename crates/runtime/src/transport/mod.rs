//! Bundled channel adapters.
//!
//! - [`MemoryChannel`]: two ends of an in-process channel
//! - [`StreamChannel`]: length-prefixed JSON frames over any byte stream
//!   (pipes, sockets, child process stdio)
//! - [`WebSocketChannel`]: one JSON text frame per message

mod memory;
mod stream;
mod websocket;


pub use memory::MemoryChannel;
pub use stream::{MAX_FRAME_LEN, StreamChannel, read_frame, write_frame};
pub use websocket::WebSocketChannel;
