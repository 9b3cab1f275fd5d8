//! Length-prefixed JSON framing over a byte stream.
//!
//! Each frame is a 4-byte little-endian length followed by that many bytes
//! of UTF-8 JSON:
//!
//! ```text
//! ┌──────────────┬───────────────────────┐
//! │ len (u32 LE) │ JSON payload (len B)  │
//! └──────────────┴───────────────────────┘
//! ```

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::adapter::{ChannelAdapter, Inbox, MessageHandler, Subscription};
use crate::error::{Error, Result};

/// Largest frame accepted from the peer (64 MiB).
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Channel adapter over a reader/writer pair.
///
/// Spawns a reader task and a writer task on construction, so it must be
/// created inside a tokio runtime. Outgoing messages are queued and written
/// in order; dropping the channel stops the reader and lets the writer drain
/// what is already queued.
pub struct StreamChannel {
	outbound: mpsc::UnboundedSender<Value>,
	inbox: Inbox,
	reader: JoinHandle<()>,
}

impl StreamChannel {
	pub fn new<R, W>(reader: R, writer: W) -> Self
	where
		R: AsyncRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		let (inbox, inbound) = Inbox::new();
		let (outbound, outbound_rx) = mpsc::unbounded_channel();

		let reader = tokio::spawn(async move {
			if let Err(e) = read_loop(reader, inbound).await {
				tracing::error!("Transport read error: {}", e);
			}
		});

		tokio::spawn(async move {
			if let Err(e) = write_loop(writer, outbound_rx).await {
				tracing::error!("Transport write error: {}", e);
			}
		});

		Self { outbound, inbox, reader }
	}
}

impl ChannelAdapter for StreamChannel {
	fn send_message(&self, message: Value) -> Result<()> {
		self.outbound.send(message).map_err(|_| Error::ChannelClosed)
	}

	fn register_handler(&self, handler: MessageHandler) -> Subscription {
		self.inbox.register(handler)
	}
}

impl Drop for StreamChannel {
	fn drop(&mut self) {
		self.reader.abort();
	}
}

/// Writes one framed message and flushes.
pub async fn write_frame<W>(writer: &mut W, message: &Value) -> Result<()>
where
	W: AsyncWrite + Unpin,
{
	let bytes = serde_json::to_vec(message)?;
	let length = u32::try_from(bytes.len()).map_err(|_| Error::Transport(format!("Message too large to frame: {} bytes", bytes.len())))?;

	writer.write_all(&length.to_le_bytes()).await?;
	writer.write_all(&bytes).await?;
	writer.flush().await?;
	Ok(())
}

/// Reads the payload of one frame.
///
/// Returns `Ok(None)` on a clean end of stream between frames. A stream that
/// ends inside a frame is an error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
	R: AsyncRead + Unpin,
{
	let mut len_buf = [0u8; 4];
	let mut filled = 0;
	while filled < len_buf.len() {
		let n = reader.read(&mut len_buf[filled..]).await?;
		if n == 0 {
			if filled == 0 {
				return Ok(None);
			}
			return Err(Error::Transport(format!("Failed to read length prefix: stream ended after {filled} of 4 bytes")));
		}
		filled += n;
	}

	let length = u32::from_le_bytes(len_buf) as usize;
	if length > MAX_FRAME_LEN {
		return Err(Error::Transport(format!("Frame of {length} bytes exceeds limit of {MAX_FRAME_LEN}")));
	}

	let mut payload = vec![0u8; length];
	reader
		.read_exact(&mut payload)
		.await
		.map_err(|e| Error::Transport(format!("Failed to read message body: {e}")))?;
	Ok(Some(payload))
}

async fn read_loop<R>(mut reader: R, inbound: mpsc::UnboundedSender<Value>) -> Result<()>
where
	R: AsyncRead + Unpin,
{
	while let Some(payload) = read_frame(&mut reader).await? {
		match serde_json::from_slice::<Value>(&payload) {
			Ok(message) => {
				if inbound.send(message).is_err() {
					break;
				}
			}
			Err(e) => tracing::error!("Discarding frame that is not JSON: {}", e),
		}
	}
	tracing::debug!("stream reader finished");
	Ok(())
}

async fn write_loop<W>(mut writer: W, mut outbound: mpsc::UnboundedReceiver<Value>) -> Result<()>
where
	W: AsyncWrite + Unpin,
{
	while let Some(message) = outbound.recv().await {
		write_frame(&mut writer, &message).await?;
	}
	writer.shutdown().await?;
	Ok(())
}
