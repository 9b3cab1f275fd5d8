use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::adapter::{ChannelAdapter, Inbox, MessageHandler, Subscription};
use crate::error::{Error, Result};

/// Channel adapter over an established WebSocket.
///
/// Each envelope travels as one text frame. Binary frames holding JSON are
/// accepted on receipt; pings and pongs are left to tungstenite.
pub struct WebSocketChannel {
	outbound: mpsc::UnboundedSender<Value>,
	inbox: Inbox,
	reader: JoinHandle<()>,
}

impl WebSocketChannel {
	/// Connects to `url` (`ws://` or `wss://`).
	pub async fn connect(url: &str) -> Result<WebSocketChannel> {
		let (stream, _response) = tokio_tungstenite::connect_async(url)
			.await
			.map_err(|e| Error::Transport(format!("WebSocket connect to {url} failed: {e}")))?;
		tracing::debug!(url, "WebSocket connected");
		Ok(Self::new(stream))
	}

	/// Wraps an accepted or connected stream. Must be called inside a tokio runtime.
	pub fn new<S>(stream: WebSocketStream<S>) -> Self
	where
		S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
	{
		let (mut sink, mut source) = stream.split();
		let (inbox, inbound) = Inbox::new();
		let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Value>();

		tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				let text = match serde_json::to_string(&message) {
					Ok(text) => text,
					Err(e) => {
						tracing::error!("Failed to encode message: {}", e);
						continue;
					}
				};
				if let Err(e) = sink.send(Message::Text(text)).await {
					tracing::error!("WebSocket write error: {}", e);
					break;
				}
			}
			let _ = sink.close().await;
		});

		let reader = tokio::spawn(async move {
			while let Some(frame) = source.next().await {
				let parsed = match frame {
					Ok(Message::Text(text)) => serde_json::from_str::<Value>(&text),
					Ok(Message::Binary(bytes)) => serde_json::from_slice::<Value>(&bytes),
					Ok(Message::Close(_)) => break,
					Ok(_) => continue,
					Err(e) => {
						tracing::error!("WebSocket read error: {}", e);
						break;
					}
				};
				match parsed {
					Ok(message) => {
						if inbound.send(message).is_err() {
							break;
						}
					}
					Err(e) => tracing::error!("Discarding frame that is not JSON: {}", e),
				}
			}
			tracing::debug!("WebSocket reader finished");
		});

		Self { outbound, inbox, reader }
	}
}

impl From<WebSocketStream<MaybeTlsStream<TcpStream>>> for WebSocketChannel {
	fn from(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
		Self::new(stream)
	}
}

impl ChannelAdapter for WebSocketChannel {
	fn send_message(&self, message: Value) -> Result<()> {
		self.outbound.send(message).map_err(|_| Error::ChannelClosed)
	}

	fn register_handler(&self, handler: MessageHandler) -> Subscription {
		self.inbox.register(handler)
	}
}

impl Drop for WebSocketChannel {
	fn drop(&mut self) {
		self.reader.abort();
	}
}
