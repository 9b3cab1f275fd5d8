//! The demo exchange: a "main" side and a "worker" side calling each other.

use std::convert::Infallible;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{Context, Result};
use collab::{ChannelAdapter, EngineBuilder, MemoryChannel, Methods, StreamChannel, WeakProxy, WebSocketChannel};
use tokio::net::TcpListener;

use crate::cli::Transport;

type SharedAdapter = Arc<dyn ChannelAdapter>;

collab::remote_interface! {
	/// Methods the worker side serves.
	struct WorkerClient {
		fn add(x: i64, y: i64) -> i64;
		fn slow_square = "slowSquare"(x: i64) -> i64;
	}
}

collab::remote_interface! {
	/// Methods the main side serves.
	struct MainClient {
		fn log(message: String) -> ();
	}
}

pub async fn run(transport: Transport, delay_ms: u64) -> Result<()> {
	let (main_end, worker_end) = channel_pair(transport).await?;
	tracing::info!(?transport, "channel ready");

	let main_methods = Methods::new().method("log", |(message,): (String,)| {
		println!("[main]   worker says: {message}");
		Ok::<_, Infallible>(())
	});
	let main = EngineBuilder::new("main").methods(main_methods).connect(main_end);

	// The worker's methods reach main through the worker's own engine, so they
	// hold it weakly.
	let to_main: Arc<OnceLock<WeakProxy>> = Arc::new(OnceLock::new());
	let worker = EngineBuilder::new("worker")
		.methods(worker_methods(Arc::clone(&to_main), Duration::from_millis(delay_ms)))
		.connect(worker_end);
	let _ = to_main.set(worker.downgrade());

	let mut faults = main.faults();
	tokio::spawn(async move {
		while let Ok(fault) = faults.recv().await {
			tracing::warn!("main observed protocol fault: {}", fault);
		}
	});

	let to_worker = WorkerClient::new(main.clone());

	let sum = to_worker.add(2, 3).await.context("add failed")?;
	println!("[main]   add(2, 3) = {sum}");

	let square = to_worker.slow_square(7).await.context("slowSquare failed")?;
	println!("[main]   slowSquare(7) = {square} after {delay_ms}ms");

	match main.call("missing", ()).await {
		Ok(value) => println!("[main]   missing() unexpectedly returned {value}"),
		Err(err) => println!("[main]   missing() failed as expected: {err}"),
	}

	MainClient::new(worker.clone())
		.log("worker calling main directly".to_string())
		.await
		.context("log failed")?;

	println!("[main]   pending: main={} worker={}", main.pending(), worker.pending());
	main.cleanup_proxy();
	worker.cleanup_proxy();
	Ok(())
}

fn worker_methods(to_main: Arc<OnceLock<WeakProxy>>, delay: Duration) -> Methods {
	Methods::new()
		.method("add", |(x, y): (i64, i64)| {
			println!("[worker] add({x}, {y})");
			Ok::<_, Infallible>(x + y)
		})
		.method_async("slowSquare", move |(x,): (i64,)| {
			let main = to_main.get().and_then(WeakProxy::upgrade).map(MainClient::new);
			async move {
				tokio::time::sleep(delay).await;
				if let Some(main) = main {
					main.log(format!("squared {x} after waiting")).await.map_err(|e| e.to_string())?;
				}
				Ok::<_, String>(x * x)
			}
		})
}

async fn channel_pair(transport: Transport) -> Result<(SharedAdapter, SharedAdapter)> {
	match transport {
		Transport::Memory => {
			let (left, right) = MemoryChannel::pair();
			let left: SharedAdapter = Arc::new(left);
			let right: SharedAdapter = Arc::new(right);
			Ok((left, right))
		}
		Transport::Pipe => {
			let (left, right) = tokio::io::duplex(64 * 1024);
			let (l_read, l_write) = tokio::io::split(left);
			let (r_read, r_write) = tokio::io::split(right);
			let left: SharedAdapter = Arc::new(StreamChannel::new(l_read, l_write));
			let right: SharedAdapter = Arc::new(StreamChannel::new(r_read, r_write));
			Ok((left, right))
		}
		Transport::Websocket => {
			let listener = TcpListener::bind("127.0.0.1:0").await.context("bind loopback listener")?;
			let addr = listener.local_addr()?;
			let accept = tokio::spawn(async move {
				let (stream, peer) = listener.accept().await?;
				tracing::info!(%peer, "accepted WebSocket connection");
				let ws = tokio_tungstenite::accept_async(stream).await?;
				anyhow::Ok(WebSocketChannel::new(ws))
			});

			let client = WebSocketChannel::connect(&format!("ws://{addr}")).await?;
			let server: SharedAdapter = Arc::new(accept.await.context("accept task failed")??);
			let client: SharedAdapter = Arc::new(client);
			Ok((server, client))
		}
	}
}
