use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};

use super::*;
use crate::error::Error;
use crate::proxy::CLEANUP_PROXY;

/// Adapter that records sent messages and lets the test deliver incoming ones.
#[derive(Default)]
struct Recorder {
	sent: Mutex<Vec<Value>>,
	handler: Arc<Mutex<Option<MessageHandler>>>,
}

impl Recorder {
	fn deliver(&self, message: Value) {
		let handler = self.handler.lock().clone().expect("handler registered");
		handler(message);
	}

	fn sent(&self) -> Vec<Value> {
		self.sent.lock().clone()
	}

	fn has_handler(&self) -> bool {
		self.handler.lock().is_some()
	}
}

impl ChannelAdapter for Recorder {
	fn send_message(&self, message: Value) -> Result<()> {
		self.sent.lock().push(message);
		Ok(())
	}

	fn register_handler(&self, handler: MessageHandler) -> Subscription {
		*self.handler.lock() = Some(handler);
		let slot = Arc::clone(&self.handler);
		Subscription::new(move || {
			slot.lock().take();
		})
	}
}

async fn wait_for_sent(recorder: &Recorder) -> Vec<Value> {
	for _ in 0..50 {
		let sent = recorder.sent();
		if !sent.is_empty() {
			return sent;
		}
		tokio::time::sleep(Duration::from_millis(1)).await;
	}
	recorder.sent()
}

fn engine(methods: Methods) -> (Proxy, Arc<Recorder>) {
	let recorder = Arc::new(Recorder::default());
	let proxy = EngineBuilder::new("main").methods(methods).connect(Arc::clone(&recorder));
	(proxy, recorder)
}

#[tokio::test]
async fn call_envelope_is_sent_before_polling() {
	let (proxy, recorder) = engine(Methods::new());

	let pending = proxy.call("add", (2, 3));

	assert_eq!(pending.transaction_id().map(|id| id.as_str()), Some("main:0"));
	assert_eq!(
		recorder.sent(),
		vec![json!({"type": "call", "transactionId": "main:0", "functionName": "add", "args": [2, 3]})]
	);
	assert_eq!(proxy.pending(), 1);

	recorder.deliver(json!({"type": "return", "transactionId": "main:0", "value": 5}));
	assert_eq!(pending.await.unwrap(), json!(5));
	assert_eq!(proxy.pending(), 0);
}

#[tokio::test]
async fn sync_method_answers_inside_the_handler() {
	let (_proxy, recorder) = engine(Methods::new().method("add", |(x, y): (i64, i64)| Ok::<_, Infallible>(x + y)));

	recorder.deliver(json!({"type": "call", "transactionId": "peer:0", "functionName": "add", "args": [2, 3]}));

	assert_eq!(
		recorder.sent(),
		vec![json!({"type": "return", "transactionId": "peer:0", "value": 5})]
	);
}

#[tokio::test]
async fn async_method_answers_after_settling() {
	let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
	let release_rx = Arc::new(Mutex::new(Some(release_rx)));
	let methods = Methods::new().method_async("wait", move |()| {
		let release = release_rx.lock().take();
		async move {
			if let Some(release) = release {
				let _ = release.await;
			}
			Ok::<_, Infallible>("done")
		}
	});
	let (_proxy, recorder) = engine(methods);

	recorder.deliver(json!({"type": "call", "transactionId": "peer:0", "functionName": "wait", "args": []}));
	tokio::task::yield_now().await;
	assert!(recorder.sent().is_empty(), "return sent before the method settled");

	release_tx.send(()).unwrap();
	assert_eq!(
		wait_for_sent(&recorder).await,
		vec![json!({"type": "return", "transactionId": "peer:0", "value": "done"})]
	);
}

#[tokio::test]
async fn async_method_delivered_from_a_plain_thread() {
	let methods = Methods::new().method_async("double", |(x,): (i64,)| async move { Ok::<_, Infallible>(x * 2) });
	let (_proxy, recorder) = engine(methods);

	let host = Arc::clone(&recorder);
	let delivered = std::thread::spawn(move || {
		host.deliver(json!({"type": "call", "transactionId": "peer:0", "functionName": "double", "args": [21]}));
	})
	.join();

	assert!(delivered.is_ok(), "handler panicked outside the runtime");
	assert_eq!(
		wait_for_sent(&recorder).await,
		vec![json!({"type": "return", "transactionId": "peer:0", "value": 42})]
	);
}

#[tokio::test]
async fn unknown_method_is_answered_with_error() {
	let (_proxy, recorder) = engine(Methods::new());

	recorder.deliver(json!({"type": "call", "transactionId": "peer:3", "functionName": "missing", "args": []}));

	assert_eq!(
		recorder.sent(),
		vec![json!({"type": "return", "transactionId": "peer:3", "error": "Unknown method: missing"})]
	);
}

#[tokio::test]
async fn panicking_method_is_answered_with_error() {
	let methods = Methods::new().method("explode", |()| -> std::result::Result<(), Infallible> { panic!("kaboom") });
	let (_proxy, recorder) = engine(methods);

	recorder.deliver(json!({"type": "call", "transactionId": "peer:0", "functionName": "explode"}));

	let sent = recorder.sent();
	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0]["transactionId"], "peer:0");
	assert_eq!(sent[0]["error"], "method panicked: kaboom");
}

#[tokio::test]
async fn async_method_panicking_after_a_yield_is_answered_with_error() {
	let methods = Methods::new().method_async("late", |(fail,): (bool,)| async move {
		tokio::task::yield_now().await;
		if fail {
			panic!("late kaboom");
		}
		Ok::<_, Infallible>(())
	});
	let (_proxy, recorder) = engine(methods);

	recorder.deliver(json!({"type": "call", "transactionId": "peer:1", "functionName": "late", "args": [true]}));

	let sent = wait_for_sent(&recorder).await;
	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0]["transactionId"], "peer:1");
	assert_eq!(sent[0]["error"], "method panicked: late kaboom");
}

#[tokio::test]
async fn remote_error_rejects_the_call() {
	let (proxy, recorder) = engine(Methods::new());

	let pending = proxy.call("div", (1, 0));
	recorder.deliver(json!({"type": "return", "transactionId": "main:0", "error": "division by zero"}));

	let err = pending.await.unwrap_err();
	assert_eq!(err.remote_message(), Some("division by zero"));
}

#[tokio::test]
async fn unknown_transaction_is_reported_as_fault() {
	let (proxy, recorder) = engine(Methods::new());
	let mut faults = proxy.faults();

	recorder.deliver(json!({"type": "return", "transactionId": "main:99", "value": 1}));

	match faults.try_recv().unwrap() {
		ProtocolFault::UnknownTransaction { transaction_id } => assert_eq!(transaction_id.as_str(), "main:99"),
		other => panic!("Expected UnknownTransaction, got {other:?}"),
	}
}

#[tokio::test]
async fn duplicate_return_does_not_touch_settled_call() {
	let (proxy, recorder) = engine(Methods::new());
	let mut faults = proxy.faults();

	let pending = proxy.call("get", ());
	recorder.deliver(json!({"type": "return", "transactionId": "main:0", "value": "first"}));
	recorder.deliver(json!({"type": "return", "transactionId": "main:0", "value": "second"}));

	assert_eq!(pending.await.unwrap(), json!("first"));
	assert!(matches!(faults.try_recv().unwrap(), ProtocolFault::UnknownTransaction { .. }));
}

#[tokio::test]
async fn malformed_envelope_is_reported_as_fault() {
	let (proxy, recorder) = engine(Methods::new());
	let mut faults = proxy.faults();

	recorder.deliver(json!({"type": "event", "transactionId": "x:0"}));

	match faults.try_recv().unwrap() {
		ProtocolFault::MalformedEnvelope { message, .. } => assert_eq!(message["type"], "event"),
		other => panic!("Expected MalformedEnvelope, got {other:?}"),
	}
	assert!(recorder.sent().is_empty());
}

#[tokio::test]
async fn cleanup_unregisters_and_fails_new_calls() {
	let (proxy, recorder) = engine(Methods::new());
	let in_flight = proxy.call("slow", ());

	proxy.cleanup_proxy();
	assert!(proxy.is_closed());
	assert!(!recorder.has_handler());

	let err = proxy.call("other", ()).await.unwrap_err();
	assert!(matches!(err, Error::EngineClosed), "got {err:?}");
	assert_eq!(recorder.sent().len(), 1, "no envelope sent after cleanup");

	// In-flight calls are left pending.
	assert!(tokio::time::timeout(Duration::from_millis(10), in_flight).await.is_err());
	proxy.cleanup_proxy();
}

#[tokio::test]
async fn dropping_the_proxy_releases_the_handler() {
	let (proxy, recorder) = engine(Methods::new());
	assert!(recorder.has_handler());

	drop(proxy);
	assert!(!recorder.has_handler());
}

#[tokio::test]
async fn method_holding_a_weak_proxy_does_not_keep_its_engine_alive() {
	let slot: Arc<std::sync::OnceLock<crate::proxy::WeakProxy>> = Arc::default();
	let captured = Arc::clone(&slot);
	let methods = Methods::new().method("callback", move |()| {
		Ok::<_, Infallible>(captured.get().and_then(|weak| weak.upgrade()).is_some())
	});
	let (proxy, recorder) = engine(methods);
	let _ = slot.set(proxy.downgrade());

	recorder.deliver(json!({"type": "call", "transactionId": "peer:0", "functionName": "callback"}));
	assert_eq!(recorder.sent()[0]["value"], true);

	let weak = proxy.downgrade();
	drop(proxy);
	assert!(weak.upgrade().is_none());
	assert!(!recorder.has_handler());
}

#[tokio::test]
async fn reserved_and_empty_names_fail_at_access() {
	let (proxy, recorder) = engine(Methods::new());

	assert!(matches!(proxy.method(CLEANUP_PROXY), Err(Error::InvalidMethodName(_))));
	assert!(matches!(proxy.method(""), Err(Error::InvalidMethodName(_))));

	let pending = proxy.call(CLEANUP_PROXY, ());
	assert!(pending.transaction_id().is_none());
	assert!(matches!(pending.await, Err(Error::InvalidMethodName(_))));
	assert!(recorder.sent().is_empty());
}

#[test]
fn config_defaults_fault_capacity() {
	let config: EngineConfig = serde_json::from_value(json!({"name": "worker"})).unwrap();
	assert_eq!(config, EngineConfig::new("worker"));
	assert_eq!(config.fault_capacity, 64);
	assert_eq!(EngineConfig::new("w").with_fault_capacity(8).fault_capacity, 8);
}
