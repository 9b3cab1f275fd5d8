//! Typed clients generated with `remote_interface!`.

use std::convert::Infallible;

use collab::{MemoryChannel, Methods, collab};

collab::remote_interface! {
	/// Client for the settings service.
	pub struct SettingsClient {
		fn get(key: String) -> Option<String>;
		fn set_value = "setValue"(key: String, value: String) -> ();
		fn count() -> usize;
	}
}

fn settings_service() -> Methods {
	let store = std::sync::Arc::new(parking_lot::Mutex::new(std::collections::BTreeMap::<String, String>::new()));
	let get_store = store.clone();
	let set_store = store.clone();
	Methods::new()
		.method("get", move |(key,): (String,)| Ok::<_, Infallible>(get_store.lock().get(&key).cloned()))
		.method("setValue", move |(key, value): (String, String)| {
			set_store.lock().insert(key, value);
			Ok::<_, Infallible>(())
		})
		.method("count", move |()| Ok::<_, Infallible>(store.lock().len()))
}

#[tokio::test]
async fn typed_calls_round_trip() {
	let (service_end, client_end) = MemoryChannel::pair();
	let _service = collab("service", settings_service(), service_end);
	let settings = SettingsClient::new(collab("ui", Methods::new(), client_end));

	assert_eq!(settings.get("theme".to_string()).await.unwrap(), None);
	settings.set_value("theme".to_string(), "dark".to_string()).await.unwrap();
	assert_eq!(settings.get("theme".to_string()).await.unwrap().as_deref(), Some("dark"));
	assert_eq!(settings.count().await.unwrap(), 1);
	assert_eq!(settings.proxy().pending(), 0);
}

#[tokio::test]
async fn typed_call_reports_decode_failure() {
	let (service_end, client_end) = MemoryChannel::pair();
	let _service = collab(
		"service",
		Methods::new().method("count", |()| Ok::<_, Infallible>("not a number")),
		service_end,
	);
	let settings = SettingsClient::new(collab("ui", Methods::new(), client_end));

	let err = settings.count().await.unwrap_err();
	assert!(matches!(err, collab::Error::Json(_)), "got {err:?}");
}
