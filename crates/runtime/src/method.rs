//! Method table: the locally implemented functions a side exposes.
//!
//! A [`Methods`] value is built once and handed to the engine, after which it
//! is the complete and fixed set of operations the peer may invoke.
//!
//! ```ignore
//! let methods = Methods::new()
//!     .method("add", |(x, y): (i64, i64)| Ok::<_, Infallible>(x + y))
//!     .method_async("slow", |()| async {
//!         tokio::time::sleep(Duration::from_millis(10)).await;
//!         Ok::<_, Infallible>("done")
//!     });
//! ```

use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::args::FromArgs;
use crate::proxy::CLEANUP_PROXY;

/// Future produced by an asynchronous method, already reduced to the wire outcome.
pub type MethodFuture = BoxFuture<'static, Result<Value, String>>;

/// What invoking a method produced.
///
/// The dispatcher sends an [`Immediate`](Self::Immediate) result straight
/// back and awaits a [`Deferred`](Self::Deferred) one before replying. The
/// caller cannot tell the two apart.
pub enum MethodResult {
	Immediate(Result<Value, String>),
	Deferred(MethodFuture),
}

impl fmt::Debug for MethodResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MethodResult::Immediate(outcome) => f.debug_tuple("Immediate").field(outcome).finish(),
			MethodResult::Deferred(_) => f.write_str("Deferred(..)"),
		}
	}
}

pub(crate) type MethodFn = Arc<dyn Fn(Vec<Value>) -> MethodResult + Send + Sync>;

/// Builder and storage for a side's method table.
#[derive(Default, Clone)]
pub struct Methods {
	table: IndexMap<String, MethodFn>,
}

impl Methods {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a synchronous method.
	///
	/// Arguments are decoded with [`FromArgs`]; a decode failure, the
	/// method's own error, or a result that fails to serialize all become the
	/// error string of the `return` envelope.
	pub fn method<A, R, E, F>(self, name: impl Into<String>, f: F) -> Self
	where
		A: FromArgs + 'static,
		R: Serialize + 'static,
		E: Display + 'static,
		F: Fn(A) -> Result<R, E> + Send + Sync + 'static,
	{
		let name = name.into();
		let label = name.clone();
		self.insert(
			name,
			Arc::new(move |args| {
				let outcome = A::from_args(args)
					.map_err(|e| format!("{label}: {e}"))
					.and_then(|args| f(args).map_err(|e| e.to_string()))
					.and_then(encode_value);
				MethodResult::Immediate(outcome)
			}),
		)
	}

	/// Registers an asynchronous method. The peer receives the value the
	/// returned future settles to, never the future itself.
	pub fn method_async<A, R, E, F, Fut>(self, name: impl Into<String>, f: F) -> Self
	where
		A: FromArgs + 'static,
		R: Serialize + 'static,
		E: Display + 'static,
		F: Fn(A) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<R, E>> + Send + 'static,
	{
		let name = name.into();
		let label = name.clone();
		self.insert(
			name,
			Arc::new(move |args| match A::from_args(args) {
				Ok(args) => {
					let pending = f(args);
					MethodResult::Deferred(Box::pin(async move { pending.await.map_err(|e| e.to_string()).and_then(encode_value) }))
				}
				Err(e) => MethodResult::Immediate(Err(format!("{label}: {e}"))),
			}),
		)
	}

	/// Registers a method that works on raw JSON arguments and picks its own
	/// [`MethodResult`] variant.
	pub fn raw<F>(self, name: impl Into<String>, f: F) -> Self
	where
		F: Fn(Vec<Value>) -> MethodResult + Send + Sync + 'static,
	{
		self.insert(name.into(), Arc::new(f))
	}

	fn insert(mut self, name: String, method: MethodFn) -> Self {
		if name == CLEANUP_PROXY {
			tracing::warn!(name = %name, "refusing to register reserved method name");
			return self;
		}
		if self.table.insert(name.clone(), method).is_some() {
			tracing::warn!(name = %name, "method registered twice, keeping the later one");
		}
		self
	}

	pub(crate) fn get(&self, name: &str) -> Option<&MethodFn> {
		self.table.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.table.contains_key(name)
	}

	/// Method names in registration order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.table.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.table.len()
	}

	pub fn is_empty(&self) -> bool {
		self.table.is_empty()
	}
}

impl fmt::Debug for Methods {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Methods").field("names", &self.table.keys().collect::<Vec<_>>()).finish()
	}
}

fn encode_value<R: Serialize>(value: R) -> Result<Value, String> {
	serde_json::to_value(value).map_err(|e| format!("result is not serializable: {e}"))
}

#[cfg(test)]
mod tests {
	use std::convert::Infallible;

	use serde_json::json;

	use super::*;

	fn run(methods: &Methods, name: &str, args: Vec<Value>) -> MethodResult {
		(methods.get(name).expect("method registered"))(args)
	}

	#[test]
	fn sync_method_is_immediate() {
		let methods = Methods::new().method("add", |(x, y): (i64, i64)| Ok::<_, Infallible>(x + y));
		match run(&methods, "add", vec![json!(2), json!(3)]) {
			MethodResult::Immediate(outcome) => assert_eq!(outcome, Ok(json!(5))),
			other => panic!("Expected Immediate, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn async_method_is_deferred() {
		let methods = Methods::new().method_async("greet", |(name,): (String,)| async move { Ok::<_, Infallible>(format!("hi {name}")) });
		match run(&methods, "greet", vec![json!("ann")]) {
			MethodResult::Deferred(pending) => assert_eq!(pending.await, Ok(json!("hi ann"))),
			other => panic!("Expected Deferred, got {other:?}"),
		}
	}

	#[test]
	fn method_error_becomes_message() {
		let methods = Methods::new().method("div", |(x, y): (i64, i64)| if y == 0 { Err("division by zero") } else { Ok(x / y) });
		match run(&methods, "div", vec![json!(1), json!(0)]) {
			MethodResult::Immediate(outcome) => assert_eq!(outcome, Err("division by zero".to_string())),
			other => panic!("Expected Immediate, got {other:?}"),
		}
	}

	#[test]
	fn bad_arguments_fail_before_invocation() {
		let methods = Methods::new().method_async("greet", |(name,): (String,)| async move { Ok::<_, Infallible>(name) });
		match run(&methods, "greet", vec![json!(42)]) {
			MethodResult::Immediate(Err(message)) => assert!(message.starts_with("greet: invalid argument 0"), "got {message}"),
			other => panic!("Expected Immediate error, got {other:?}"),
		}
	}

	#[test]
	fn reserved_name_is_refused() {
		let methods = Methods::new().method(CLEANUP_PROXY, |()| Ok::<_, Infallible>(()));
		assert!(methods.is_empty());
	}

	#[test]
	fn duplicate_name_keeps_later_registration() {
		let methods = Methods::new()
			.method("v", |()| Ok::<_, Infallible>(1))
			.method("v", |()| Ok::<_, Infallible>(2))
			.method("w", |()| Ok::<_, Infallible>(3));
		assert_eq!(methods.names().collect::<Vec<_>>(), vec!["v", "w"]);
		match run(&methods, "v", vec![]) {
			MethodResult::Immediate(outcome) => assert_eq!(outcome, Ok(json!(2))),
			other => panic!("Expected Immediate, got {other:?}"),
		}
	}
}
