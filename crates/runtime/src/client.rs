//! Typed client generation for a known remote interface.

/// Declares a typed client over a [`Proxy`](crate::Proxy).
///
/// Each declared method becomes a forwarding function that sends a `call`
/// envelope with its arguments in order and returns a
/// [`TypedCall`](crate::TypedCall) of the declared return type. The wire
/// name defaults to the Rust identifier; `= "name"` overrides it for peers
/// with a different naming convention.
///
/// ```ignore
/// collab::remote_interface! {
///     /// Methods the worker exposes.
///     pub struct WorkerClient {
///         fn add(x: i64, y: i64) -> i64;
///         fn render_page = "renderPage"(url: String) -> String;
///         fn shutdown() -> ();
///     }
/// }
///
/// let worker = WorkerClient::new(proxy);
/// assert_eq!(worker.add(2, 3).await?, 5);
/// ```
#[macro_export]
macro_rules! remote_interface {
	(
		$(#[$meta:meta])*
		$vis:vis struct $client:ident {
			$(
				$(#[$fn_meta:meta])*
				fn $method:ident $(= $wire:literal)? ( $($arg:ident : $ty:ty),* $(,)? ) -> $ret:ty;
			)*
		}
	) => {
		$(#[$meta])*
		#[derive(Clone, Debug)]
		$vis struct $client {
			proxy: $crate::Proxy,
		}

		impl $client {
			$vis fn new(proxy: $crate::Proxy) -> Self {
				Self { proxy }
			}

			/// Underlying untyped proxy.
			$vis fn proxy(&self) -> &$crate::Proxy {
				&self.proxy
			}

			$(
				$(#[$fn_meta])*
				$vis fn $method(&self, $($arg: $ty),*) -> $crate::TypedCall<$ret> {
					self.proxy.invoke::<$ret>($crate::__wire_name!($method $(, $wire)?), ($($arg,)*))
				}
			)*
		}
	};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __wire_name {
	($method:ident) => {
		stringify!($method)
	};
	($method:ident, $wire:literal) => {
		$wire
	};
}
