//! Conversions between Rust values and positional JSON argument lists.
//!
//! [`IntoArgs`] is used on the calling side to build the `args` of a `call`
//! envelope, [`FromArgs`] on the receiving side to decode them for a method.
//! Both are implemented for tuples of up to six elements.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Converts a value into the positional argument list of a call.
pub trait IntoArgs {
	fn into_args(self) -> serde_json::Result<Vec<Value>>;
}

/// Decodes the positional argument list of an incoming call.
///
/// Missing trailing arguments decode from `null`, so `Option<T>` parameters
/// may be left off by the caller. Surplus arguments are ignored.
pub trait FromArgs: Sized {
	fn from_args(args: Vec<Value>) -> Result<Self, String>;
}

/// Undecoded positional arguments with typed accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Value>);

impl Args {
	pub fn new(args: Vec<Value>) -> Self {
		Self(args)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Raw JSON of the argument at `index`.
	pub fn raw(&self, index: usize) -> Option<&Value> {
		self.0.get(index)
	}

	/// Decodes the argument at `index`, treating a missing one as `null`.
	pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, String> {
		decode_arg(self.0.get(index).cloned(), index)
	}

	pub fn into_inner(self) -> Vec<Value> {
		self.0
	}
}

fn decode_arg<T: DeserializeOwned>(value: Option<Value>, index: usize) -> Result<T, String> {
	serde_json::from_value(value.unwrap_or(Value::Null)).map_err(|e| format!("invalid argument {index}: {e}"))
}

fn next_arg<T: DeserializeOwned>(args: &mut std::vec::IntoIter<Value>, position: &mut usize) -> Result<T, String> {
	let index = *position;
	*position += 1;
	decode_arg(args.next(), index)
}

impl IntoArgs for () {
	fn into_args(self) -> serde_json::Result<Vec<Value>> {
		Ok(Vec::new())
	}
}

impl IntoArgs for Vec<Value> {
	fn into_args(self) -> serde_json::Result<Vec<Value>> {
		Ok(self)
	}
}

impl IntoArgs for Args {
	fn into_args(self) -> serde_json::Result<Vec<Value>> {
		Ok(self.0)
	}
}

impl FromArgs for () {
	fn from_args(_args: Vec<Value>) -> Result<Self, String> {
		Ok(())
	}
}

impl FromArgs for Vec<Value> {
	fn from_args(args: Vec<Value>) -> Result<Self, String> {
		Ok(args)
	}
}

impl FromArgs for Args {
	fn from_args(args: Vec<Value>) -> Result<Self, String> {
		Ok(Args(args))
	}
}

macro_rules! impl_tuple_args {
	($($ty:ident $var:ident),+) => {
		impl<$($ty: Serialize),+> IntoArgs for ($($ty,)+) {
			fn into_args(self) -> serde_json::Result<Vec<Value>> {
				let ($($var,)+) = self;
				Ok(vec![$(serde_json::to_value($var)?),+])
			}
		}

		impl<$($ty: DeserializeOwned),+> FromArgs for ($($ty,)+) {
			fn from_args(args: Vec<Value>) -> Result<Self, String> {
				let mut args = args.into_iter();
				let mut position = 0;
				Ok(($(next_arg::<$ty>(&mut args, &mut position)?,)+))
			}
		}
	};
}

impl_tuple_args!(A a);
impl_tuple_args!(A a, B b);
impl_tuple_args!(A a, B b, C c);
impl_tuple_args!(A a, B b, C c, D d);
impl_tuple_args!(A a, B b, C c, D d, E e);
impl_tuple_args!(A a, B b, C c, D d, E e, F f);
