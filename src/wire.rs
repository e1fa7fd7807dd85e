//! Structured key-value containers exchanged over a connection.
//!
//! Connections carry containers rather than raw bytes. Accessors on
//! [`Dictionary`] return `None` both for a missing key and for a value of the
//! wrong type, so callers validate shape in one place.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::id::ActorId;
use crate::id::CallId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
	Bool(bool),
	Int64(i64),
	String(String),
	Data(Bytes),
	Uuid(Uuid),
	Array(Vec<Value>),
	Dictionary(Dictionary),
}

impl Value {
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_int64(&self) -> Option<i64> {
		match self {
			Value::Int64(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_data(&self) -> Option<&Bytes> {
		match self {
			Value::Data(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_uuid(&self) -> Option<Uuid> {
		match self {
			Value::Uuid(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&[Value]> {
		match self {
			Value::Array(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_dictionary(&self) -> Option<&Dictionary> {
		match self {
			Value::Dictionary(value) => Some(value),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dictionary(BTreeMap<String, Value>);

impl Dictionary {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.0.insert(key.into(), value.into());
	}

	/// Inserts `value`, or removes `key` when there is nothing to store.
	pub fn set<V: Into<Value>>(&mut self, key: impl Into<String>, value: Option<V>) {
		let key = key.into();
		match value {
			Some(value) => {
				self.0.insert(key, value.into());
			}
			None => {
				self.0.remove(&key);
			}
		}
	}

	pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.insert(key, value);
		self
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.0.remove(key)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	pub fn bool(&self, key: &str) -> Option<bool> {
		self.get(key).and_then(Value::as_bool)
	}

	pub fn int64(&self, key: &str) -> Option<i64> {
		self.get(key).and_then(Value::as_int64)
	}

	pub fn string(&self, key: &str) -> Option<&str> {
		self.get(key).and_then(Value::as_str)
	}

	pub fn data(&self, key: &str) -> Option<&Bytes> {
		self.get(key).and_then(Value::as_data)
	}

	pub fn uuid(&self, key: &str) -> Option<Uuid> {
		self.get(key).and_then(Value::as_uuid)
	}

	pub fn array(&self, key: &str) -> Option<&[Value]> {
		self.get(key).and_then(Value::as_array)
	}

	pub fn dictionary(&self, key: &str) -> Option<&Dictionary> {
		self.get(key).and_then(Value::as_dictionary)
	}
}

impl FromIterator<(String, Value)> for Dictionary {
	fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Int64(value)
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::String(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::String(value.to_string())
	}
}

impl From<Bytes> for Value {
	fn from(value: Bytes) -> Self {
		Value::Data(value)
	}
}

impl From<Vec<u8>> for Value {
	fn from(value: Vec<u8>) -> Self {
		Value::Data(Bytes::from(value))
	}
}

impl From<Uuid> for Value {
	fn from(value: Uuid) -> Self {
		Value::Uuid(value)
	}
}

impl From<ActorId> for Value {
	fn from(value: ActorId) -> Self {
		Value::Uuid(value.as_uuid())
	}
}

impl From<CallId> for Value {
	fn from(value: CallId) -> Self {
		Value::Uuid(value.as_uuid())
	}
}

impl From<Vec<Value>> for Value {
	fn from(value: Vec<Value>) -> Self {
		Value::Array(value)
	}
}

impl From<Dictionary> for Value {
	fn from(value: Dictionary) -> Self {
		Value::Dictionary(value)
	}
}
