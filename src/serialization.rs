use std::any::TypeId;
use std::any::type_name;
use std::collections::HashMap;

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::SerializationError;

/// Codec for argument and return payloads.
///
/// Every value travels wrapped in a one-element sequence, which keeps
/// argument-by-argument decoding symmetric with encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Serialization {
	#[default]
	Json,
	Bincode,
}

impl Serialization {
	pub fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes, SerializationError> {
		// a slice, not an array: arrays encode as tuples without a length
		let wrapped: &[&T] = &[value];
		let encoded = match self {
			Serialization::Json => serde_json::to_vec(&wrapped).map_err(|err| err.to_string()),
			Serialization::Bincode => bincode::serialize(&wrapped).map_err(|err| err.to_string()),
		};

		encoded
			.map(Bytes::from)
			.map_err(|reason| SerializationError::Codec {
				hint: type_name::<T>().to_string(),
				reason,
			})
	}

	pub fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, SerializationError> {
		let decoded: Result<Vec<T>, String> = match self {
			Serialization::Json => serde_json::from_slice(data).map_err(|err| err.to_string()),
			Serialization::Bincode => bincode::deserialize(data).map_err(|err| err.to_string()),
		};

		let mut values = decoded.map_err(|reason| SerializationError::Codec {
			hint: type_name::<T>().to_string(),
			reason,
		})?;

		if values.len() != 1 {
			return Err(SerializationError::NotAbleToDeserialize {
				hint: Some(type_name::<T>().to_string()),
			});
		}

		Ok(values.remove(0))
	}
}

/// A resolved type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTag {
	name: String,
	id: TypeId,
}

impl TypeTag {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn type_id(&self) -> TypeId {
		self.id
	}

	pub fn is<T: 'static>(&self) -> bool {
		self.id == TypeId::of::<T>()
	}
}

/// Canonical names for the types that appear in invocation metadata.
///
/// Built once at startup and then shared read-only. Names are only used for
/// generic substitutions, return types and error types, never for payloads.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
	by_name: HashMap<String, TypeTag>,
	by_id: HashMap<TypeId, String>,
}

impl Default for TypeRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl TypeRegistry {
	pub fn new() -> Self {
		let mut registry = Self::empty();
		registry
			.register::<bool>("bool")
			.register::<i32>("i32")
			.register::<i64>("i64")
			.register::<u32>("u32")
			.register::<u64>("u64")
			.register::<f64>("f64")
			.register::<String>("String")
			.register::<()>("()");
		registry
	}

	pub fn empty() -> Self {
		Self {
			by_name: HashMap::new(),
			by_id: HashMap::new(),
		}
	}

	pub fn register<T: 'static>(&mut self, name: impl Into<String>) -> &mut Self {
		let name = name.into();
		let id = TypeId::of::<T>();

		if let Some(previous) = self.by_id.insert(id, name.clone()) {
			self.by_name.remove(&previous);
		}
		self.by_name.insert(name.clone(), TypeTag { name, id });
		self
	}

	/// The registered name of `T`, or its compiler-provided name.
	pub fn name_of<T: 'static>(&self) -> String {
		self.by_id
			.get(&TypeId::of::<T>())
			.cloned()
			.unwrap_or_else(|| type_name::<T>().to_string())
	}

	pub fn resolve(&self, name: &str) -> Result<TypeTag, SerializationError> {
		self.by_name
			.get(name)
			.cloned()
			.ok_or_else(|| SerializationError::NotAbleToDeserialize {
				hint: Some(name.to_string()),
			})
	}

	pub fn contains(&self, name: &str) -> bool {
		self.by_name.contains_key(name)
	}
}
