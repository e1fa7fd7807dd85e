use bytes::Bytes;

use crate::error::SerializationError;
use crate::wire::Dictionary;
use crate::wire::Value;

const TARGET: &str = "target";
const GENERICS: &str = "generics";
const ARGUMENTS: &str = "arguments";
const RETURN_TYPE: &str = "returnType";
const ERROR_TYPE: &str = "errorType";

const RETURN_DATA: &str = "returnData";
const ERROR_DATA: &str = "errorData";

/// One remote call: its target, arguments and type metadata.
///
/// Arguments keep call-site order and are consumed in the same order on the
/// receiving side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationEnvelope {
	pub target: Option<String>,
	pub generic_substitutions: Vec<String>,
	pub arguments: Vec<Bytes>,
	pub return_type: Option<String>,
	pub error_type: Option<String>,
}

impl InvocationEnvelope {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn encode(&self) -> Dictionary {
		let mut dictionary = Dictionary::new();
		dictionary.set(TARGET, self.target.clone());
		dictionary.insert(
			GENERICS,
			self.generic_substitutions
				.iter()
				.map(|name| Value::from(name.as_str()))
				.collect::<Vec<_>>(),
		);
		dictionary.insert(
			ARGUMENTS,
			self.arguments.iter().cloned().map(Value::Data).collect::<Vec<_>>(),
		);
		dictionary.set(RETURN_TYPE, self.return_type.clone());
		dictionary.set(ERROR_TYPE, self.error_type.clone());
		dictionary
	}

	/// Absent fields decode as empty; present fields of the wrong shape are
	/// rejected.
	pub fn decode(dictionary: &Dictionary) -> Result<Self, SerializationError> {
		let generic_substitutions = match dictionary.get(GENERICS) {
			None => Vec::new(),
			Some(value) => value
				.as_array()
				.ok_or(SerializationError::MalformedEnvelope(GENERICS))?
				.iter()
				.map(|name| name.as_str().map(str::to_string))
				.collect::<Option<Vec<_>>>()
				.ok_or(SerializationError::MalformedEnvelope(GENERICS))?,
		};

		let arguments = match dictionary.get(ARGUMENTS) {
			None => Vec::new(),
			Some(value) => value
				.as_array()
				.ok_or(SerializationError::MalformedEnvelope(ARGUMENTS))?
				.iter()
				.map(|data| data.as_data().cloned())
				.collect::<Option<Vec<_>>>()
				.ok_or(SerializationError::MalformedEnvelope(ARGUMENTS))?,
		};

		Ok(Self {
			target: optional_string(dictionary, TARGET)?,
			generic_substitutions,
			arguments,
			return_type: optional_string(dictionary, RETURN_TYPE)?,
			error_type: optional_string(dictionary, ERROR_TYPE)?,
		})
	}
}

fn optional_string(
	dictionary: &Dictionary,
	key: &'static str,
) -> Result<Option<String>, SerializationError> {
	match dictionary.get(key) {
		None => Ok(None),
		Some(value) => value
			.as_str()
			.map(|value| Some(value.to_string()))
			.ok_or(SerializationError::MalformedEnvelope(key)),
	}
}

fn optional_data(
	dictionary: &Dictionary,
	key: &'static str,
) -> Result<Option<Bytes>, SerializationError> {
	match dictionary.get(key) {
		None => Ok(None),
		Some(value) => value
			.as_data()
			.map(|value| Some(value.clone()))
			.ok_or(SerializationError::MalformedEnvelope(key)),
	}
}

/// Outcome of one invocation. Carries at most one payload; carrying none is a
/// protocol violation the calling side reports as such.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationReturn {
	pub return_data: Option<Bytes>,
	pub error_data: Option<Bytes>,
}

impl InvocationReturn {
	pub fn empty() -> Self {
		Self::default()
	}

	pub fn returning(data: Bytes) -> Self {
		Self {
			return_data: Some(data),
			error_data: None,
		}
	}

	pub fn throwing(data: Bytes) -> Self {
		Self {
			return_data: None,
			error_data: Some(data),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.return_data.is_none() && self.error_data.is_none()
	}

	pub fn encode(&self) -> Dictionary {
		let mut dictionary = Dictionary::new();
		dictionary.set(RETURN_DATA, self.return_data.clone());
		dictionary.set(ERROR_DATA, self.error_data.clone());
		dictionary
	}

	pub fn decode(dictionary: &Dictionary) -> Result<Self, SerializationError> {
		let decoded = Self {
			return_data: optional_data(dictionary, RETURN_DATA)?,
			error_data: optional_data(dictionary, ERROR_DATA)?,
		};

		if decoded.return_data.is_some() && decoded.error_data.is_some() {
			return Err(SerializationError::MalformedEnvelope(ERROR_DATA));
		}

		Ok(decoded)
	}
}
