use std::fmt::Display;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::envelope::InvocationEnvelope;
use crate::envelope::InvocationReturn;
use crate::error::SerializationError;
use crate::id::CallId;
use crate::promise::Promise;
use crate::serialization::Serialization;
use crate::serialization::TypeRegistry;
use crate::serialization::TypeTag;

/// Records one outbound call into an [`InvocationEnvelope`].
pub struct InvocationEncoder {
	envelope: InvocationEnvelope,
	serialization: Serialization,
	types: Arc<TypeRegistry>,
}

impl InvocationEncoder {
	pub fn new(serialization: Serialization, types: Arc<TypeRegistry>) -> Self {
		Self {
			envelope: InvocationEnvelope::new(),
			serialization,
			types,
		}
	}

	pub fn record_generic_substitution<T: 'static>(&mut self) {
		let name = self.types.name_of::<T>();
		self.envelope.generic_substitutions.push(name);
	}

	pub fn record_argument<T: Serialize + ?Sized>(&mut self, argument: &T) -> Result<(), SerializationError> {
		let data = self.serialization.serialize(argument)?;
		self.envelope.arguments.push(data);
		Ok(())
	}

	pub fn record_return_type<T: 'static>(&mut self) {
		self.envelope.return_type = Some(self.types.name_of::<T>());
	}

	pub fn record_error_type<E: 'static>(&mut self) {
		self.envelope.error_type = Some(self.types.name_of::<E>());
	}

	pub fn envelope(&self) -> &InvocationEnvelope {
		&self.envelope
	}

	pub fn done_recording(self) -> InvocationEnvelope {
		self.envelope
	}
}

/// Reads one inbound call back out of its envelope.
pub struct InvocationDecoder {
	envelope: InvocationEnvelope,
	index: usize,
	serialization: Serialization,
	types: Arc<TypeRegistry>,
}

impl InvocationDecoder {
	pub fn new(envelope: InvocationEnvelope, serialization: Serialization, types: Arc<TypeRegistry>) -> Self {
		Self {
			envelope,
			index: 0,
			serialization,
			types,
		}
	}

	pub fn target(&self) -> &str {
		self.envelope.target.as_deref().unwrap_or_default()
	}

	pub fn envelope(&self) -> &InvocationEnvelope {
		&self.envelope
	}

	pub fn decode_generic_substitutions(&self) -> Result<Vec<TypeTag>, SerializationError> {
		self.envelope
			.generic_substitutions
			.iter()
			.map(|name| self.types.resolve(name))
			.collect()
	}

	/// Decodes arguments in the order they were recorded.
	pub fn decode_next_argument<T: DeserializeOwned>(&mut self) -> Result<T, SerializationError> {
		let Some(data) = self.envelope.arguments.get(self.index) else {
			return Err(SerializationError::NotEnoughArgumentsEncoded {
				expected: self.index + 1,
				have: self.envelope.arguments.len(),
			});
		};

		let argument = self.serialization.deserialize(data)?;
		self.index += 1;
		Ok(argument)
	}

	pub fn remaining(&self) -> usize {
		self.envelope.arguments.len().saturating_sub(self.index)
	}

	pub fn decode_return_type(&self) -> Result<Option<TypeTag>, SerializationError> {
		self.envelope
			.return_type
			.as_deref()
			.map(|name| self.types.resolve(name))
			.transpose()
	}

	pub fn decode_error_type(&self) -> Result<Option<TypeTag>, SerializationError> {
		self.envelope
			.error_type
			.as_deref()
			.map(|name| self.types.resolve(name))
			.transpose()
	}
}

/// Turns the outcome of an executed call into an [`InvocationReturn`].
///
/// Dropping the handler without answering answers with an empty return.
pub struct ResultHandler {
	call: CallId,
	serialization: Serialization,
	promise: Promise<InvocationReturn>,
	answered: bool,
}

impl ResultHandler {
	pub fn new(call: CallId, serialization: Serialization) -> Self {
		Self {
			call,
			serialization,
			promise: Promise::new(),
			answered: false,
		}
	}

	pub fn call_id(&self) -> CallId {
		self.call
	}

	pub(crate) fn promise(&self) -> Promise<InvocationReturn> {
		self.promise.clone()
	}

	pub fn on_return<T: Serialize + ?Sized>(mut self, value: &T) -> Result<(), SerializationError> {
		match self.serialization.serialize(value) {
			Ok(data) => {
				self.answer(InvocationReturn::returning(data));
				Ok(())
			}
			Err(err) => {
				let data = self.error_data(&err);
				self.answer(InvocationReturn::throwing(data));
				Err(err)
			}
		}
	}

	pub fn on_return_void(mut self) {
		self.answer(InvocationReturn::empty());
	}

	pub fn on_throw<E: Display + ?Sized>(mut self, error: &E) {
		let data = self.error_data(error);
		self.answer(InvocationReturn::throwing(data));
	}

	fn error_data<E: Display + ?Sized>(&self, error: &E) -> bytes::Bytes {
		let message = format!("{error:#}");
		self.serialization
			.serialize(&message)
			.unwrap_or_else(|_| bytes::Bytes::from(message.into_bytes()))
	}

	fn answer(&mut self, result: InvocationReturn) {
		self.answered = true;
		self.promise.fulfill(result);
	}
}

impl Drop for ResultHandler {
	fn drop(&mut self) {
		if !self.answered {
			tracing::warn!(call = %self.call, "Invocation finished without an answer");
			self.promise.fulfill(InvocationReturn::empty());
		}
	}
}

/// An inbound call on its way to an actor.
pub struct Invocation {
	pub decoder: InvocationDecoder,
	pub handler: ResultHandler,
}

impl Invocation {
	pub fn new(decoder: InvocationDecoder, handler: ResultHandler) -> Self {
		Self { decoder, handler }
	}

	pub fn target(&self) -> &str {
		self.decoder.target()
	}

	pub fn call_id(&self) -> CallId {
		self.handler.call_id()
	}

	pub fn split(self) -> (InvocationDecoder, ResultHandler) {
		(self.decoder, self.handler)
	}
}
