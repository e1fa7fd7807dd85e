use std::marker::PhantomData;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::envelope::InvocationEnvelope;
use crate::envelope::InvocationReturn;
use crate::error::RpcError;
use crate::error::SystemError;
use crate::error::SystemErrorKind;
use crate::handler::Method;
use crate::id::ActorId;
use crate::id::CallId;
use crate::promise::Promise;
use crate::remote::RemoteReceptionist;
use crate::serialization::Serialization;
use crate::system::ActorSystem;

/// Handle returned for an outbound call - allows waiting for the reply or
/// ignoring it.
pub struct CallHandle<R> {
	state: Result<InFlight, RpcError>,
	timeout: Option<Duration>,
	_reply: PhantomData<fn() -> R>,
}

struct InFlight {
	receptionist: RemoteReceptionist,
	serialization: Serialization,
	id: CallId,
	actor: ActorId,
	envelope: InvocationEnvelope,
	promise: Promise<InvocationReturn>,
}

impl<R> CallHandle<R> {
	pub(crate) fn in_flight(
		receptionist: RemoteReceptionist,
		serialization: Serialization,
		id: CallId,
		actor: ActorId,
		envelope: InvocationEnvelope,
		promise: Promise<InvocationReturn>,
	) -> Self {
		Self {
			state: Ok(InFlight {
				receptionist,
				serialization,
				id,
				actor,
				envelope,
				promise,
			}),
			timeout: None,
			_reply: PhantomData,
		}
	}

	/// A call that could not be sent at all.
	pub(crate) fn failed(error: RpcError) -> Self {
		Self {
			state: Err(error),
			timeout: None,
			_reply: PhantomData,
		}
	}

	/// Set timeout for the reply (chainable)
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn call_id(&self) -> Option<CallId> {
		self.state.as_ref().ok().map(|call| call.id)
	}

	pub fn was_sent(&self) -> bool {
		self.state.is_ok()
	}

	/// Wait for the reply and decode it.
	pub async fn reply(self) -> Result<R, RpcError>
	where
		R: DeserializeOwned,
	{
		let (call, result) = self.wait().await?;
		call.decode(result)
	}

	/// Wait for a call that returns nothing. Only a thrown return fails.
	pub async fn reply_void(self) -> Result<(), RpcError> {
		let (call, result) = self.wait().await?;
		match result.error_data {
			Some(_) => Err(call.failure(result).into()),
			None => Ok(()),
		}
	}

	/// The reply, if it has already arrived.
	pub fn try_reply(&self) -> Result<Option<R>, RpcError>
	where
		R: DeserializeOwned,
	{
		let call = self.state.as_ref().map_err(Clone::clone)?;
		match call.promise.peek() {
			Some(result) => call.decode(result).map(Some),
			None => Ok(None),
		}
	}

	/// Fire and forget. A reply that still arrives is dropped.
	pub fn forget(self) {
		if let Ok(call) = self.state {
			call.receptionist.abandon(call.id);
		}
	}

	async fn wait(self) -> Result<(InFlight, InvocationReturn), RpcError> {
		let call = self.state?;

		let result = match self.timeout {
			Some(after) => match tokio::time::timeout(after, call.promise.value()).await {
				Ok(result) => result,
				Err(_) => {
					call.receptionist.abandon(call.id);
					tracing::debug!(call = %call.id, actor = %call.actor, "Call timed out");
					return Err(RpcError::Timeout {
						actor: call.actor,
						after,
					});
				}
			},
			None => call.promise.value().await,
		};

		Ok((call, result))
	}
}

impl InFlight {
	fn decode<R: DeserializeOwned>(&self, result: InvocationReturn) -> Result<R, RpcError> {
		match &result.return_data {
			Some(data) => Ok(self.serialization.deserialize(data)?),
			None => Err(self.failure(result).into()),
		}
	}

	fn failure(&self, result: InvocationReturn) -> SystemError {
		let (kind, message) = match &result.error_data {
			Some(data) => (
				SystemErrorKind::InvocationThrew,
				self.serialization.deserialize::<String>(data).ok(),
			),
			None => (SystemErrorKind::UnexpectedlyEmptyInvocationReturn, None),
		};

		SystemError {
			kind,
			actor_id: Some(self.actor),
			invocation: Some(self.envelope.clone()),
			invocation_return: Some(result),
			message,
		}
	}
}

/// An actor on the other side of a connection.
#[derive(Debug, Clone)]
pub struct RemoteRef {
	id: ActorId,
	system: ActorSystem,
}

impl RemoteRef {
	pub(crate) fn new(id: ActorId, system: ActorSystem) -> Self {
		Self { id, system }
	}

	pub fn id(&self) -> ActorId {
		self.id
	}

	pub fn system(&self) -> &ActorSystem {
		&self.system
	}

	pub fn call<M: Method>(&self, method: &M) -> CallHandle<M::Reply> {
		self.system.call(self.id, method)
	}

	/// Calls `method` and waits for its reply.
	pub async fn ask<M: Method>(&self, method: &M) -> Result<M::Reply, RpcError> {
		self.call(method).reply().await
	}
}
