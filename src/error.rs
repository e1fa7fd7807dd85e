use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::envelope::InvocationEnvelope;
use crate::envelope::InvocationReturn;
use crate::id::ActorId;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
	#[error("Not able to deserialize {}", hint.as_deref().unwrap_or("<unknown>"))]
	NotAbleToDeserialize { hint: Option<String> },

	#[error("Malformed envelope: bad `{0}` field")]
	MalformedEnvelope(&'static str),

	#[error("Not enough arguments encoded: expected {expected}, have {have}")]
	NotEnoughArgumentsEncoded { expected: usize, have: usize },

	#[error("Codec failure for {hint}: {reason}")]
	Codec { hint: String, reason: String },
}

/// A received container that is not a well-formed command.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidCommand {
	#[error("Command kind is missing")]
	MissingKind,

	#[error("Command correlation id is missing")]
	MissingId,

	#[error("Command actor id is missing")]
	MissingActor,

	#[error("Invocation command carries no envelope")]
	MissingEnvelope,

	#[error("Invocation return command carries no return")]
	MissingReturn,

	#[error(transparent)]
	Malformed(#[from] SerializationError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
	#[error("Channel is closed")]
	Closed,

	#[error("Service {0} is not reachable")]
	ServiceNotFound(String),

	#[error("Service {0} already has a listener")]
	ServiceInUse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemErrorKind {
	/// The peer answered with neither a value nor an error.
	UnexpectedlyEmptyInvocationReturn,
	/// The remote method failed and reported an error.
	InvocationThrew,
}

/// Outcome of a remote call that did not produce a value.
#[derive(Debug, Clone)]
pub struct SystemError {
	pub kind: SystemErrorKind,
	pub actor_id: Option<ActorId>,
	pub invocation: Option<InvocationEnvelope>,
	pub invocation_return: Option<InvocationReturn>,
	/// Error message reported by the peer, when it could be decoded.
	pub message: Option<String>,
}

impl SystemError {
	pub fn is_thrown(&self) -> bool {
		self.kind == SystemErrorKind::InvocationThrew
	}

	pub fn is_empty_return(&self) -> bool {
		self.kind == SystemErrorKind::UnexpectedlyEmptyInvocationReturn
	}
}

impl fmt::Display for SystemError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.kind {
			SystemErrorKind::InvocationThrew => write!(f, "Remote invocation threw")?,
			SystemErrorKind::UnexpectedlyEmptyInvocationReturn => {
				write!(f, "Remote invocation returned nothing")?
			}
		}

		if let Some(target) = self.invocation.as_ref().and_then(|i| i.target.as_deref()) {
			write!(f, " in {target}")?;
		}

		if let Some(actor) = self.actor_id {
			write!(f, " on actor {actor}")?;
		}

		if let Some(message) = &self.message {
			write!(f, ": {message}")?;
		}

		Ok(())
	}
}

impl std::error::Error for SystemError {}

#[derive(thiserror::Error, Debug, Clone)]
pub enum RpcError {
	#[error(transparent)]
	System(#[from] SystemError),

	#[error(transparent)]
	Serialization(#[from] SerializationError),

	#[error(transparent)]
	Channel(#[from] ChannelError),

	#[error("Call to actor {actor} timed out after {after:?}")]
	Timeout { actor: ActorId, after: Duration },

	#[error("Actor {0} is no longer running")]
	ActorStopped(ActorId),

	#[error("Unknown actor {0}")]
	UnknownActor(ActorId),

	#[error("Actor {actor} has no method {target}")]
	UnknownTarget { actor: ActorId, target: String },

	#[error("Actor {id} failed to initialize: {reason}")]
	Init { id: ActorId, reason: String },
}

impl RpcError {
	pub fn system(&self) -> Option<&SystemError> {
		match self {
			RpcError::System(err) => Some(err),
			_ => None,
		}
	}
}
