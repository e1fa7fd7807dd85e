//! The tagged unit placed on the wire.
//!
//! ```text
//! command  : int    0 = invocation, 1 = invocation return
//! uuid     : uuid   correlation id
//! actor    : uuid   target actor
//! envelope : dict   (invocation)
//! return   : dict   (invocation return)
//! ```

use crate::envelope::InvocationEnvelope;
use crate::envelope::InvocationReturn;
use crate::error::InvalidCommand;
use crate::id::ActorId;
use crate::id::CallId;
use crate::wire::Dictionary;

const COMMAND: &str = "command";
const UUID: &str = "uuid";
const ACTOR: &str = "actor";
const ENVELOPE: &str = "envelope";
const RETURN: &str = "return";
const ERROR: &str = "error";

const INVALID: &str = "invalid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
	Invocation,
	InvocationReturn,
	/// A kind this side does not understand. Such commands are ignored.
	Other(i64),
}

impl CommandKind {
	pub fn from_code(code: i64) -> Self {
		match code {
			0 => CommandKind::Invocation,
			1 => CommandKind::InvocationReturn,
			other => CommandKind::Other(other),
		}
	}

	pub fn code(self) -> i64 {
		match self {
			CommandKind::Invocation => 0,
			CommandKind::InvocationReturn => 1,
			CommandKind::Other(code) => code,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
	Invocation {
		id: CallId,
		actor: ActorId,
		envelope: InvocationEnvelope,
	},
	Return {
		id: CallId,
		actor: ActorId,
		result: InvocationReturn,
	},
	Other {
		kind: i64,
		id: CallId,
		actor: ActorId,
	},
}

impl Command {
	pub fn kind(&self) -> CommandKind {
		match self {
			Command::Invocation { .. } => CommandKind::Invocation,
			Command::Return { .. } => CommandKind::InvocationReturn,
			Command::Other { kind, .. } => CommandKind::Other(*kind),
		}
	}

	pub fn id(&self) -> CallId {
		match self {
			Command::Invocation { id, .. } | Command::Return { id, .. } | Command::Other { id, .. } => {
				*id
			}
		}
	}

	pub fn actor(&self) -> ActorId {
		match self {
			Command::Invocation { actor, .. }
			| Command::Return { actor, .. }
			| Command::Other { actor, .. } => *actor,
		}
	}

	pub fn encode(&self) -> Dictionary {
		let mut message = Dictionary::new()
			.with(COMMAND, self.kind().code())
			.with(UUID, self.id())
			.with(ACTOR, self.actor());

		match self {
			Command::Invocation { envelope, .. } => message.insert(ENVELOPE, envelope.encode()),
			Command::Return { result, .. } => message.insert(RETURN, result.encode()),
			Command::Other { .. } => {}
		}

		message
	}

	/// Validates a received container. An invocation must carry an envelope
	/// with a target and an invocation return must carry a return.
	pub fn decode(message: &Dictionary) -> Result<Self, InvalidCommand> {
		let kind = message
			.int64(COMMAND)
			.map(CommandKind::from_code)
			.ok_or(InvalidCommand::MissingKind)?;
		let id = message
			.uuid(UUID)
			.map(CallId::from_uuid)
			.ok_or(InvalidCommand::MissingId)?;
		let actor = message
			.uuid(ACTOR)
			.map(ActorId::from_uuid)
			.ok_or(InvalidCommand::MissingActor)?;

		match kind {
			CommandKind::Invocation => {
				let envelope = message
					.dictionary(ENVELOPE)
					.ok_or(InvalidCommand::MissingEnvelope)?;
				let envelope = InvocationEnvelope::decode(envelope)?;
				if envelope.target.is_none() {
					return Err(InvalidCommand::MissingEnvelope);
				}
				Ok(Command::Invocation { id, actor, envelope })
			}
			CommandKind::InvocationReturn => {
				let result = message
					.dictionary(RETURN)
					.ok_or(InvalidCommand::MissingReturn)?;
				let result = InvocationReturn::decode(result)?;
				Ok(Command::Return { id, actor, result })
			}
			CommandKind::Other(kind) => Ok(Command::Other { kind, id, actor }),
		}
	}

	/// The kind and correlation id of a container, as far as they can be read.
	pub(crate) fn peek(message: &Dictionary) -> (Option<CommandKind>, Option<CallId>) {
		(
			message.int64(COMMAND).map(CommandKind::from_code),
			message.uuid(UUID).map(CallId::from_uuid),
		)
	}
}

/// Reply sent for traffic that is not a well-formed command.
///
/// Rejections are never rejected in turn, so two peers can not bounce
/// garbage between each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
	pub id: Option<CallId>,
	pub reason: String,
}

impl Rejection {
	/// Rejects `message`, echoing its correlation id when it has one.
	pub fn of(message: &Dictionary) -> Self {
		Self {
			id: message.uuid(UUID).map(CallId::from_uuid),
			reason: INVALID.to_string(),
		}
	}

	pub fn encode(&self) -> Dictionary {
		let mut message = Dictionary::new().with(ERROR, self.reason.as_str());
		message.set(UUID, self.id);
		message
	}

	/// Reads a rejection. A container carrying a command kind is a command,
	/// whatever other keys it has.
	pub fn decode(message: &Dictionary) -> Option<Self> {
		if message.contains_key(COMMAND) {
			return None;
		}

		let reason = message.get(ERROR)?;
		Some(Self {
			id: message.uuid(UUID).map(CallId::from_uuid),
			reason: reason.as_str().unwrap_or(INVALID).to_string(),
		})
	}

	pub fn is_invalid(&self) -> bool {
		self.reason == INVALID
	}
}
