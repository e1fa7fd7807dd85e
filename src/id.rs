use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Identity of an actor within one actor system.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
	/// Well-known identity handed to the first actor of every system, so a
	/// single-actor service can be reached without exchanging ids first.
	pub const DEFAULT: ActorId = ActorId(Uuid::from_u128(0x66ACD257_449F_4887_B6CF_92E231A54AE9));

	pub fn random() -> Self {
		Self(Uuid::new_v4())
	}

	pub const fn from_uuid(uuid: Uuid) -> Self {
		Self(uuid)
	}

	pub const fn as_uuid(&self) -> Uuid {
		self.0
	}

	pub fn is_default(&self) -> bool {
		*self == Self::DEFAULT
	}
}

impl fmt::Debug for ActorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ActorId({})", self.0)
	}
}

impl fmt::Display for ActorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

impl From<Uuid> for ActorId {
	fn from(uuid: Uuid) -> Self {
		Self(uuid)
	}
}

impl From<ActorId> for Uuid {
	fn from(id: ActorId) -> Self {
		id.0
	}
}

/// Correlates an outbound invocation with its return.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
	pub fn random() -> Self {
		Self(Uuid::new_v4())
	}

	pub const fn from_uuid(uuid: Uuid) -> Self {
		Self(uuid)
	}

	pub const fn as_uuid(&self) -> Uuid {
		self.0
	}
}

impl fmt::Debug for CallId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "CallId({})", self.0)
	}
}

impl fmt::Display for CallId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

impl From<Uuid> for CallId {
	fn from(uuid: Uuid) -> Self {
		Self(uuid)
	}
}

impl From<CallId> for Uuid {
	fn from(id: CallId) -> Self {
		id.0
	}
}
