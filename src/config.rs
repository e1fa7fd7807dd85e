use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::serialization::Serialization;

/// Settings shared by a receptionist and every actor system it creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Capacity of a hosted actor's mailbox.
	pub mailbox: usize,
	/// Send an empty round trip right after connecting.
	pub tickle: bool,
	pub serialization: Serialization,
	/// Applied to every outbound call. `None` waits until the call resolves or
	/// the connection goes away.
	pub call_timeout: Option<Duration>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			mailbox: 10,
			tickle: false,
			serialization: Serialization::default(),
			call_timeout: None,
		}
	}
}

impl Config {
	pub fn with_mailbox(mut self, mailbox: usize) -> Self {
		self.mailbox = mailbox;
		self
	}

	pub fn with_tickle(mut self, tickle: bool) -> Self {
		self.tickle = tickle;
		self
	}

	pub fn with_serialization(mut self, serialization: Serialization) -> Self {
		self.serialization = serialization;
		self
	}

	pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
		self.call_timeout = Some(timeout);
		self
	}
}
