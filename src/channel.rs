//! The message channel contract a receptionist runs over, and an in-process
//! implementation of it.

use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt as _;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::cancel::CancelToken;
use crate::cancel::Teardown;
use crate::error::ChannelError;
use crate::wire::Dictionary;

/// Credentials of the process on the other end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
	pub service: String,
	pub pid: Option<u32>,
}

pub trait MessageSender: Send + Sync + 'static {
	fn send(&self, message: Dictionary) -> Result<(), ChannelError>;
	/// Closes the connection in both directions.
	fn cancel(&self);
	fn is_closed(&self) -> bool;
}

pub trait MessageReceiver: Send + 'static {
	/// Next message in delivery order, or `None` once the connection closed.
	fn recv(&mut self) -> BoxFuture<'_, Option<Dictionary>>;
}

pub trait Listener: Send + 'static {
	fn accept(&mut self) -> BoxFuture<'_, Option<Connection>>;
}

/// Rendezvous by well-known service name.
pub trait Transport: Send + Sync + 'static {
	fn listen(&self, service: &str) -> Result<Box<dyn Listener>, ChannelError>;
	fn connect(&self, service: &str) -> Result<Connection, ChannelError>;
}

pub struct Connection {
	pub sender: Arc<dyn MessageSender>,
	pub receiver: Box<dyn MessageReceiver>,
	pub peer: Peer,
}

impl std::fmt::Debug for Connection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Connection")
			.field("peer", &self.peer)
			.field("closed", &self.sender.is_closed())
			.finish()
	}
}

impl Connection {
	pub fn send(&self, message: Dictionary) -> Result<(), ChannelError> {
		self.sender.send(message)
	}

	pub async fn recv(&mut self) -> Option<Dictionary> {
		self.receiver.recv().await
	}

	pub fn cancel(&self) {
		self.sender.cancel()
	}
}

/// In-process transport over tokio channels.
///
/// The service table belongs to the transport value; share it with an `Arc`
/// between the listening and the connecting side.
#[derive(Default)]
pub struct MpscTransport {
	services: Arc<DashMap<String, mpsc::UnboundedSender<Connection>>>,
}

impl MpscTransport {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Two connections wired directly to each other.
	pub fn pair(service: &str) -> (Connection, Connection) {
		let (client_tx, server_rx) = mpsc::unbounded_channel();
		let (server_tx, client_rx) = mpsc::unbounded_channel();
		let closed = CancelToken::new();
		let peer = Peer {
			service: service.to_string(),
			pid: Some(std::process::id()),
		};

		let client = Connection {
			sender: Arc::new(MpscSender {
				tx: client_tx,
				closed: closed.clone(),
			}),
			receiver: Box::new(MpscReceiver {
				rx: client_rx,
				closed: closed.clone(),
			}),
			peer: peer.clone(),
		};

		let server = Connection {
			sender: Arc::new(MpscSender {
				tx: server_tx,
				closed: closed.clone(),
			}),
			receiver: Box::new(MpscReceiver {
				rx: server_rx,
				closed,
			}),
			peer,
		};

		(client, server)
	}

	pub fn is_listening(&self, service: &str) -> bool {
		self.services
			.get(service)
			.map(|tx| !tx.is_closed())
			.unwrap_or(false)
	}
}

impl Transport for MpscTransport {
	fn listen(&self, service: &str) -> Result<Box<dyn Listener>, ChannelError> {
		let (tx, rx) = mpsc::unbounded_channel();

		match self.services.entry(service.to_string()) {
			dashmap::mapref::entry::Entry::Occupied(mut entry) => {
				if !entry.get().is_closed() {
					return Err(ChannelError::ServiceInUse(service.to_string()));
				}
				entry.insert(tx);
			}
			dashmap::mapref::entry::Entry::Vacant(entry) => {
				entry.insert(tx);
			}
		}

		Ok(Box::new(MpscListener {
			service: service.to_string(),
			rx,
			services: self.services.clone(),
		}))
	}

	fn connect(&self, service: &str) -> Result<Connection, ChannelError> {
		let listener = self
			.services
			.get(service)
			.map(|tx| tx.clone())
			.ok_or_else(|| ChannelError::ServiceNotFound(service.to_string()))?;

		let (client, server) = Self::pair(service);
		listener
			.send(server)
			.map_err(|_| ChannelError::ServiceNotFound(service.to_string()))?;

		Ok(client)
	}
}

struct MpscListener {
	service: String,
	rx: mpsc::UnboundedReceiver<Connection>,
	services: Arc<DashMap<String, mpsc::UnboundedSender<Connection>>>,
}

impl Listener for MpscListener {
	fn accept(&mut self) -> BoxFuture<'_, Option<Connection>> {
		self.rx.recv().boxed()
	}
}

impl Drop for MpscListener {
	fn drop(&mut self) {
		self.rx.close();
		self.services.remove_if(&self.service, |_, tx| tx.is_closed());

		// connections queued but never accepted
		while let Ok(connection) = self.rx.try_recv() {
			connection.cancel();
		}
	}
}

struct MpscSender {
	tx: mpsc::UnboundedSender<Dictionary>,
	closed: CancelToken,
}

impl MessageSender for MpscSender {
	fn send(&self, message: Dictionary) -> Result<(), ChannelError> {
		if self.closed.is_cancelled() {
			return Err(ChannelError::Closed);
		}
		self.tx.send(message).map_err(|_| ChannelError::Closed)
	}

	fn cancel(&self) {
		self.closed.cancel(Teardown::Cancelled);
	}

	fn is_closed(&self) -> bool {
		self.closed.is_cancelled() || self.tx.is_closed()
	}
}

struct MpscReceiver {
	rx: mpsc::UnboundedReceiver<Dictionary>,
	closed: CancelToken,
}

impl MessageReceiver for MpscReceiver {
	fn recv(&mut self) -> BoxFuture<'_, Option<Dictionary>> {
		async move {
			tokio::select! {
				biased;
				_ = self.closed.cancelled() => None,
				message = self.rx.recv() => message,
			}
		}
		.boxed()
	}
}

impl Drop for MpscReceiver {
	fn drop(&mut self) {
		self.closed.cancel(Teardown::PeerClosed);
	}
}
