use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use futures::FutureExt as _;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::cancel::CancelToken;
use crate::cancel::Teardown;
use crate::channel::Connection;
use crate::channel::MessageReceiver;
use crate::channel::MessageSender;
use crate::channel::Peer;
use crate::command::Command;
use crate::command::CommandKind;
use crate::command::Rejection;
use crate::envelope::InvocationEnvelope;
use crate::envelope::InvocationReturn;
use crate::error::ChannelError;
use crate::id::ActorId;
use crate::id::CallId;
use crate::promise::Promise;
use crate::wire::Dictionary;

type HandlerFn =
	dyn Fn(InvocationEnvelope, ActorId, CallId) -> BoxFuture<'static, InvocationReturn> + Send + Sync;

struct InvocationHandler(Box<HandlerFn>);

impl InvocationHandler {
	fn noop() -> Self {
		Self(Box::new(|_: InvocationEnvelope, _: ActorId, _: CallId| {
			futures::future::ready(InvocationReturn::empty()).boxed()
		}))
	}
}

/// Owns one connection and multiplexes invocations and their returns over it.
///
/// Outbound calls are correlated with their returns by call id only; returns
/// may arrive in any order. Inbound invocations are handed to the installed
/// invocation handler, each on its own task.
#[derive(Clone)]
pub struct RemoteReceptionist {
	inner: Arc<Inner>,
}

struct Inner {
	peer: Peer,
	sender: Arc<dyn MessageSender>,
	receiver: Mutex<Option<Box<dyn MessageReceiver>>>,
	pending: DashMap<CallId, Promise<InvocationReturn>>,
	tickles: Mutex<VecDeque<Promise<bool>>>,
	handler: ArcSwap<InvocationHandler>,
	token: CancelToken,
	torn_down: AtomicBool,
}

impl std::fmt::Debug for RemoteReceptionist {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RemoteReceptionist")
			.field("peer", &self.inner.peer)
			.field("pending", &self.inner.pending.len())
			.field("token", &self.inner.token)
			.finish()
	}
}

impl RemoteReceptionist {
	/// Takes ownership of `connection`. Nothing is received until [`resume`].
	///
	/// [`resume`]: RemoteReceptionist::resume
	pub fn new(connection: Connection, token: CancelToken) -> Self {
		let Connection {
			sender,
			receiver,
			peer,
		} = connection;

		Self {
			inner: Arc::new(Inner {
				peer,
				sender,
				receiver: Mutex::new(Some(receiver)),
				pending: DashMap::new(),
				tickles: Mutex::new(VecDeque::new()),
				handler: ArcSwap::from_pointee(InvocationHandler::noop()),
				token,
				torn_down: AtomicBool::new(false),
			}),
		}
	}

	pub fn peer(&self) -> &Peer {
		&self.inner.peer
	}

	pub fn service(&self) -> &str {
		&self.inner.peer.service
	}

	pub fn token(&self) -> &CancelToken {
		&self.inner.token
	}

	/// Starts the receive loop. Calling it again has no effect.
	pub fn resume(&self) {
		let Some(receiver) = self.inner.receiver.lock().take() else {
			return;
		};

		let span = tracing::info_span!("Receptionist", service = %self.inner.peer.service);
		tokio::spawn(pump(self.inner.clone(), receiver).instrument(span));
	}

	pub fn set_invocation_handler<F>(&self, handler: F)
	where
		F: Fn(InvocationEnvelope, ActorId, CallId) -> BoxFuture<'static, InvocationReturn>
			+ Send
			+ Sync
			+ 'static,
	{
		self.inner
			.handler
			.store(Arc::new(InvocationHandler(Box::new(handler))));
	}

	/// Ships `envelope` to `actor` on the other side.
	///
	/// The returned promise is fulfilled with the matching return, or with an
	/// empty return if the connection is torn down first.
	pub fn send_invocation(
		&self,
		envelope: InvocationEnvelope,
		actor: ActorId,
	) -> (CallId, Promise<InvocationReturn>) {
		let id = CallId::random();
		let promise = Promise::new();

		if self.inner.token.is_cancelled() {
			promise.fulfill(InvocationReturn::empty());
			return (id, promise);
		}

		self.inner.pending.insert(id, promise.clone());

		// teardown may have drained the table between the check and the insert
		if self.inner.token.is_cancelled() {
			self.inner.complete(id, InvocationReturn::empty());
			return (id, promise);
		}

		metrics::counter!("runy_remote_invocations_sent_total").increment(1);
		tracing::debug!(call = %id, %actor, method = ?envelope.target, "Sending invocation");

		let command = Command::Invocation {
			id,
			actor,
			envelope,
		};

		if let Err(err) = self.inner.sender.send(command.encode()) {
			tracing::warn!(call = %id, %err, "Failed to send invocation");
			self.inner.complete(id, InvocationReturn::empty());
		}

		(id, promise)
	}

	/// Forgets a pending call. A return that arrives later is dropped.
	pub fn abandon(&self, id: CallId) -> bool {
		self.inner.pending.remove(&id).is_some()
	}

	pub fn pending_invocations(&self) -> usize {
		self.inner.pending.len()
	}

	/// Sends an empty container to force the connection up and waits for the
	/// peer to answer it with a rejection. Needs the receive loop running.
	///
	/// Fails with [`ChannelError::Closed`] if the connection goes away first.
	pub async fn tickle(&self) -> Result<(), ChannelError> {
		let answer = Promise::new();
		self.inner.tickles.lock().push_back(answer.clone());

		// teardown may have drained the queue before the push
		if self.inner.token.is_cancelled() {
			answer.fulfill(false);
		}

		tracing::debug!("Tickling connection");
		if let Err(err) = self.inner.sender.send(Dictionary::new()) {
			answer.fulfill(false);
			return Err(err);
		}

		match answer.value().await {
			true => Ok(()),
			false => Err(ChannelError::Closed),
		}
	}

	pub fn cancel(&self) {
		self.cancel_with(Teardown::Cancelled)
	}

	pub fn cancel_with(&self, reason: Teardown) {
		self.inner.teardown(reason)
	}

	pub fn is_cancelled(&self) -> bool {
		self.inner.token.is_cancelled()
	}

	/// Resolves once the connection is torn down.
	pub async fn closed(&self) -> Teardown {
		self.inner.token.cancelled().await
	}
}

async fn pump(inner: Arc<Inner>, mut receiver: Box<dyn MessageReceiver>) {
	let mut tasks = JoinSet::new();

	let reason = loop {
		tokio::select! {
			reason = inner.token.cancelled() => break reason,
			Some(result) = tasks.join_next() => {
				if let Err(err) = result {
					if err.is_panic() {
						tracing::error!("Invocation task panicked: {err:?}");
					}
				}
			}
			message = receiver.recv() => match message {
				Some(message) => inner.handle_message(message, &mut tasks),
				None => break Teardown::PeerClosed,
			}
		}
	};

	drop(receiver);
	inner.teardown(reason);
}

impl Inner {
	fn handle_message(&self, message: Dictionary, tasks: &mut JoinSet<()>) {
		if let Some(rejection) = Rejection::decode(&message) {
			self.handle_rejection(rejection);
			return;
		}

		let command = match Command::decode(&message) {
			Ok(command) => command,
			Err(err) => {
				tracing::warn!(%err, "Rejecting invalid command");
				metrics::counter!("runy_remote_commands_rejected_total").increment(1);

				if let (Some(CommandKind::InvocationReturn), Some(id)) = Command::peek(&message) {
					self.complete(id, InvocationReturn::empty());
				}

				if let Err(err) = self.sender.send(Rejection::of(&message).encode()) {
					tracing::debug!(%err, "Failed to send rejection");
				}
				return;
			}
		};

		let kind = match command.kind() {
			CommandKind::Invocation => "invocation",
			CommandKind::InvocationReturn => "invocation_return",
			CommandKind::Other(_) => "other",
		};
		metrics::counter!("runy_remote_commands_received_total", "kind" => kind).increment(1);

		match command {
			Command::Invocation {
				id,
				actor,
				envelope,
			} => {
				let handler = self.handler.load_full();
				let sender = self.sender.clone();
				let span = tracing::debug_span!("Invocation", call = %id, %actor);

				tasks.spawn(
					async move {
						tracing::debug!(method = ?envelope.target, "Handling invocation");
						let result = (handler.0)(envelope, actor, id).await;

						let command = Command::Return { id, actor, result };
						if let Err(err) = sender.send(command.encode()) {
							tracing::debug!(%err, "Failed to send invocation return");
						}
					}
					.instrument(span),
				);
			}
			Command::Return { id, result, .. } => {
				if !self.complete(id, result) {
					tracing::warn!(call = %id, "Dropping return for unknown call");
					metrics::counter!("runy_remote_returns_unmatched_total").increment(1);
				}
			}
			Command::Other { kind, id, .. } => {
				tracing::debug!(kind, call = %id, "Ignoring command of unknown kind");
			}
		}
	}

	fn handle_rejection(&self, rejection: Rejection) {
		match rejection.id {
			Some(id) if self.complete(id, InvocationReturn::empty()) => {
				tracing::warn!(call = %id, reason = %rejection.reason, "Peer rejected invocation");
			}
			None if self.answer_tickle() => {
				tracing::debug!("Tickle answered");
			}
			_ => {
				tracing::debug!(reason = %rejection.reason, "Peer rejected a message");
			}
		}
	}

	/// Resolves the oldest tickle still waiting for its answer.
	fn answer_tickle(&self) -> bool {
		loop {
			let Some(answer) = self.tickles.lock().pop_front() else {
				return false;
			};
			if answer.fulfill(true) {
				return true;
			}
		}
	}

	/// Fulfills and removes the pending call `id`, if there is one.
	fn complete(&self, id: CallId, result: InvocationReturn) -> bool {
		match self.pending.remove(&id) {
			Some((_, promise)) => {
				promise.fulfill(result);
				true
			}
			None => false,
		}
	}

	fn teardown(&self, reason: Teardown) {
		self.token.cancel(reason);
		self.sender.cancel();
		self.handler.store(Arc::new(InvocationHandler::noop()));

		let pending: Vec<CallId> = self.pending.iter().map(|entry| *entry.key()).collect();
		for id in pending {
			if self.complete(id, InvocationReturn::empty()) {
				metrics::counter!("runy_remote_pending_cancelled_total").increment(1);
			}
		}

		let tickles: Vec<Promise<bool>> = self.tickles.lock().drain(..).collect();
		for answer in tickles {
			answer.fulfill(false);
		}

		if !self.torn_down.swap(true, Ordering::AcqRel) {
			tracing::info!(service = %self.peer.service, ?reason, "Connection torn down");
		}
	}
}
