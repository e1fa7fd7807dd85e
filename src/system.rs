use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Weak;

use downcast_rs::DowncastSync;
use downcast_rs::impl_downcast;
use futures::FutureExt as _;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use crate::actor::Actor;
use crate::call::CallHandle;
use crate::call::RemoteRef;
use crate::cancel::CancelToken;
use crate::channel::Connection;
use crate::channel::Peer;
use crate::config::Config;
use crate::envelope::InvocationEnvelope;
use crate::envelope::InvocationReturn;
use crate::error::RpcError;
use crate::handler::Method;
use crate::id::ActorId;
use crate::id::CallId;
use crate::invocation::Invocation;
use crate::invocation::InvocationDecoder;
use crate::invocation::InvocationEncoder;
use crate::invocation::ResultHandler;
use crate::link::Link;
use crate::remote::RemoteReceptionist;
use crate::serialization::Serialization;
use crate::serialization::TypeRegistry;

/// Anything an actor system can route inbound invocations to.
///
/// The invocation must be answered through its result handler. Dropping it
/// unanswered answers with an empty return.
pub trait DistributedActor: DowncastSync {
	fn id(&self) -> ActorId;
	fn invoke(&self, invocation: Invocation) -> BoxFuture<'_, ()>;
}

impl_downcast!(sync DistributedActor);

#[derive(Default)]
struct Registry {
	reserved: HashSet<ActorId>,
	registered: HashMap<ActorId, Arc<dyn DistributedActor>>,
}

/// Actor registry bound to one connection.
///
/// Identities move reserved -> registered -> gone. All registry operations
/// are linearized through one lock.
#[derive(Clone)]
pub struct ActorSystem {
	inner: Arc<SystemInner>,
}

/// Non-owning handle to an [`ActorSystem`], held by the actors it hosts.
#[derive(Clone)]
pub struct WeakSystem {
	inner: Weak<SystemInner>,
}

struct SystemInner {
	registry: Mutex<Registry>,
	receptionist: RemoteReceptionist,
	serialization: Serialization,
	types: Arc<TypeRegistry>,
	config: Config,
}

impl Drop for SystemInner {
	fn drop(&mut self) {
		self.receptionist.cancel();
	}
}

impl std::fmt::Debug for ActorSystem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let registry = self.inner.registry.lock();
		f.debug_struct("ActorSystem")
			.field("peer", self.peer())
			.field("reserved", &registry.reserved.len())
			.field("registered", &registry.registered.len())
			.finish()
	}
}

impl ActorSystem {
	pub fn new(connection: Connection) -> Self {
		Self::with_config(connection, &Config::default(), Arc::new(TypeRegistry::new()))
	}

	pub fn with_config(connection: Connection, config: &Config, types: Arc<TypeRegistry>) -> Self {
		let receptionist = RemoteReceptionist::new(connection, CancelToken::new());
		Self::from_receptionist(receptionist, config, types)
	}

	pub(crate) fn from_receptionist(
		receptionist: RemoteReceptionist,
		config: &Config,
		types: Arc<TypeRegistry>,
	) -> Self {
		let inner = Arc::new(SystemInner {
			registry: Mutex::new(Registry::default()),
			receptionist,
			serialization: config.serialization,
			types,
			config: config.clone(),
		});

		let weak = Arc::downgrade(&inner);
		inner
			.receptionist
			.set_invocation_handler(move |envelope, actor, call| {
				let weak = weak.clone();
				async move {
					match weak.upgrade() {
						Some(inner) => {
							ActorSystem { inner }
								.handle_invocation(envelope, actor, call)
								.await
						}
						None => InvocationReturn::empty(),
					}
				}
				.boxed()
			});

		Self { inner }
	}

	pub fn receptionist(&self) -> &RemoteReceptionist {
		&self.inner.receptionist
	}

	pub fn peer(&self) -> &Peer {
		self.inner.receptionist.peer()
	}

	pub fn config(&self) -> &Config {
		&self.inner.config
	}

	pub fn serialization(&self) -> Serialization {
		self.inner.serialization
	}

	pub fn types(&self) -> &Arc<TypeRegistry> {
		&self.inner.types
	}

	/// Starts receiving on the underlying connection.
	pub fn resume(&self) {
		self.inner.receptionist.resume()
	}

	/// Tears the connection down. Every pending call resolves with an empty
	/// return.
	pub fn cancel(&self) {
		self.inner.receptionist.cancel()
	}

	pub fn downgrade(&self) -> WeakSystem {
		WeakSystem {
			inner: Arc::downgrade(&self.inner),
		}
	}

	pub fn ptr_eq(&self, other: &ActorSystem) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	pub(crate) fn token(&self) -> &CancelToken {
		self.inner.receptionist.token()
	}

	/// Reserves an identity for an actor about to be constructed.
	///
	/// The first actor of an empty system gets [`ActorId::DEFAULT`], so a
	/// service hosting a single actor needs no id exchange.
	pub fn assign_id(&self) -> ActorId {
		let mut registry = self.inner.registry.lock();

		let id = if registry.reserved.is_empty() && registry.registered.is_empty() {
			ActorId::DEFAULT
		} else {
			loop {
				let id = ActorId::random();
				if !registry.reserved.contains(&id) && !registry.registered.contains_key(&id) {
					break id;
				}
			}
		};

		registry.reserved.insert(id);
		tracing::debug!(%id, "Assigned actor id");
		id
	}

	/// Publishes a constructed actor under its reserved id.
	///
	/// # Panics
	///
	/// If `id` was not reserved with [`assign_id`](ActorSystem::assign_id).
	pub fn actor_ready(&self, id: ActorId, actor: Arc<dyn DistributedActor>) {
		let mut registry = self.inner.registry.lock();
		if !registry.reserved.remove(&id) {
			panic!("actor {id} became ready without a reserved id");
		}
		registry.registered.insert(id, actor);
		tracing::debug!(%id, "Actor ready");
	}

	pub fn resolve(&self, id: ActorId) -> Option<Arc<dyn DistributedActor>> {
		self.inner.registry.lock().registered.get(&id).cloned()
	}

	/// The hosted actor `id`, if it is registered and of type `A`.
	pub fn resolve_local<A: Actor>(&self, id: ActorId) -> Option<Link<A>> {
		let actor = self.resolve(id)?;
		actor
			.downcast_arc::<Link<A>>()
			.ok()
			.map(|link| Link::clone(&link))
	}

	pub fn resign_id(&self, id: ActorId) {
		let mut registry = self.inner.registry.lock();
		let reserved = registry.reserved.remove(&id);
		let registered = registry.registered.remove(&id).is_some();
		if reserved || registered {
			tracing::debug!(%id, "Actor id resigned");
		}
	}

	pub fn is_reserved(&self, id: ActorId) -> bool {
		self.inner.registry.lock().reserved.contains(&id)
	}

	/// Spawns a hosted actor on this system. See [`Actor::spawn`].
	pub async fn spawn<A: Actor>(&self, spec: A::Spec) -> Result<Link<A>, RpcError> {
		A::spawn(self, spec).await
	}

	/// A handle for calling actor `id` on the other side.
	pub fn remote(&self, id: ActorId) -> RemoteRef {
		RemoteRef::new(id, self.clone())
	}

	pub fn make_invocation_encoder(&self) -> InvocationEncoder {
		InvocationEncoder::new(self.inner.serialization, self.inner.types.clone())
	}

	/// Ships a recorded call to `actor` and returns a handle to its reply.
	pub fn start_call<R>(&self, actor: ActorId, target: &str, encoder: InvocationEncoder) -> CallHandle<R> {
		let mut envelope = encoder.done_recording();
		envelope.target = Some(target.to_string());

		let (id, promise) = self
			.inner
			.receptionist
			.send_invocation(envelope.clone(), actor);

		let handle = CallHandle::in_flight(
			self.inner.receptionist.clone(),
			self.inner.serialization,
			id,
			actor,
			envelope,
			promise,
		);

		match self.inner.config.call_timeout {
			Some(timeout) => handle.timeout(timeout),
			None => handle,
		}
	}

	pub async fn remote_call<R: DeserializeOwned>(
		&self,
		actor: ActorId,
		target: &str,
		encoder: InvocationEncoder,
	) -> Result<R, RpcError> {
		self.start_call::<R>(actor, target, encoder).reply().await
	}

	/// Like [`remote_call`](ActorSystem::remote_call) for calls that return
	/// nothing. Only a thrown return is a failure.
	pub async fn remote_call_void(
		&self,
		actor: ActorId,
		target: &str,
		encoder: InvocationEncoder,
	) -> Result<(), RpcError> {
		self.start_call::<()>(actor, target, encoder).reply_void().await
	}

	/// Encodes `method` and calls it on `actor`.
	pub fn call<M: Method>(&self, actor: ActorId, method: &M) -> CallHandle<M::Reply> {
		let mut encoder = self.make_invocation_encoder();
		if let Err(err) = method.encode(&mut encoder) {
			return CallHandle::failed(err.into());
		}
		encoder.record_return_type::<M::Reply>();

		self.start_call(actor, M::TARGET, encoder)
	}

	async fn handle_invocation(
		&self,
		envelope: InvocationEnvelope,
		actor: ActorId,
		call: CallId,
	) -> InvocationReturn {
		let handler = ResultHandler::new(call, self.inner.serialization);
		let promise = handler.promise();

		match self.resolve(actor) {
			Some(target) => {
				let decoder = InvocationDecoder::new(
					envelope,
					self.inner.serialization,
					self.inner.types.clone(),
				);
				target.invoke(Invocation::new(decoder, handler)).await;
			}
			None => {
				tracing::warn!(%actor, "Invocation for unknown actor");
				handler.on_throw(&RpcError::UnknownActor(actor));
			}
		}

		promise.value().await
	}
}

impl WeakSystem {
	pub fn upgrade(&self) -> Option<ActorSystem> {
		self.inner.upgrade().map(|inner| ActorSystem { inner })
	}
}

impl std::fmt::Debug for WeakSystem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WeakSystem")
			.field("alive", &(self.inner.strong_count() > 0))
			.finish()
	}
}
