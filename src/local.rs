use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::Weak;

use dashmap::DashMap;
use futures::FutureExt as _;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::actor::Actor;
use crate::call::RemoteRef;
use crate::cancel::CancelToken;
use crate::cancel::Teardown;
use crate::channel::Connection;
use crate::channel::Listener;
use crate::channel::Peer;
use crate::channel::Transport;
use crate::config::Config;
use crate::error::ChannelError;
use crate::error::RpcError;
use crate::id::ActorId;
use crate::remote::RemoteReceptionist;
use crate::serialization::TypeRegistry;
use crate::system::ActorSystem;

type ActorFactory = Arc<dyn Fn(ActorSystem) -> BoxFuture<'static, Option<ActorId>> + Send + Sync>;

/// Entry point of a process: listens on service names and opens connections
/// to other services.
///
/// Every accepted connection gets its own [`ActorSystem`] whose default actor
/// comes from the factory given to [`listen_with`]. Outbound connections are
/// cached per service name.
///
/// [`listen_with`]: LocalReceptionist::listen_with
#[derive(Clone)]
pub struct LocalReceptionist {
	inner: Arc<LocalInner>,
}

struct LocalInner {
	transport: Arc<dyn Transport>,
	config: Config,
	types: Arc<TypeRegistry>,
	token: CancelToken,
	listeners: Mutex<HashMap<String, CancelToken>>,
	sessions: DashMap<String, Vec<ActorSystem>>,
	remotes: Mutex<HashMap<String, ActorSystem>>,
}

impl Drop for LocalInner {
	fn drop(&mut self) {
		self.token.cancel(Teardown::Shutdown);
	}
}

impl std::fmt::Debug for LocalReceptionist {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LocalReceptionist")
			.field("config", &self.inner.config)
			.field("listeners", &self.inner.listeners.lock().len())
			.field("remotes", &self.inner.remotes.lock().len())
			.finish()
	}
}

impl LocalReceptionist {
	pub fn new(transport: Arc<dyn Transport>) -> Self {
		Self::with_config(transport, Config::default(), Arc::new(TypeRegistry::new()))
	}

	pub fn with_config(transport: Arc<dyn Transport>, config: Config, types: Arc<TypeRegistry>) -> Self {
		Self {
			inner: Arc::new(LocalInner {
				transport,
				config,
				types,
				token: CancelToken::new(),
				listeners: Mutex::new(HashMap::new()),
				sessions: DashMap::new(),
				remotes: Mutex::new(HashMap::new()),
			}),
		}
	}

	pub fn config(&self) -> &Config {
		&self.inner.config
	}

	/// Hosts one `A` per accepted connection. `spec` builds its spec from the
	/// peer credentials, or declines the connection by returning `None`.
	pub fn listen<A, S>(&self, service: &str, spec: S) -> Result<(), ChannelError>
	where
		A: Actor,
		S: Fn(&Peer) -> Option<A::Spec> + Send + Sync + 'static,
	{
		let spec = Arc::new(spec);
		self.listen_with(service, move |system| {
			let spec = spec.clone();
			async move {
				let spec = spec(system.peer())?;
				match system.spawn::<A>(spec).await {
					Ok(link) => Some(link.id()),
					Err(err) => {
						tracing::warn!(%err, "Failed to spawn default actor");
						None
					}
				}
			}
		})
	}

	/// Accepts connections on `service`. For each one `factory` gets a fresh
	/// actor system and returns the id of the actor it set up, or `None` to
	/// decline the connection.
	pub fn listen_with<F, Fut>(&self, service: &str, factory: F) -> Result<(), ChannelError>
	where
		F: Fn(ActorSystem) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Option<ActorId>> + Send + 'static,
	{
		let listener = self.inner.transport.listen(service)?;
		let token = self.inner.token.child();

		if let Some(previous) = self
			.inner
			.listeners
			.lock()
			.insert(service.to_string(), token.clone())
		{
			previous.cancel(Teardown::Replaced);
		}

		let factory: ActorFactory = Arc::new(move |system: ActorSystem| factory(system).boxed());
		let span = tracing::info_span!("Listener", service);
		tokio::spawn(
			accept(
				Arc::downgrade(&self.inner),
				service.to_string(),
				listener,
				token,
				factory,
			)
			.instrument(span),
		);

		tracing::info!(service, "Listening");
		Ok(())
	}

	/// Stops accepting on `service` and closes its sessions.
	pub fn stop_listening(&self, service: &str) -> bool {
		let token = self.inner.listeners.lock().remove(service);
		match token {
			Some(token) => {
				token.cancel(Teardown::Cancelled);
				self.inner.sessions.remove(service);
				tracing::info!(service, "Stopped listening");
				true
			}
			None => false,
		}
	}

	pub fn is_listening(&self, service: &str) -> bool {
		self.inner
			.listeners
			.lock()
			.get(service)
			.map(|token| !token.is_cancelled())
			.unwrap_or(false)
	}

	/// Live actor systems of connections accepted on `service`.
	pub fn sessions(&self, service: &str) -> Vec<ActorSystem> {
		self.inner
			.sessions
			.get(service)
			.map(|sessions| {
				sessions
					.iter()
					.filter(|system| !system.receptionist().is_cancelled())
					.cloned()
					.collect()
			})
			.unwrap_or_default()
	}

	pub async fn connect(&self, service: &str) -> Result<ActorSystem, RpcError> {
		self.connect_with(service, self.inner.config.tickle).await
	}

	/// Opens a new connection to `service`, replacing the cached one.
	pub async fn connect_with(&self, service: &str, tickle: bool) -> Result<ActorSystem, RpcError> {
		let system = self.open(service, tickle).await?;

		let previous = self
			.inner
			.remotes
			.lock()
			.insert(service.to_string(), system.clone());
		if let Some(previous) = previous {
			previous.receptionist().cancel_with(Teardown::Replaced);
		}

		Ok(system)
	}

	/// The default actor of `service`.
	pub async fn lookup(&self, service: &str) -> Result<RemoteRef, RpcError> {
		self.lookup_id(service, ActorId::DEFAULT).await
	}

	/// Actor `id` of `service`, over the cached connection while it is alive.
	pub async fn lookup_id(&self, service: &str, id: ActorId) -> Result<RemoteRef, RpcError> {
		if let Some(system) = self.cached(service) {
			return Ok(system.remote(id));
		}

		let opened = self.open(service, self.inner.config.tickle).await?;

		// a concurrent lookup may have connected in the meantime
		let raced = {
			let mut remotes = self.inner.remotes.lock();
			let cached = remotes
				.get(service)
				.filter(|system| !system.receptionist().is_cancelled())
				.cloned();
			if cached.is_none() {
				remotes.insert(service.to_string(), opened.clone());
			}
			cached
		};

		let system = match raced {
			Some(cached) => {
				opened.receptionist().cancel_with(Teardown::Replaced);
				cached
			}
			None => opened,
		};

		Ok(system.remote(id))
	}

	fn cached(&self, service: &str) -> Option<ActorSystem> {
		self.inner
			.remotes
			.lock()
			.get(service)
			.filter(|system| !system.receptionist().is_cancelled())
			.cloned()
	}

	async fn open(&self, service: &str, tickle: bool) -> Result<ActorSystem, RpcError> {
		let connection = self.inner.transport.connect(service)?;
		let receptionist = RemoteReceptionist::new(connection, self.inner.token.child());
		let system =
			ActorSystem::from_receptionist(receptionist, &self.inner.config, self.inner.types.clone());
		system.resume();

		if tickle {
			system.receptionist().tickle().await?;
		}

		tracing::info!(service, "Connected");
		Ok(system)
	}

	/// Closes every listener, session and connection.
	pub fn shutdown(&self) {
		self.inner.token.cancel(Teardown::Shutdown);
		self.inner.listeners.lock().clear();
		self.inner.sessions.clear();

		let remotes: Vec<ActorSystem> = self.inner.remotes.lock().drain().map(|(_, system)| system).collect();
		for system in remotes {
			system.receptionist().cancel_with(Teardown::Shutdown);
		}

		tracing::info!("Local receptionist shut down");
	}
}

async fn accept(
	inner: Weak<LocalInner>,
	service: String,
	mut listener: Box<dyn Listener>,
	token: CancelToken,
	factory: ActorFactory,
) {
	let mut sessions = JoinSet::new();

	loop {
		let connection = tokio::select! {
			reason = token.cancelled() => {
				tracing::debug!(?reason, "Listener stopped");
				break;
			}
			Some(result) = sessions.join_next() => {
				if let Err(err) = result {
					if err.is_panic() {
						tracing::error!("Session task panicked: {err:?}");
					}
				}
				continue;
			}
			connection = listener.accept() => match connection {
				Some(connection) => connection,
				None => break,
			}
		};

		tracing::debug!(peer = ?connection.peer, "Accepted connection");
		let session = run_session(
			inner.clone(),
			service.clone(),
			connection,
			token.child(),
			factory.clone(),
		);
		sessions.spawn(session.in_current_span());
	}

	// drop the listener before the sessions so no connection sneaks in
	drop(listener);
	sessions.shutdown().await;
}

async fn run_session(
	inner: Weak<LocalInner>,
	service: String,
	connection: Connection,
	token: CancelToken,
	factory: ActorFactory,
) {
	let Some(local) = inner.upgrade() else {
		connection.cancel();
		return;
	};

	let receptionist = RemoteReceptionist::new(connection, token);
	let system = ActorSystem::from_receptionist(receptionist, &local.config, local.types.clone());
	drop(local);

	match factory(system.clone()).await {
		Some(actor) => {
			tracing::debug!(%actor, peer = ?system.peer(), "Session started");
		}
		None => {
			tracing::info!(peer = ?system.peer(), "Factory declined connection");
			system.receptionist().cancel_with(Teardown::Declined);
			return;
		}
	}

	if let Some(local) = inner.upgrade() {
		local
			.sessions
			.entry(service.clone())
			.or_default()
			.push(system.clone());
	}

	system.resume();
	let reason = system.receptionist().closed().await;
	tracing::debug!(?reason, peer = ?system.peer(), "Session closed");

	if let Some(local) = inner.upgrade() {
		if let Some(mut sessions) = local.sessions.get_mut(&service) {
			sessions.retain(|session| !session.ptr_eq(&system));
		}
	}
}
