use std::any::type_name;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::cancel::CancelToken;
use crate::cancel::Teardown;
use crate::channel::Peer;
use crate::error::RpcError;
use crate::handler::Exec;
use crate::handler::Routes;
use crate::id::ActorId;
use crate::invocation::Invocation;
use crate::link::Link;
use crate::link::WeakLink;
use crate::system::ActorSystem;
use crate::system::WeakSystem;

/// Runtime context for an active actor instance.
///
/// Holds the actor's mailbox, its cancellation token and the background
/// tasks it spawned.
pub struct ActorContext<A: Actor> {
	/// Inbound invocations, in arrival order
	pub rx: mpsc::Receiver<Invocation>,
	/// Cancelled when the actor is stopped or its connection goes away
	pub token: CancelToken,
	/// Task set for managing spawned futures
	pub tasks: JoinSet<()>,
	/// Tracing span for observability
	pub span: tracing::Span,
	pub id: ActorId,
	pub system: WeakSystem,
	/// Weak reference to the actor's link
	pub link: WeakLink<A>,
	pub(crate) routes: Arc<Routes<A>>,
}

impl<A: Actor> ActorContext<A> {
	/// Spawn a background task within the actor's context.
	///
	/// The spawned task will be automatically cancelled when the actor shuts down.
	pub fn spawn(&mut self, future: impl Future<Output = ()> + Send + 'static) {
		self.tasks.spawn(future);
	}

	pub fn system(&self) -> Option<ActorSystem> {
		self.system.upgrade()
	}
}

/// Initialization context provided to actors during startup.
pub struct Init<'a, A: Actor> {
	/// Data the actor is built from
	pub spec: A::Spec,
	/// Identity the actor will be registered under
	pub id: ActorId,
	/// The process on the other end of the connection
	pub peer: Peer,
	pub system: WeakSystem,
	/// Task set for spawning background tasks during initialization
	pub tasks: &'a mut JoinSet<()>,
	/// Cancellation token for the initialization process
	pub token: CancelToken,
}

impl<A: Actor> Init<'_, A> {
	/// Spawn a background task during actor initialization.
	///
	/// The spawned task will run alongside the actor and be automatically
	/// cancelled when the actor shuts down.
	pub fn spawn<F>(&mut self, future: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		self.tasks.spawn(future);
	}
}

pub trait InitFuture<A: Actor>: Future<Output = anyhow::Result<A>> + Send + 'static {}

impl<A: Actor, F: Future<Output = anyhow::Result<A>> + Send + 'static> InitFuture<A> for F {}

/// A state value hosted on its own task and reachable through an actor
/// system.
///
/// Invocations are handled one at a time in arrival order.
pub trait Actor: Sized + Send + Sync + 'static {
	type Spec: Send + 'static;

	fn span(id: ActorId, _spec: &Self::Spec) -> tracing::Span {
		tracing::info_span!("Actor", %id)
	}

	/// Registers the methods this actor answers.
	fn routes(routes: &mut Routes<Self>);

	fn init(ctx: Init<'_, Self>) -> impl InitFuture<Self>;

	fn terminate(
		self,
		_ctx: ActorContext<Self>,
		_reason: Teardown,
	) -> impl Future<Output = ()> + Send {
		futures::future::ready(())
	}

	fn tick(&mut self) -> impl Future<Output = ()> + Send {
		futures::future::pending()
	}

	fn cycle(
		&mut self,
		ctx: &mut ActorContext<Self>,
	) -> impl Future<Output = ControlFlow<Teardown, ()>> + Send {
		async {
			tokio::select! {
				reason = ctx.token.cancelled() => {
					return ControlFlow::Break(reason);
				},
				_ = Self::tick(self) => {
					return ControlFlow::Continue(())
				},
				Some(result) = ctx.tasks.join_next() => {
					if let Err(err) = result {
						if err.is_panic() {
							tracing::error!("Actor task panicked: {err:?}");
						}
					}
					return ControlFlow::Continue(())
				},
				invocation = ctx.rx.recv() => {
					match invocation {
						Some(invocation) => Self::handle(self, Exec { ctx }, invocation).await,
						None => return ControlFlow::Break(Teardown::Cancelled),
					}
				}
			}

			ControlFlow::Continue(())
		}
	}

	fn crash(err: JoinError) -> impl Future<Output = ()> + Send {
		async move {
			tracing::error!("Actor {} crashed: {err:?}", type_name::<Self>());
		}
	}

	/// Routes `invocation` to the handler registered for its target.
	fn handle<'a>(
		&'a mut self,
		ctx: Exec<'a, Self>,
		invocation: Invocation,
	) -> impl Future<Output = ()> + Send + 'a {
		async move {
			let route = ctx.routes.get(invocation.target());
			match route {
				Some(route) => route.handle(self, ctx, invocation).await,
				None => {
					let error = RpcError::UnknownTarget {
						actor: ctx.id,
						target: invocation.target().to_string(),
					};
					tracing::warn!(%error, "Rejecting invocation");
					invocation.handler.on_throw(&error);
				}
			}
		}
	}

	/// Assigns an id on `system`, initializes the actor and starts it.
	///
	/// The id is resigned again if initialization fails or once the actor
	/// stops.
	fn spawn(
		system: &ActorSystem,
		spec: Self::Spec,
	) -> impl Future<Output = Result<Link<Self>, RpcError>> + Send {
		async move {
			let id = system.assign_id();
			let span = Self::span(id, &spec);
			let token = system.token().child();
			let mut tasks = JoinSet::default();

			let init = Self::init(Init {
				spec,
				id,
				peer: system.peer().clone(),
				system: system.downgrade(),
				tasks: &mut tasks,
				token: token.clone(),
			});

			let mut state = match init.instrument(span.clone()).await {
				Ok(state) => state,
				Err(err) => {
					tracing::error!(parent: &span, "Actor failed to initialize: {err:#}");
					token.cancel(Teardown::Cancelled);
					system.resign_id(id);
					return Err(RpcError::Init {
						id,
						reason: format!("{err:#}"),
					});
				}
			};

			let (tx, rx) = mpsc::channel(system.config().mailbox.max(1));
			let link = Link::new(id, tx, token.clone());
			system.actor_ready(id, Arc::new(link.clone()));

			let mut routes = Routes::new();
			Self::routes(&mut routes);

			let mut ctx = ActorContext {
				rx,
				token,
				tasks,
				span: span.clone(),
				id,
				system: system.downgrade(),
				link: link.downgrade(),
				routes: Arc::new(routes),
			};

			let handle = tokio::spawn(
				async move {
					let reason = loop {
						match Self::cycle(&mut state, &mut ctx).in_current_span().await {
							ControlFlow::Continue(_) => {}
							ControlFlow::Break(reason) => break reason,
						}
					};

					// answer whatever is still queued
					ctx.rx.close();
					while let Ok(invocation) = ctx.rx.try_recv() {
						invocation.handler.on_throw(&RpcError::ActorStopped(ctx.id));
					}

					tracing::debug!(?reason, "Actor terminating");
					Actor::terminate(state, ctx, reason).in_current_span().await;
				}
				.instrument(span.clone()),
			);

			let weak = system.downgrade();
			tokio::spawn(
				async move {
					match handle.await {
						Ok(()) => {
							tracing::info!("Actor {} stopped", type_name::<Self>());
						}
						Err(err) => {
							tracing::error!("Actor {} crashed", type_name::<Self>());
							Self::crash(err).await
						}
					}

					if let Some(system) = weak.upgrade() {
						system.resign_id(id);
					}
				}
				.instrument(span),
			);

			Ok(link)
		}
	}
}
