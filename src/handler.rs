use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;

use futures::FutureExt as _;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::actor::Actor;
use crate::actor::ActorContext;
use crate::error::SerializationError;
use crate::id::CallId;
use crate::invocation::Invocation;
use crate::invocation::InvocationDecoder;
use crate::invocation::InvocationEncoder;

/// A remotely callable method: its target identifier, how its arguments go
/// into an envelope and how they come back out.
pub trait Method: Sized + Send + 'static {
	const TARGET: &'static str;

	type Reply: Serialize + DeserializeOwned + Send + 'static;

	fn encode(&self, encoder: &mut InvocationEncoder) -> Result<(), SerializationError>;

	fn decode(decoder: &mut InvocationDecoder) -> Result<Self, SerializationError>;
}

pub trait Handler<M: Method>: Actor {
	fn handle<'a>(
		&'a mut self,
		ctx: Call<'a, Self>,
		method: M,
	) -> impl Future<Output = anyhow::Result<M::Reply>> + use<'a, M, Self> + Send;
}

pub struct Exec<'a, A: Actor> {
	pub(crate) ctx: &'a mut ActorContext<A>,
}

/// Context of one inbound call.
pub struct Call<'a, A: Actor> {
	pub ctx: Exec<'a, A>,
	pub id: CallId,
}

impl<'a, A: Actor> Deref for Call<'a, A> {
	type Target = Exec<'a, A>;

	fn deref(&self) -> &Self::Target {
		&self.ctx
	}
}

impl<'a, A: Actor> DerefMut for Call<'a, A> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.ctx
	}
}

impl<'a, A: Actor> Exec<'a, A> {
	pub fn new(ctx: &'a mut ActorContext<A>) -> Self {
		Self { ctx }
	}
}

impl<'a, A: Actor> Deref for Exec<'a, A> {
	type Target = ActorContext<A>;

	fn deref(&self) -> &Self::Target {
		self.ctx
	}
}

impl<'a, A: Actor> DerefMut for Exec<'a, A> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		self.ctx
	}
}

pub(crate) trait Route<A: Actor>: Send + Sync + 'static {
	fn handle<'a>(&self, state: &'a mut A, ctx: Exec<'a, A>, invocation: Invocation) -> BoxFuture<'a, ()>;
}

struct MethodRoute<M>(PhantomData<fn() -> M>);

impl<A, M> Route<A> for MethodRoute<M>
where
	M: Method,
	A: Handler<M>,
{
	fn handle<'a>(&self, state: &'a mut A, ctx: Exec<'a, A>, invocation: Invocation) -> BoxFuture<'a, ()> {
		let (mut decoder, handler) = invocation.split();

		let method = match M::decode(&mut decoder) {
			Ok(method) => method,
			Err(err) => {
				tracing::warn!(method = M::TARGET, %err, "Failed to decode invocation");
				handler.on_throw(&err);
				return futures::future::ready(()).boxed();
			}
		};

		let call = Call {
			ctx,
			id: handler.call_id(),
		};
		let future = Handler::<M>::handle(state, call, method);

		async move {
			match future.await {
				Ok(reply) => {
					if let Err(err) = handler.on_return(&reply) {
						tracing::warn!(method = M::TARGET, %err, "Failed to encode reply");
					}
				}
				Err(err) => handler.on_throw(&err),
			}
		}
		.boxed()
	}
}

/// Target identifier to handler table of an actor type.
pub struct Routes<A: Actor> {
	routes: HashMap<&'static str, Arc<dyn Route<A>>>,
}

impl<A: Actor> Default for Routes<A> {
	fn default() -> Self {
		Self {
			routes: HashMap::new(),
		}
	}
}

impl<A: Actor> Routes<A> {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn method<M: Method>(&mut self) -> &mut Self
	where
		A: Handler<M>,
	{
		let route: Arc<dyn Route<A>> = Arc::new(MethodRoute::<M>(PhantomData));
		if self.routes.insert(M::TARGET, route).is_some() {
			tracing::warn!(method = M::TARGET, "Method registered twice");
		}
		self
	}

	pub fn contains(&self, target: &str) -> bool {
		self.routes.contains_key(target)
	}

	pub fn targets(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.routes.keys().copied()
	}

	pub(crate) fn get(&self, target: &str) -> Option<Arc<dyn Route<A>>> {
		self.routes.get(target).cloned()
	}
}
