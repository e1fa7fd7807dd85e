use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::Weak;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendError;

use crate::actor::Actor;
use crate::cancel::CancelToken;
use crate::cancel::Teardown;
use crate::error::RpcError;
use crate::id::ActorId;
use crate::invocation::Invocation;
use crate::system::DistributedActor;

pub struct LinkState<A: Actor> {
	pub id: ActorId,
	pub tx: mpsc::Sender<Invocation>,
	pub token: CancelToken,
	_actor: PhantomData<fn() -> A>,
}

/// Handle to a hosted actor. This is what its actor system registers.
pub struct Link<A: Actor> {
	pub(crate) state: Arc<LinkState<A>>,
}

impl<A: Actor> Debug for Link<A> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Link")
			.field("id", &self.state.id)
			.field("alive", &self.alive())
			.finish()
	}
}

impl<A: Actor> Clone for Link<A> {
	fn clone(&self) -> Self {
		let state = self.state.clone();
		Self { state }
	}
}

impl<A: Actor> Link<A> {
	pub(crate) fn new(id: ActorId, tx: mpsc::Sender<Invocation>, token: CancelToken) -> Self {
		let state = Arc::new(LinkState {
			id,
			tx,
			token,
			_actor: PhantomData,
		});
		Self { state }
	}

	pub fn id(&self) -> ActorId {
		self.state.id
	}

	pub fn alive(&self) -> bool {
		!self.state.tx.is_closed()
	}

	pub fn stop(&self) {
		self.state.token.cancel(Teardown::Cancelled)
	}

	/// Stops the actor and waits until its mailbox is gone.
	pub async fn stop_and_wait(&self) {
		self.state.token.cancel(Teardown::Cancelled);
		self.state.tx.closed().await
	}

	pub fn downgrade(&self) -> WeakLink<A> {
		WeakLink {
			state: Arc::downgrade(&self.state),
		}
	}
}

impl<A: Actor> Drop for LinkState<A> {
	fn drop(&mut self) {
		self.token.cancel(Teardown::Cancelled)
	}
}

impl<A: Actor> DistributedActor for Link<A> {
	fn id(&self) -> ActorId {
		self.state.id
	}

	fn invoke(&self, invocation: Invocation) -> BoxFuture<'_, ()> {
		async move {
			if let Err(SendError(invocation)) = self.state.tx.send(invocation).await {
				invocation
					.handler
					.on_throw(&RpcError::ActorStopped(self.state.id));
			}
		}
		.boxed()
	}
}

pub struct WeakLink<A: Actor> {
	state: Weak<LinkState<A>>,
}

impl<A: Actor> Clone for WeakLink<A> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
		}
	}
}

impl<A: Actor> WeakLink<A> {
	pub fn upgrade(&self) -> Option<Link<A>> {
		self.state.upgrade().map(|state| Link { state })
	}

	pub fn stop(&self) {
		if let Some(link) = self.upgrade() {
			link.stop();
		}
	}
}
