use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

/// Why a connection, system or actor was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
	/// Explicitly cancelled by its owner.
	Cancelled,
	/// The other side of the connection went away.
	PeerClosed,
	/// A newer connection to the same service took its place.
	Replaced,
	/// The actor factory refused the connection.
	Declined,
	/// The local receptionist shut down.
	Shutdown,
}

/// Hierarchical cancellation. Cancelling a token cancels every child created
/// from it; the first reason sticks.
#[derive(Clone)]
pub struct CancelToken {
	inner: Arc<Node>,
}

struct Node {
	state: watch::Sender<Option<Teardown>>,
	children: Mutex<Vec<Arc<Node>>>,
}

impl Default for CancelToken {
	fn default() -> Self {
		Self::new()
	}
}

impl Debug for CancelToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CancelToken")
			.field("state", &*self.inner.state.borrow())
			.finish()
	}
}

impl CancelToken {
	pub fn new() -> Self {
		Self {
			inner: Node::new(),
		}
	}

	pub fn child(&self) -> CancelToken {
		CancelToken {
			inner: self.inner.child(),
		}
	}

	pub fn cancel(&self, reason: Teardown) {
		self.inner.cancel(reason)
	}

	pub fn is_cancelled(&self) -> bool {
		self.inner.state.borrow().is_some()
	}

	pub fn reason(&self) -> Option<Teardown> {
		*self.inner.state.borrow()
	}

	pub async fn cancelled(&self) -> Teardown {
		let mut rx = self.inner.state.subscribe();
		loop {
			let current = *rx.borrow_and_update();
			if let Some(reason) = current {
				return reason;
			}

			// the sender lives as long as `self`, so this only fails on teardown
			if rx.changed().await.is_err() {
				std::future::pending::<()>().await;
			}
		}
	}
}

impl Node {
	fn new() -> Arc<Self> {
		Arc::new(Self {
			state: watch::Sender::new(None),
			children: Mutex::new(Vec::new()),
		})
	}

	fn child(self: &Arc<Self>) -> Arc<Self> {
		let mut children = self.children.lock();
		let node = Node::new();

		match *self.state.borrow() {
			Some(reason) => {
				node.state.send_replace(Some(reason));
			}
			None => {
				children.retain(|child| child.state.borrow().is_none());
				children.push(node.clone());
			}
		}

		node
	}

	fn cancel(&self, reason: Teardown) {
		// held so no child is added while we are cancelling
		let children = self.children.lock();

		let changed = self.state.send_if_modified(|state| match state {
			None => {
				*state = Some(reason);
				true
			}
			Some(_) => false,
		});

		if changed {
			for child in children.iter() {
				child.cancel(reason);
			}
		}
	}
}
