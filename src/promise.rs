use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

type Callback<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Single-fulfillment value cell with any number of subscribers.
///
/// The first `fulfill` wins and later attempts are ignored. Every subscriber,
/// whether it subscribed before or after fulfillment, is called exactly once
/// with the value. Callbacks are never run while the state lock is held; inside
/// a tokio runtime they run on their own task. Outside of one they run inline
/// on the thread that fulfilled or subscribed, after the lock is released.
pub struct Promise<T> {
	inner: Arc<Inner<T>>,
}

struct Inner<T> {
	state: Mutex<State<T>>,
	runtime: Option<Handle>,
}

struct State<T> {
	result: Option<T>,
	callbacks: Vec<Callback<T>>,
}

impl<T> Clone for Promise<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T: Clone + Send + 'static> Default for Promise<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("Promise")
			.field("result", &state.result)
			.field("subscribers", &state.callbacks.len())
			.finish()
	}
}

impl<T: Clone + Send + 'static> Promise<T> {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Inner {
				state: Mutex::new(State {
					result: None,
					callbacks: Vec::new(),
				}),
				runtime: Handle::try_current().ok(),
			}),
		}
	}

	pub fn fulfilled(value: T) -> Self {
		let promise = Self::new();
		promise.fulfill(value);
		promise
	}

	/// Records `value` and fans it out. Returns `false` if the promise was
	/// already fulfilled, in which case nothing changes.
	pub fn fulfill(&self, value: T) -> bool {
		let callbacks = {
			let mut state = self.inner.state.lock();
			if state.result.is_some() {
				tracing::debug!("Ignoring repeated promise fulfillment");
				return false;
			}
			state.result = Some(value.clone());
			std::mem::take(&mut state.callbacks)
		};

		for callback in callbacks {
			self.inner.schedule(callback, value.clone());
		}

		true
	}

	pub fn subscribe(&self, callback: impl FnOnce(T) + Send + 'static) {
		let value = {
			let mut state = self.inner.state.lock();
			match &state.result {
				Some(value) => value.clone(),
				None => {
					state.callbacks.push(Box::new(callback));
					return;
				}
			}
		};

		self.inner.schedule(Box::new(callback), value);
	}

	pub fn is_fulfilled(&self) -> bool {
		self.inner.state.lock().result.is_some()
	}

	pub fn peek(&self) -> Option<T> {
		self.inner.state.lock().result.clone()
	}

	/// Suspends until the promise is fulfilled.
	pub async fn value(&self) -> T {
		let (tx, rx) = oneshot::channel();
		self.subscribe(move |value| {
			let _ = tx.send(value);
		});

		match rx.await {
			Ok(value) => value,
			// the callback is owned by the state we keep alive, so it can not
			// be dropped without running
			Err(_) => std::future::pending().await,
		}
	}
}

impl<T: Send + 'static> Inner<T> {
	fn schedule(&self, callback: Callback<T>, value: T) {
		match Handle::try_current().ok().or_else(|| self.runtime.clone()) {
			Some(runtime) => {
				runtime.spawn(async move { callback(value) });
			}
			None => callback(value),
		}
	}
}
