use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use runy_remote::Promise;
use tokio::sync::mpsc;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn first_fulfill_wins() {
	common::init_tracing();

	let promise = Promise::<usize>::new();
	let wins = Arc::new(AtomicUsize::new(0));

	let mut tasks = Vec::new();
	for value in 0..16 {
		let promise = promise.clone();
		let wins = wins.clone();
		tasks.push(tokio::spawn(async move {
			if promise.fulfill(value) {
				wins.fetch_add(1, Ordering::SeqCst);
			}
		}));
	}

	for task in tasks {
		task.await.unwrap();
	}

	assert_eq!(wins.load(Ordering::SeqCst), 1);
	let value = promise.peek().unwrap();
	assert_eq!(promise.value().await, value);
	assert!(!promise.fulfill(100));
	assert_eq!(promise.peek(), Some(value));
}

#[tokio::test]
async fn every_subscriber_sees_the_value_once() {
	let promise = Promise::<String>::new();
	let (tx, mut rx) = mpsc::unbounded_channel();

	for _ in 0..3 {
		let tx = tx.clone();
		promise.subscribe(move |value| {
			let _ = tx.send(value);
		});
	}

	promise.fulfill("done".to_string());
	promise.fulfill("again".to_string());

	for _ in 0..2 {
		let tx = tx.clone();
		promise.subscribe(move |value| {
			let _ = tx.send(value);
		});
	}
	drop(tx);

	let mut seen = Vec::new();
	while let Some(value) = rx.recv().await {
		seen.push(value);
	}

	assert_eq!(seen, vec!["done".to_string(); 5]);
}

#[tokio::test]
async fn waiter_resumes_after_fulfill() {
	let promise = Promise::<i64>::new();

	let waiter = tokio::spawn({
		let promise = promise.clone();
		async move { promise.value().await }
	});

	tokio::time::sleep(Duration::from_millis(20)).await;
	assert!(!waiter.is_finished());
	assert!(!promise.is_fulfilled());

	promise.fulfill(42);
	let value = tokio::time::timeout(Duration::from_secs(1), waiter)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(value, 42);
}

#[tokio::test]
async fn subscriber_may_call_back_into_the_promise() {
	let promise = Promise::<u32>::new();
	let (tx, mut rx) = mpsc::unbounded_channel();

	let inner = promise.clone();
	promise.subscribe(move |value| {
		// would deadlock if callbacks ran under the state lock
		let tx = tx.clone();
		inner.subscribe(move |again| {
			let _ = tx.send((value, again));
		});
	});

	promise.fulfill(7);
	assert_eq!(rx.recv().await, Some((7, 7)));
}

#[test]
fn runs_inline_without_runtime() {
	let promise = Promise::<u8>::fulfilled(3);
	let calls = Arc::new(AtomicUsize::new(0));

	let counter = calls.clone();
	promise.subscribe(move |value| {
		assert_eq!(value, 3);
		counter.fetch_add(1, Ordering::SeqCst);
	});

	assert_eq!(calls.load(Ordering::SeqCst), 1);
}
