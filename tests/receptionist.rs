use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt as _;
use runy_remote::ActorId;
use runy_remote::CancelToken;
use runy_remote::ChannelError;
use runy_remote::Command;
use runy_remote::Connection;
use runy_remote::Dictionary;
use runy_remote::InvocationEnvelope;
use runy_remote::InvocationReturn;
use runy_remote::MpscTransport;
use runy_remote::Rejection;
use runy_remote::RemoteReceptionist;
use runy_remote::Teardown;

mod common;

const WAIT: Duration = Duration::from_secs(1);

fn receptionist() -> (RemoteReceptionist, Connection) {
	common::init_tracing();
	let (client, raw) = MpscTransport::pair("receptionist");
	let receptionist = RemoteReceptionist::new(client, CancelToken::new());
	receptionist.resume();
	(receptionist, raw)
}

fn greet() -> InvocationEnvelope {
	InvocationEnvelope {
		target: Some("Greeter.greet".to_string()),
		arguments: vec![Bytes::from_static(b"[\"hi\"]")],
		..Default::default()
	}
}

async fn next(raw: &mut Connection) -> Dictionary {
	tokio::time::timeout(WAIT, raw.recv())
		.await
		.expect("peer received nothing")
		.expect("connection closed")
}

#[tokio::test]
async fn invalid_command_gets_rejected() {
	let (receptionist, mut raw) = receptionist();

	let id = uuid::Uuid::new_v4();
	raw.send(Dictionary::new().with("command", 0i64).with("uuid", id))
		.unwrap();

	let reply = next(&mut raw).await;
	let rejection = Rejection::decode(&reply).unwrap();
	assert!(rejection.is_invalid());
	assert_eq!(rejection.id.map(|id| id.as_uuid()), Some(id));

	// the connection survives
	assert!(!receptionist.is_cancelled());
	let (_, promise) = receptionist.send_invocation(greet(), ActorId::DEFAULT);
	let command = Command::decode(&next(&mut raw).await).unwrap();
	assert!(matches!(command, Command::Invocation { .. }));
	assert!(!promise.is_fulfilled());
}

#[tokio::test]
async fn rejections_are_never_rejected() {
	let (receptionist, mut raw) = receptionist();

	raw.send(Rejection::of(&Dictionary::new()).encode()).unwrap();
	raw.send(Dictionary::new().with("error", "whatever")).unwrap();

	tokio::time::sleep(Duration::from_millis(50)).await;
	assert!(raw.receiver.recv().now_or_never().is_none());
	assert!(!receptionist.is_cancelled());
}

#[tokio::test]
async fn returns_are_matched_by_correlation_id() {
	let (receptionist, mut raw) = receptionist();

	let (first_id, first) = receptionist.send_invocation(greet(), ActorId::DEFAULT);
	let (second_id, second) = receptionist.send_invocation(greet(), ActorId::DEFAULT);
	assert_eq!(receptionist.pending_invocations(), 2);

	let sent_first = Command::decode(&next(&mut raw).await).unwrap();
	let sent_second = Command::decode(&next(&mut raw).await).unwrap();
	assert_eq!(sent_first.id(), first_id);
	assert_eq!(sent_second.id(), second_id);

	// a stray return must not disturb anything
	raw.send(
		Command::Return {
			id: runy_remote::CallId::random(),
			actor: ActorId::DEFAULT,
			result: InvocationReturn::returning(Bytes::from_static(b"[\"stray\"]")),
		}
		.encode(),
	)
	.unwrap();

	raw.send(
		Command::Return {
			id: second_id,
			actor: ActorId::DEFAULT,
			result: InvocationReturn::returning(Bytes::from_static(b"[\"second\"]")),
		}
		.encode(),
	)
	.unwrap();

	let result = tokio::time::timeout(WAIT, second.value()).await.unwrap();
	assert_eq!(result.return_data, Some(Bytes::from_static(b"[\"second\"]")));
	assert!(!first.is_fulfilled());
	assert_eq!(receptionist.pending_invocations(), 1);

	raw.send(
		Command::Return {
			id: first_id,
			actor: ActorId::DEFAULT,
			result: InvocationReturn::throwing(Bytes::from_static(b"[\"first\"]")),
		}
		.encode(),
	)
	.unwrap();

	let result = tokio::time::timeout(WAIT, first.value()).await.unwrap();
	assert_eq!(result.error_data, Some(Bytes::from_static(b"[\"first\"]")));
	assert_eq!(receptionist.pending_invocations(), 0);
}

#[tokio::test]
async fn cancel_resolves_every_pending_call() {
	let (receptionist, mut raw) = receptionist();

	let (_, first) = receptionist.send_invocation(greet(), ActorId::DEFAULT);
	let (_, second) = receptionist.send_invocation(greet(), ActorId::DEFAULT);

	receptionist.cancel();

	assert!(first.peek().unwrap().is_empty());
	assert!(second.peek().unwrap().is_empty());
	assert_eq!(receptionist.pending_invocations(), 0);
	assert_eq!(receptionist.closed().await, Teardown::Cancelled);

	// calls after teardown resolve right away
	let (_, late) = receptionist.send_invocation(greet(), ActorId::DEFAULT);
	assert!(late.peek().unwrap().is_empty());

	// the peer sees the connection go away
	let mut closed = false;
	for _ in 0..3 {
		if tokio::time::timeout(WAIT, raw.recv()).await.unwrap().is_none() {
			closed = true;
			break;
		}
	}
	assert!(closed);
}

#[tokio::test]
async fn peer_going_away_tears_down() {
	let (receptionist, raw) = receptionist();
	let (_, pending) = receptionist.send_invocation(greet(), ActorId::DEFAULT);

	drop(raw);

	let reason = tokio::time::timeout(WAIT, receptionist.closed()).await.unwrap();
	assert_eq!(reason, Teardown::PeerClosed);
	let result = tokio::time::timeout(WAIT, pending.value()).await.unwrap();
	assert!(result.is_empty());
}

#[tokio::test]
async fn rejected_invocation_resolves_empty() {
	let (receptionist, mut raw) = receptionist();
	let (id, pending) = receptionist.send_invocation(greet(), ActorId::DEFAULT);

	let sent = next(&mut raw).await;
	assert_eq!(Command::decode(&sent).unwrap().id(), id);
	raw.send(Rejection::of(&sent).encode()).unwrap();

	let result = tokio::time::timeout(WAIT, pending.value()).await.unwrap();
	assert!(result.is_empty());
	assert!(!receptionist.is_cancelled());
}

#[tokio::test]
async fn malformed_return_is_rejected_and_resolves_the_call() {
	let (receptionist, mut raw) = receptionist();
	let (id, pending) = receptionist.send_invocation(greet(), ActorId::DEFAULT);
	next(&mut raw).await;

	let malformed = Dictionary::new()
		.with("command", 1i64)
		.with("uuid", id)
		.with("actor", ActorId::DEFAULT);
	raw.send(malformed).unwrap();

	let rejection = Rejection::decode(&next(&mut raw).await).unwrap();
	assert_eq!(rejection.id, Some(id));

	let result = tokio::time::timeout(WAIT, pending.value()).await.unwrap();
	assert!(result.is_empty());
}

#[tokio::test]
async fn inbound_invocations_reach_the_handler() {
	let (receptionist, mut raw) = receptionist();

	receptionist.set_invocation_handler(|envelope, actor, _call| {
		async move {
			assert_eq!(actor, ActorId::DEFAULT);
			let reply = format!("[\"{}\"]", envelope.target.unwrap_or_default());
			InvocationReturn::returning(Bytes::from(reply))
		}
		.boxed()
	});

	let id = runy_remote::CallId::random();
	raw.send(
		Command::Invocation {
			id,
			actor: ActorId::DEFAULT,
			envelope: greet(),
		}
		.encode(),
	)
	.unwrap();

	match Command::decode(&next(&mut raw).await).unwrap() {
		Command::Return {
			id: returned,
			actor,
			result,
		} => {
			assert_eq!(returned, id);
			assert_eq!(actor, ActorId::DEFAULT);
			assert_eq!(result.return_data, Some(Bytes::from_static(b"[\"Greeter.greet\"]")));
		}
		other => panic!("unexpected command {other:?}"),
	}
}

#[tokio::test]
async fn tickle_round_trip_leaves_both_sides_up() {
	common::init_tracing();
	let (client, server) = MpscTransport::pair("tickle");
	let client = RemoteReceptionist::new(client, CancelToken::new());
	let server = RemoteReceptionist::new(server, CancelToken::new());
	client.resume();
	server.resume();

	tokio::time::timeout(WAIT, client.tickle())
		.await
		.expect("tickle was never answered")
		.unwrap();

	assert!(!client.is_cancelled());
	assert!(!server.is_cancelled());
	assert_eq!(client.pending_invocations(), 0);
}

#[tokio::test]
async fn tickle_waits_for_the_answer() {
	let (receptionist, mut raw) = receptionist();

	let tickle = tokio::spawn({
		let receptionist = receptionist.clone();
		async move { receptionist.tickle().await }
	});

	let sent = next(&mut raw).await;
	assert!(sent.is_empty());
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert!(!tickle.is_finished());

	// a rejection for some call is not the answer
	raw.send(Rejection::of(&Dictionary::new().with("uuid", runy_remote::CallId::random())).encode())
		.unwrap();
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert!(!tickle.is_finished());

	raw.send(Rejection::of(&sent).encode()).unwrap();
	tokio::time::timeout(WAIT, tickle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn tickle_fails_when_the_peer_goes_away() {
	let (receptionist, raw) = receptionist();

	let tickle = tokio::spawn({
		let receptionist = receptionist.clone();
		async move { receptionist.tickle().await }
	});

	tokio::time::sleep(Duration::from_millis(50)).await;
	assert!(!tickle.is_finished());
	drop(raw);

	let result = tokio::time::timeout(WAIT, tickle).await.unwrap().unwrap();
	assert_eq!(result, Err(ChannelError::Closed));
	assert!(receptionist.tickle().await.is_err());
}

#[tokio::test]
async fn extra_error_key_does_not_turn_a_return_into_a_rejection() {
	let (receptionist, mut raw) = receptionist();
	let (id, pending) = receptionist.send_invocation(greet(), ActorId::DEFAULT);
	next(&mut raw).await;

	let mut message = Command::Return {
		id,
		actor: ActorId::DEFAULT,
		result: InvocationReturn::returning(Bytes::from_static(b"[\"ok\"]")),
	}
	.encode();
	message.insert("error", "extra");
	raw.send(message).unwrap();

	let result = tokio::time::timeout(WAIT, pending.value()).await.unwrap();
	assert_eq!(result.return_data, Some(Bytes::from_static(b"[\"ok\"]")));
	assert!(!result.is_empty());
}

#[tokio::test]
async fn cancel_drops_the_invocation_handler() {
	let (receptionist, mut raw) = receptionist();

	let calls = Arc::new(AtomicUsize::new(0));
	receptionist.set_invocation_handler({
		let calls = calls.clone();
		move |_envelope, _actor, _call| {
			calls.fetch_add(1, Ordering::SeqCst);
			futures::future::ready(InvocationReturn::empty()).boxed()
		}
	});
	assert_eq!(Arc::strong_count(&calls), 2);

	receptionist.cancel();

	// the installed handler is gone, not just unreachable
	assert_eq!(Arc::strong_count(&calls), 1);

	let _ = raw.send(
		Command::Invocation {
			id: runy_remote::CallId::random(),
			actor: ActorId::DEFAULT,
			envelope: greet(),
		}
		.encode(),
	);
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(calls.load(Ordering::SeqCst), 0);
}
