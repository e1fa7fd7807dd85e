#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt as _;
use futures::future::BoxFuture;
use runy_remote::ActorId;
use runy_remote::DistributedActor;
use runy_remote::Invocation;
use runy_remote::LocalReceptionist;
use runy_remote::MpscTransport;
use runy_remote::prelude::*;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

/// Polls `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
	for _ in 0..100 {
		if check() {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	check()
}

pub struct Greeter {
	suffix: String,
}

pub struct Greet(pub String);

pub struct Fail(pub String);

pub struct Sleep(pub u64);

impl Method for Greet {
	const TARGET: &'static str = "Greeter.greet";
	type Reply = String;

	fn encode(&self, encoder: &mut InvocationEncoder) -> Result<(), SerializationError> {
		encoder.record_argument(&self.0)
	}

	fn decode(decoder: &mut InvocationDecoder) -> Result<Self, SerializationError> {
		Ok(Self(decoder.decode_next_argument()?))
	}
}

impl Method for Fail {
	const TARGET: &'static str = "Greeter.fail";
	type Reply = String;

	fn encode(&self, encoder: &mut InvocationEncoder) -> Result<(), SerializationError> {
		encoder.record_argument(&self.0)
	}

	fn decode(decoder: &mut InvocationDecoder) -> Result<Self, SerializationError> {
		Ok(Self(decoder.decode_next_argument()?))
	}
}

impl Method for Sleep {
	const TARGET: &'static str = "Greeter.sleep";
	type Reply = ();

	fn encode(&self, encoder: &mut InvocationEncoder) -> Result<(), SerializationError> {
		encoder.record_argument(&self.0)
	}

	fn decode(decoder: &mut InvocationDecoder) -> Result<Self, SerializationError> {
		Ok(Self(decoder.decode_next_argument()?))
	}
}

impl Actor for Greeter {
	type Spec = String;

	fn routes(routes: &mut Routes<Self>) {
		routes.method::<Greet>().method::<Fail>().method::<Sleep>();
	}

	fn init(ctx: Init<'_, Self>) -> impl InitFuture<Self> {
		futures::future::ready(Ok(Greeter { suffix: ctx.spec }))
	}
}

impl Handler<Greet> for Greeter {
	async fn handle(&mut self, _ctx: Call<'_, Self>, method: Greet) -> anyhow::Result<String> {
		Ok(format!("{} {}", method.0, self.suffix))
	}
}

impl Handler<Fail> for Greeter {
	async fn handle(&mut self, _ctx: Call<'_, Self>, method: Fail) -> anyhow::Result<String> {
		anyhow::bail!("{}", method.0)
	}
}

impl Handler<Sleep> for Greeter {
	async fn handle(&mut self, _ctx: Call<'_, Self>, method: Sleep) -> anyhow::Result<()> {
		tokio::time::sleep(Duration::from_millis(method.0)).await;
		Ok(())
	}
}

pub struct Counter {
	value: i64,
}

pub struct Add(pub i64);

pub struct Get;

impl Method for Add {
	const TARGET: &'static str = "Counter.add";
	type Reply = i64;

	fn encode(&self, encoder: &mut InvocationEncoder) -> Result<(), SerializationError> {
		encoder.record_argument(&self.0)
	}

	fn decode(decoder: &mut InvocationDecoder) -> Result<Self, SerializationError> {
		Ok(Self(decoder.decode_next_argument()?))
	}
}

impl Method for Get {
	const TARGET: &'static str = "Counter.get";
	type Reply = i64;

	fn encode(&self, _encoder: &mut InvocationEncoder) -> Result<(), SerializationError> {
		Ok(())
	}

	fn decode(_decoder: &mut InvocationDecoder) -> Result<Self, SerializationError> {
		Ok(Self)
	}
}

impl Actor for Counter {
	type Spec = i64;

	fn routes(routes: &mut Routes<Self>) {
		routes.method::<Add>().method::<Get>();
	}

	fn init(ctx: Init<'_, Self>) -> impl InitFuture<Self> {
		let value = ctx.spec;
		async move {
			if value < 0 {
				anyhow::bail!("counter can not start below zero");
			}
			Ok(Counter { value })
		}
	}
}

impl Handler<Add> for Counter {
	async fn handle(&mut self, _ctx: Call<'_, Self>, method: Add) -> anyhow::Result<i64> {
		let value = self.value;
		// yield so concurrent calls would interleave if they were not serialized
		tokio::task::yield_now().await;
		self.value = value + method.0;
		Ok(self.value)
	}
}

impl Handler<Get> for Counter {
	async fn handle(&mut self, _ctx: Call<'_, Self>, _method: Get) -> anyhow::Result<i64> {
		Ok(self.value)
	}
}

/// Registered by hand, answers nothing.
pub struct Mute {
	pub id: ActorId,
}

impl DistributedActor for Mute {
	fn id(&self) -> ActorId {
		self.id
	}

	fn invoke(&self, invocation: Invocation) -> BoxFuture<'_, ()> {
		drop(invocation);
		futures::future::ready(()).boxed()
	}
}

pub fn greeter_server(transport: &Arc<MpscTransport>, service: &str) -> LocalReceptionist {
	let server = LocalReceptionist::new(transport.clone());
	server
		.listen::<Greeter, _>(service, |_peer| Some("back".to_string()))
		.unwrap();
	server
}
