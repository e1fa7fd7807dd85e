mod actor;
mod call;
mod cancel;
mod channel;
mod command;
mod config;
mod envelope;
mod error;
mod handler;
mod id;
mod invocation;
mod link;
mod local;
mod promise;
mod remote;
mod serialization;
mod system;
mod wire;

pub mod prelude {
	pub use super::actor::Actor;
	pub use super::actor::Init;
	pub use super::actor::InitFuture;
	pub use super::handler::Call;
	pub use super::handler::Exec;
	pub use super::handler::Handler;
	pub use super::handler::Method;
	pub use super::handler::Routes;
	pub use super::invocation::InvocationDecoder;
	pub use super::invocation::InvocationEncoder;
	pub use super::error::SerializationError;
}

pub use actor::Actor;
pub use actor::ActorContext;
pub use actor::Init;
pub use call::CallHandle;
pub use call::RemoteRef;
pub use cancel::CancelToken;
pub use cancel::Teardown;
pub use channel::Connection;
pub use channel::Listener;
pub use channel::MessageReceiver;
pub use channel::MessageSender;
pub use channel::MpscTransport;
pub use channel::Peer;
pub use channel::Transport;
pub use command::Command;
pub use command::CommandKind;
pub use command::Rejection;
pub use config::Config;
pub use envelope::InvocationEnvelope;
pub use envelope::InvocationReturn;
pub use error::ChannelError;
pub use error::InvalidCommand;
pub use error::RpcError;
pub use error::SerializationError;
pub use error::SystemError;
pub use error::SystemErrorKind;
pub use handler::Call;
pub use handler::Exec;
pub use handler::Handler;
pub use handler::Method;
pub use handler::Routes;
pub use id::ActorId;
pub use id::CallId;
pub use invocation::Invocation;
pub use invocation::InvocationDecoder;
pub use invocation::InvocationEncoder;
pub use invocation::ResultHandler;
pub use link::Link;
pub use link::WeakLink;
pub use local::LocalReceptionist;
pub use promise::Promise;
pub use remote::RemoteReceptionist;
pub use serialization::Serialization;
pub use serialization::TypeRegistry;
pub use serialization::TypeTag;
pub use system::ActorSystem;
pub use system::DistributedActor;
pub use system::WeakSystem;
pub use wire::Dictionary;
pub use wire::Value;
