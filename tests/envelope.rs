use std::sync::Arc;

use bytes::Bytes;
use runy_remote::ActorId;
use runy_remote::CallId;
use runy_remote::Command;
use runy_remote::CommandKind;
use runy_remote::Dictionary;
use runy_remote::InvalidCommand;
use runy_remote::InvocationDecoder;
use runy_remote::InvocationEncoder;
use runy_remote::InvocationEnvelope;
use runy_remote::InvocationReturn;
use runy_remote::Rejection;
use runy_remote::Serialization;
use runy_remote::SerializationError;
use runy_remote::TypeRegistry;
use runy_remote::Value;

fn envelope() -> InvocationEnvelope {
	InvocationEnvelope {
		target: Some("Greeter.greet".to_string()),
		generic_substitutions: vec!["String".to_string(), "i64".to_string()],
		arguments: vec![Bytes::from_static(b"[\"hi\"]"), Bytes::from_static(b"[2]")],
		return_type: Some("String".to_string()),
		error_type: None,
	}
}

#[test]
fn invocation_survives_the_wire_format() {
	let command = Command::Invocation {
		id: CallId::random(),
		actor: ActorId::DEFAULT,
		envelope: envelope(),
	};

	let message = command.encode();
	assert_eq!(message.int64("command"), Some(0));
	let nested = message.dictionary("envelope").unwrap();
	assert_eq!(nested.string("target"), Some("Greeter.greet"));
	assert_eq!(nested.array("arguments").map(|args| args.len()), Some(2));
	assert!(!nested.contains_key("errorType"));

	assert_eq!(Command::decode(&message).unwrap(), command);
}

#[test]
fn return_survives_the_wire_format() {
	let command = Command::Return {
		id: CallId::random(),
		actor: ActorId::random(),
		result: InvocationReturn::throwing(Bytes::from_static(b"[\"boom\"]")),
	};

	let message = command.encode();
	assert_eq!(message.int64("command"), Some(1));
	assert_eq!(Command::decode(&message).unwrap(), command);
}

#[test]
fn missing_fields_are_invalid() {
	let id = CallId::random();
	let actor = ActorId::random();

	let no_kind = Dictionary::new().with("uuid", id).with("actor", actor);
	assert_eq!(Command::decode(&no_kind), Err(InvalidCommand::MissingKind));

	let no_id = Dictionary::new().with("command", 0i64).with("actor", actor);
	assert_eq!(Command::decode(&no_id), Err(InvalidCommand::MissingId));

	let no_actor = Dictionary::new().with("command", 1i64).with("uuid", id);
	assert_eq!(Command::decode(&no_actor), Err(InvalidCommand::MissingActor));

	let no_envelope = Dictionary::new()
		.with("command", 0i64)
		.with("uuid", id)
		.with("actor", actor);
	assert_eq!(Command::decode(&no_envelope), Err(InvalidCommand::MissingEnvelope));

	let no_return = Dictionary::new()
		.with("command", 1i64)
		.with("uuid", id)
		.with("actor", actor);
	assert_eq!(Command::decode(&no_return), Err(InvalidCommand::MissingReturn));
}

#[test]
fn wrong_shapes_are_invalid() {
	let id = CallId::random();
	let actor = ActorId::random();

	let untargeted = Dictionary::new()
		.with("command", 0i64)
		.with("uuid", id)
		.with("actor", actor)
		.with("envelope", Dictionary::new());
	assert_eq!(Command::decode(&untargeted), Err(InvalidCommand::MissingEnvelope));

	let bad_arguments = Dictionary::new()
		.with("command", 0i64)
		.with("uuid", id)
		.with("actor", actor)
		.with(
			"envelope",
			Dictionary::new()
				.with("target", "Greeter.greet")
				.with("arguments", vec![Value::from("not bytes")]),
		);
	assert_eq!(
		Command::decode(&bad_arguments),
		Err(InvalidCommand::Malformed(SerializationError::MalformedEnvelope("arguments")))
	);

	let both_payloads = Dictionary::new()
		.with("command", 1i64)
		.with("uuid", id)
		.with("actor", actor)
		.with(
			"return",
			Dictionary::new()
				.with("returnData", Bytes::from_static(b"[1]"))
				.with("errorData", Bytes::from_static(b"[\"x\"]")),
		);
	assert!(matches!(
		Command::decode(&both_payloads),
		Err(InvalidCommand::Malformed(_))
	));

	let string_id = Dictionary::new()
		.with("command", 0i64)
		.with("uuid", "not a uuid")
		.with("actor", actor);
	assert_eq!(Command::decode(&string_id), Err(InvalidCommand::MissingId));
}

#[test]
fn unknown_kind_is_kept_aside() {
	let message = Dictionary::new()
		.with("command", 7i64)
		.with("uuid", CallId::random())
		.with("actor", ActorId::random());

	let command = Command::decode(&message).unwrap();
	assert_eq!(command.kind(), CommandKind::Other(7));
}

#[test]
fn empty_return_is_not_malformed() {
	let result = InvocationReturn::decode(&Dictionary::new()).unwrap();
	assert!(result.is_empty());
	assert!(InvocationReturn::empty().encode().is_empty());
}

#[test]
fn rejection_echoes_the_correlation_id() {
	let id = CallId::random();
	let garbage = Dictionary::new().with("uuid", id).with("command", "zero");

	let rejection = Rejection::of(&garbage);
	assert_eq!(rejection.id, Some(id));
	assert!(rejection.is_invalid());

	let message = rejection.encode();
	assert_eq!(message.string("error"), Some("invalid"));
	assert_eq!(message.uuid("uuid"), Some(id.as_uuid()));
	assert_eq!(Rejection::decode(&message), Some(rejection));

	let tickle = Rejection::of(&Dictionary::new()).encode();
	assert_eq!(tickle.len(), 1);
	assert!(Rejection::decode(&envelope().encode()).is_none());
}

#[test]
fn arguments_decode_in_recording_order() {
	for serialization in [Serialization::Json, Serialization::Bincode] {
		let types = Arc::new(TypeRegistry::new());
		let mut encoder = InvocationEncoder::new(serialization, types.clone());
		encoder.record_argument("hi").unwrap();
		encoder.record_argument(&42i64).unwrap();
		encoder.record_generic_substitution::<String>();
		encoder.record_return_type::<String>();
		encoder.record_error_type::<String>();

		let mut envelope = encoder.done_recording();
		envelope.target = Some("Greeter.greet".to_string());
		assert_eq!(envelope.generic_substitutions, vec!["String".to_string()]);

		let mut decoder = InvocationDecoder::new(envelope, serialization, types);
		assert_eq!(decoder.target(), "Greeter.greet");
		assert_eq!(decoder.remaining(), 2);
		assert_eq!(decoder.decode_next_argument::<String>().unwrap(), "hi");
		assert_eq!(decoder.decode_next_argument::<i64>().unwrap(), 42);
		assert_eq!(
			decoder.decode_next_argument::<i64>(),
			Err(SerializationError::NotEnoughArgumentsEncoded { expected: 3, have: 2 })
		);

		let generics = decoder.decode_generic_substitutions().unwrap();
		assert!(generics[0].is::<String>());
		assert!(decoder.decode_return_type().unwrap().unwrap().is::<String>());
		assert!(decoder.decode_error_type().unwrap().unwrap().is::<String>());
	}
}

#[test]
fn unknown_type_names_carry_a_hint() {
	let types = TypeRegistry::new();
	assert_eq!(
		types.resolve("Nope"),
		Err(SerializationError::NotAbleToDeserialize {
			hint: Some("Nope".to_string())
		})
	);

	let mut types = TypeRegistry::empty();
	types.register::<u8>("byte");
	assert_eq!(types.name_of::<u8>(), "byte");
	assert_eq!(types.name_of::<u16>(), std::any::type_name::<u16>());
	assert!(types.contains("byte"));
}

#[test]
fn payloads_must_hold_exactly_one_value() {
	let json = Serialization::Json;
	assert_eq!(json.serialize("hi").unwrap(), Bytes::from_static(b"[\"hi\"]"));
	assert_eq!(json.deserialize::<i64>(b"[1]").unwrap(), 1);
	assert_eq!(
		json.deserialize::<i64>(b"[1,2]"),
		Err(SerializationError::NotAbleToDeserialize {
			hint: Some("i64".to_string())
		})
	);
	assert!(matches!(
		json.deserialize::<i64>(b"\"x\""),
		Err(SerializationError::Codec { .. })
	));

	let bincode = Serialization::Bincode;
	let data = bincode.serialize(&(1u8, "two".to_string())).unwrap();
	assert_eq!(
		bincode.deserialize::<(u8, String)>(&data).unwrap(),
		(1, "two".to_string())
	);
}
