//! End-to-end flows: decoding real payloads, medium round trips, conversion,
//! guarded calls, and schema projection.

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use typeshift::{
    array, guard, json_schema, literal, mediums, number, object, optional, recursive, string,
    timestamp, union, Atomic, AtomicCodec, Medium, Value,
};

fn json(v: serde_json::Value) -> Value {
    Value::from_json(v)
}

// ==================== JSON text ====================

#[test]
fn decode_json_payload() {
    let user = object([("id", string()), ("age", number())]);
    let decoded = user
        .decode(&mediums::json(), &r#"{"id":"abc","age":30}"#.to_string())
        .expect("decode succeeds");
    assert_eq!(decoded, json(serde_json::json!({"id": "abc", "age": 30})));
}

#[test]
fn decode_drops_undeclared_keys() {
    let user = object([("id", string()), ("age", number())]);
    let decoded = user
        .decode(
            &mediums::json(),
            &r#"{"id":"abc","age":30,"extra":"x"}"#.to_string(),
        )
        .expect("open decode succeeds");
    // The output carries only what the descriptor declares.
    assert_eq!(decoded, json(serde_json::json!({"id": "abc", "age": 30})));
}

#[test]
fn json_round_trip() {
    let user = object([
        ("id", string()),
        ("age", number()),
        ("tags", optional(array(string()))),
    ]);
    let text = r#"{"id":"abc","age":30,"tags":["a","b"]}"#.to_string();
    let decoded = user.decode(&mediums::json(), &text).expect("decode");
    let encoded = user.encode(&mediums::json(), &decoded).expect("encode");
    assert_eq!(encoded, text);
}

#[test]
fn malformed_json_is_an_unpack_error() {
    let user = object([("id", string())]);
    let err = user
        .decode(&mediums::json(), &"{not json".to_string())
        .expect_err("unpack fails");
    assert!(err.to_string().starts_with("Failed to unpack \"json\" medium payload:"));
    assert!(err.issues().is_empty());
}

// ==================== Timestamps ====================

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

#[test]
fn timestamps_travel_as_rfc3339_strings() {
    let event = object([("at", timestamp())]);
    let native = Value::Object(IndexMap::from([(
        "at".to_string(),
        Value::Timestamp(noon()),
    )]));
    let text = event.encode(&mediums::json(), &native).expect("encode");
    assert_eq!(text, r#"{"at":"2024-05-01T12:00:00Z"}"#);
    let back = event.decode(&mediums::json(), &text).expect("decode");
    assert_eq!(back, native);
}

#[test]
fn native_medium_passes_timestamps_through() {
    let event = object([("at", timestamp())]);
    let native = Value::Object(IndexMap::from([(
        "at".to_string(),
        Value::Timestamp(noon()),
    )]));
    let out = event.decode(&mediums::native(), &native).expect("decode");
    assert_eq!(out, native);
}

#[test]
fn bad_rfc3339_string_is_a_decode_issue() {
    let event = object([("at", timestamp())]);
    let err = event
        .decode(&mediums::json(), &r#"{"at":"yesterday-ish"}"#.to_string())
        .expect_err("decode fails");
    let rendered = err.to_string();
    assert!(rendered.contains("[\"at\"]"));
    assert!(rendered.contains("Expected an RFC 3339 timestamp"));
}

// ==================== Conversion ====================

#[test]
fn convert_json_to_string_map() {
    let user = object([("id", string()), ("age", number())]);
    let out = user
        .convert(
            &mediums::json(),
            &mediums::string_map(),
            &r#"{"id":"abc","age":30}"#.to_string(),
        )
        .expect("convert succeeds");
    let expected: IndexMap<String, String> = IndexMap::from([
        ("id".to_string(), "abc".to_string()),
        ("age".to_string(), "30".to_string()),
    ]);
    assert_eq!(out, expected);
}

#[test]
fn convert_string_map_to_json() {
    let user = object([("id", string()), ("age", number())]);
    let packed: IndexMap<String, String> = IndexMap::from([
        ("id".to_string(), "abc".to_string()),
        ("age".to_string(), "30".to_string()),
    ]);
    let text = user
        .convert(&mediums::string_map(), &mediums::json(), &packed)
        .expect("convert succeeds");
    assert_eq!(text, r#"{"id":"abc","age":30}"#);
}

#[test]
fn convert_reports_issues_with_both_medium_names() {
    let user = object([("age", number())]);
    let err = user
        .convert(
            &mediums::json(),
            &mediums::string_map(),
            &r#"{"age":true}"#.to_string(),
        )
        .expect_err("convert fails");
    let rendered = err.to_string();
    assert!(rendered.starts_with("Failed to convert from \"json\" medium to \"string-map\" medium:"));
    assert!(rendered.contains("[\"age\"]: Expected a number, got a boolean."));
}

// ==================== string_map decoding ====================

#[test]
fn string_map_parses_atomics_from_strings() {
    let query = object([
        ("page", number()),
        ("verbose", typeshift::boolean()),
        ("q", string()),
    ]);
    let packed: IndexMap<String, String> = IndexMap::from([
        ("page".to_string(), "30".to_string()),
        ("verbose".to_string(), "true".to_string()),
        ("q".to_string(), "rust".to_string()),
    ]);
    let decoded = query
        .decode(&mediums::string_map(), &packed)
        .expect("decode succeeds");
    assert_eq!(
        decoded,
        json(serde_json::json!({"page": 30, "verbose": true, "q": "rust"}))
    );
}

#[test]
fn string_map_rejects_unparsable_numbers() {
    let query = object([("page", number())]);
    let packed: IndexMap<String, String> =
        IndexMap::from([("page".to_string(), "thirty".to_string())]);
    let err = query
        .decode(&mediums::string_map(), &packed)
        .expect_err("decode fails");
    assert!(err
        .to_string()
        .contains("[\"page\"]: Expected a numeric string, got \"thirty\"."));
}

// ==================== Extending mediums ====================

#[test]
fn extended_medium_overrides_one_codec() {
    // Same packing and codecs as json_value, except timestamps travel as
    // unix seconds.
    let unix_json = mediums::json_value().extend("unix-json").with_codec(
        Atomic::Timestamp,
        AtomicCodec::new(
            |v| match v {
                Value::Timestamp(t) => Ok(Value::Int(t.timestamp())),
                other => Err(format!("Expected a timestamp, got {}.", other.kind_name())),
            },
            |v| match v {
                Value::Int(secs) => DateTime::<Utc>::from_timestamp(*secs, 0)
                    .map(Value::Timestamp)
                    .ok_or_else(|| format!("Timestamp {secs} is out of range.")),
                other => Err(format!(
                    "Expected a unix timestamp, got {}.",
                    other.kind_name()
                )),
            },
        ),
    );

    let event = object([("at", timestamp()), ("name", string())]);
    let native = Value::Object(IndexMap::from([
        ("at".to_string(), Value::Timestamp(noon())),
        ("name".to_string(), Value::String("launch".to_string())),
    ]));
    let wire = event.encode(&unix_json, &native).expect("encode");
    assert_eq!(
        wire,
        json(serde_json::json!({"at": noon().timestamp(), "name": "launch"}))
    );
    let back = event.decode(&unix_json, &wire).expect("decode");
    assert_eq!(back, native);
}

#[test]
#[should_panic(expected = "Unknown codec symbol")]
fn medium_without_codec_panics_at_the_leaf() {
    let bare: Medium<Value> = Medium::new("bare");
    let _ = string().decode(&bare, &Value::String("x".to_string()));
}

// ==================== Guarded calls ====================

#[test]
fn guard_decodes_arguments_and_encodes_the_result() {
    let add = guard(
        vec![number(), number()],
        number(),
        mediums::json_value(),
        |args| {
            let a = args[0].as_f64().expect("first arg is numeric");
            let b = args[1].as_f64().expect("second arg is numeric");
            Value::Float(a + b)
        },
    );
    let out = add(&[Value::Int(2), Value::Float(0.5)]).expect("call succeeds");
    assert_eq!(out, Value::Float(2.5));
}

#[test]
fn guard_reports_bad_arguments_by_position() {
    let add = guard(
        vec![number(), number()],
        number(),
        mediums::json_value(),
        |_| Value::Int(0),
    );
    let err = add(&[Value::Int(1), Value::String("two".to_string())])
        .expect_err("call fails");
    assert!(err
        .to_string()
        .contains("[args[1]]: Expected a number, got a string."));
}

#[test]
fn guard_checks_arity_before_decoding() {
    let add = guard(
        vec![number(), number()],
        number(),
        mediums::json_value(),
        |_| Value::Int(0),
    );
    let err = add(&[Value::Int(1)]).expect_err("call fails");
    assert!(err.to_string().contains("Expected 2 argument(s), got 1."));
}

// ==================== Error rendering ====================

#[test]
fn decode_error_renders_one_issue_per_line() {
    let ty = object([("foo", string()), ("bar", array(number()))]);
    let err = ty
        .decode(
            &mediums::json_value(),
            &json(serde_json::json!({"foo": 1, "bar": [true]})),
        )
        .expect_err("decode fails");
    let rendered = err.to_string();
    assert_eq!(
        rendered,
        "Failed to decode from \"json-value\" medium:\n\
         [\"foo\"]: Expected a string, got an integer.\n\
         [\"bar\"][0]: Expected a number, got a boolean."
    );
}

#[test]
fn diagnose_is_deterministic() {
    let ty = object([("a", string()), ("b", union(vec![number(), string()]))]);
    let value = json(serde_json::json!({"a": 1, "b": true}));
    let first = ty.diagnose(&value);
    let second = ty.diagnose(&value);
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

// ==================== Schema projection ====================

#[test]
fn schema_for_exact_object() {
    let user = object([
        ("id", string()),
        ("age", number()),
        ("tags", optional(array(string()))),
    ])
    .exact();
    let schema = json_schema(&user);
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["properties"]["id"]["type"], "string");
    assert_eq!(schema["properties"]["tags"]["type"], "array");
    assert_eq!(
        schema["required"],
        serde_json::json!(["id", "age"])
    );
    assert_eq!(schema["additionalProperties"], serde_json::json!(false));
}

#[test]
fn schema_for_recursive_descriptor_uses_defs() {
    let tree = recursive(|node| {
        object([
            ("label", string()),
            ("children", array(node.clone())),
        ])
    });
    let schema = json_schema(&tree);
    assert_eq!(schema["type"], "object");
    assert_eq!(
        schema["properties"]["children"]["items"]["$ref"],
        "#/$defs/def0"
    );
    let def = &schema["$defs"]["def0"];
    assert_eq!(def["type"], "object");
    assert_eq!(
        def["properties"]["children"]["items"]["$ref"],
        "#/$defs/def0"
    );
}

#[test]
fn schema_for_literal_carries_const() {
    let kind = union(vec![literal("a"), string()]);
    let schema = json_schema(&kind);
    let first = &schema["anyOf"][0];
    // Literal projects as the base type constrained to one value.
    assert_eq!(first["allOf"][1]["const"], "a");
}
