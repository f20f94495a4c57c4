//! Built-in mediums.
//!
//! - [`native`]: in-memory values, identity codecs.
//! - [`json_value`]: an already-parsed JSON tree; timestamps travel as
//!   RFC 3339 strings.
//! - [`json`]: JSON text, packing through `serde_json`.
//! - [`string_map`]: flat string records (query strings, env-style maps);
//!   every atomic transcodes to a string.

use crate::medium::{AtomicCodec, Medium};
use crate::ty::Atomic;
use crate::value::Value;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;

fn with_identity_codecs<P>(medium: Medium<P>) -> Medium<P> {
    medium
        .with_codec(Atomic::Boolean, AtomicCodec::identity())
        .with_codec(Atomic::Integer, AtomicCodec::identity())
        .with_codec(Atomic::Number, AtomicCodec::identity())
        .with_codec(Atomic::String, AtomicCodec::identity())
        .with_codec(Atomic::Timestamp, AtomicCodec::identity())
}

/// In-memory values: no packing, every codec is a pass-through.
pub fn native() -> Medium<Value> {
    with_identity_codecs(Medium::new("native"))
}

fn timestamp_to_rfc3339(value: &Value) -> Result<Value, String> {
    match value {
        Value::Timestamp(t) => Ok(Value::String(
            t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        )),
        other => Err(format!("Expected a timestamp, got {}.", other.kind_name())),
    }
}

fn timestamp_from_rfc3339(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| Value::Timestamp(t.with_timezone(&Utc)))
            .map_err(|e| format!("Expected an RFC 3339 timestamp, got {s:?} ({e}).")),
        other => Err(format!(
            "Expected an RFC 3339 timestamp string, got {}.",
            other.kind_name()
        )),
    }
}

fn with_json_codecs<P>(medium: Medium<P>) -> Medium<P> {
    with_identity_codecs(medium).with_codec(
        Atomic::Timestamp,
        AtomicCodec::new(timestamp_to_rfc3339, timestamp_from_rfc3339),
    )
}

/// An already-parsed JSON tree: no packing, timestamps as RFC 3339 strings.
pub fn json_value() -> Medium<Value> {
    with_json_codecs(Medium::new("json-value"))
}

/// JSON text: [`json_value`] codecs plus packing through `serde_json`.
pub fn json() -> Medium<String> {
    with_json_codecs(Medium::with_packing(
        "json",
        |unpacked: &Value| {
            let tree = unpacked.to_json()?;
            serde_json::to_string(&tree).map_err(|e| e.to_string())
        },
        |text: &String| {
            serde_json::from_str::<serde_json::Value>(text)
                .map(Value::from_json)
                .map_err(|e| e.to_string())
        },
    ))
}

/// Flat string records: every atomic is a string on the wire.
pub fn string_map() -> Medium<IndexMap<String, String>> {
    Medium::with_packing(
        "string-map",
        |unpacked: &Value| match unpacked {
            Value::Object(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (k, v) in map {
                    match v {
                        Value::String(s) => {
                            out.insert(k.clone(), s.clone());
                        }
                        other => {
                            return Err(format!(
                                "entry {k:?} is {}, not a string; string-map packs only flat string objects",
                                other.kind_name()
                            ))
                        }
                    }
                }
                Ok(out)
            }
            other => Err(format!(
                "string-map packs only objects, got {}",
                other.kind_name()
            )),
        },
        |packed: &IndexMap<String, String>| {
            Ok(Value::Object(
                packed
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ))
        },
    )
    .with_codec(
        Atomic::Boolean,
        AtomicCodec::new(
            |v| match v {
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(format!("Expected a boolean, got {}.", other.kind_name())),
            },
            |v| match v.as_str() {
                Some("true") => Ok(Value::Bool(true)),
                Some("false") => Ok(Value::Bool(false)),
                Some(s) => Err(format!("Expected \"true\" or \"false\", got {s:?}.")),
                None => Err(format!("Expected a string, got {}.", v.kind_name())),
            },
        ),
    )
    .with_codec(
        Atomic::Integer,
        AtomicCodec::new(
            |v| match v {
                Value::Int(x) => Ok(Value::String(x.to_string())),
                other => Err(format!("Expected an integer, got {}.", other.kind_name())),
            },
            |v| match v.as_str() {
                Some(s) => s
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| format!("Expected an integer string, got {s:?}.")),
                None => Err(format!("Expected a string, got {}.", v.kind_name())),
            },
        ),
    )
    .with_codec(
        Atomic::Number,
        AtomicCodec::new(
            |v| match v {
                Value::Int(x) => Ok(Value::String(x.to_string())),
                Value::Float(x) => Ok(Value::String(x.to_string())),
                other => Err(format!("Expected a number, got {}.", other.kind_name())),
            },
            |v| match v.as_str() {
                Some(s) => {
                    if let Ok(i) = s.parse::<i64>() {
                        Ok(Value::Int(i))
                    } else {
                        s.parse::<f64>()
                            .map(Value::Float)
                            .map_err(|_| format!("Expected a numeric string, got {s:?}."))
                    }
                }
                None => Err(format!("Expected a string, got {}.", v.kind_name())),
            },
        ),
    )
    .with_codec(Atomic::String, AtomicCodec::identity())
    .with_codec(
        Atomic::Timestamp,
        AtomicCodec::new(timestamp_to_rfc3339, timestamp_from_rfc3339),
    )
}
