//! # typeshift — schema-driven validation and cross-format transcoding
//!
//! A schema is a tree of composable type descriptors (atomics, objects,
//! arrays, tuples, records, unions, intersections, optionals, recursive and
//! refined types). Given a descriptor, the engine can:
//!
//! - **diagnose** / **is** / **satisfies** — validate a runtime [`Value`]
//!   and report every problem with its path;
//! - **decode** — accept a payload from a wire representation (a *medium*)
//!   and produce a native value;
//! - **encode** — produce such a payload from a native value;
//! - **convert** — translate a payload directly between two mediums;
//! - **sanitize** — strip unknown or invalid structure, best effort.
//!
//! ## Descriptors
//!
//! ```
//! use typeshift::{array, number, object, string, Value};
//!
//! let user = object([
//!     ("id", string()),
//!     ("age", number()),
//!     ("tags", array(string()).optional()),
//! ]);
//! assert!(user.is(&Value::from_json(serde_json::json!({
//!     "id": "abc",
//!     "age": 30,
//! }))));
//! ```
//!
//! ## Closed objects
//!
//! `.exact()` rejects keys the schema does not declare, even when the key
//! set is assembled across intersections and unions; `.open()` is the
//! escape hatch. Record keys are open by design.
//!
//! ## Mediums
//!
//! A [`Medium`] is a codec table for atomic values plus an optional packing
//! transform. Built-ins: [`mediums::native`], [`mediums::json_value`],
//! [`mediums::json`], [`mediums::string_map`]. `Medium::extend` layers
//! further codecs onto an existing medium.
//!
//! ```
//! use typeshift::{mediums, number, object, string};
//!
//! let user = object([("id", string()), ("age", number())]);
//! let decoded = user
//!     .decode(&mediums::json(), &r#"{"id":"abc","age":30}"#.to_string())
//!     .expect("decode");
//! let text = user.encode(&mediums::json(), &decoded).expect("encode");
//! assert_eq!(text, r#"{"id":"abc","age":30}"#);
//! ```

pub mod issue;
pub mod medium;
pub mod mediums;
pub mod schema;
pub mod ty;
pub mod value;

mod exact;
mod merge;
mod ops;
mod traverse;

pub use issue::{Error, IssueList, Segment, TypeIssue, TypePath};
pub use medium::{AtomicCodec, CodecFn, Medium, Packing};
pub use ops::guard;
pub use schema::json_schema;
pub use ty::{
    array, atomic, boolean, integer, intersection, literal, number, object, optional, record,
    recursive, string, timestamp, tuple, union, Atomic, Refinement, Type, TypeKind,
};
pub use value::Value;
