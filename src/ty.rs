//! The type descriptor hierarchy.
//!
//! A schema is a tree of immutable descriptors built once at authoring time
//! and shared freely afterwards; traversal never mutates it. Descriptor
//! identity (the shared allocation) is significant: the JSON Schema
//! projection uses it as a memoization key for recursive types.
//!
//! ## Constructors
//!
//! - Atomics: [`boolean`], [`integer`], [`number`], [`string`], [`timestamp`],
//!   or [`atomic`] with explicit constraints
//! - Compounds: [`array`], [`tuple`], [`object`], [`record`], [`optional`],
//!   [`union`], [`intersection`], [`recursive`]
//! - Refinements: [`Type::refined`], [`Type::nominal`], [`literal`], plus the
//!   range/pattern/length conveniences
//! - Closed objects: [`Type::exact`] / [`Type::open`]

use crate::value::Value;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Primitive category an atomic descriptor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Atomic {
    Boolean,
    Integer,
    /// Any numeric value, integer or float.
    Number,
    String,
    Timestamp,
}

impl Atomic {
    /// Bare name, used for codec table lookups and projections.
    pub fn name(&self) -> &'static str {
        match self {
            Atomic::Boolean => "boolean",
            Atomic::Integer => "integer",
            Atomic::Number => "number",
            Atomic::String => "string",
            Atomic::Timestamp => "timestamp",
        }
    }

    /// Diagnostic phrasing ("Expected {}, got ...").
    pub fn expected(&self) -> &'static str {
        match self {
            Atomic::Boolean => "a boolean",
            Atomic::Integer => "an integer",
            Atomic::Number => "a number",
            Atomic::String => "a string",
            Atomic::Timestamp => "a timestamp",
        }
    }

    pub(crate) fn admits(&self, value: &Value) -> bool {
        match self {
            Atomic::Boolean => matches!(value, Value::Bool(_)),
            Atomic::Integer => matches!(value, Value::Int(_)),
            Atomic::Number => matches!(value, Value::Int(_) | Value::Float(_)),
            Atomic::String => matches!(value, Value::String(_)),
            Atomic::Timestamp => matches!(value, Value::Timestamp(_)),
        }
    }
}

/// A post-structural check that may transform or reject a value.
///
/// Returning `Err` rejects; the message becomes a non-deferrable issue at the
/// refined node's path.
#[derive(Clone)]
pub struct Refinement {
    pub(crate) apply: Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>,
}

impl Refinement {
    pub fn new(f: impl Fn(Value) -> Result<Value, String> + Send + Sync + 'static) -> Self {
        Refinement { apply: Arc::new(f) }
    }
}

impl fmt::Debug for Refinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Refinement")
    }
}

/// The descriptor variant set.
pub enum TypeKind {
    Atomic {
        atom: Atomic,
        constraints: Vec<Refinement>,
    },
    Array(Type),
    /// Fixed element list; trailing `Optional` elements relax the arity.
    Tuple(Vec<Type>),
    Object(IndexMap<String, Type>),
    Record {
        key: Type,
        value: Type,
    },
    Optional(Type),
    /// Ordered alternatives, tried in declaration order. At least 2.
    Union(Vec<Type>),
    /// All members must hold; partial results are deep-merged. At least 2.
    Intersection(Vec<Type>),
    /// Forward reference installed by [`recursive`] after construction.
    Recursive(OnceCell<Type>),
    Refined {
        inner: Type,
        steps: Vec<Refinement>,
        /// Optional JSON Schema fragment for the projection.
        schema: Option<serde_json::Value>,
    },
}

/// A node in the schema tree: a cheaply clonable handle onto a shared
/// descriptor, plus this handle's exactness override.
#[derive(Clone)]
pub struct Type {
    kind: Arc<TypeKind>,
    exact: Option<bool>,
}

impl Type {
    fn from_kind(kind: TypeKind) -> Self {
        Type {
            kind: Arc::new(kind),
            exact: None,
        }
    }

    /// The shared descriptor variant behind this handle.
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Identity of the shared descriptor, stable across handle clones.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.kind) as *const () as usize
    }

    pub(crate) fn exact_override(&self) -> Option<bool> {
        self.exact
    }

    /// Close this subtree: objects reject keys not declared by the schema.
    pub fn exact(&self) -> Type {
        Type {
            kind: self.kind.clone(),
            exact: Some(true),
        }
    }

    /// Escape hatch: disable the closed-object check for this subtree, even
    /// under an exact ancestor.
    pub fn open(&self) -> Type {
        Type {
            kind: self.kind.clone(),
            exact: Some(false),
        }
    }

    pub fn optional(&self) -> Type {
        optional(self.clone())
    }

    /// Attach a refinement step, run after structural validation succeeds.
    pub fn refined(
        &self,
        f: impl Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Type {
        Type::from_kind(TypeKind::Refined {
            inner: self.clone(),
            steps: vec![Refinement::new(f)],
            schema: None,
        })
    }

    /// Like [`Type::refined`] with a JSON Schema fragment for the projection.
    pub fn refined_with_schema(
        &self,
        f: impl Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
        schema: serde_json::Value,
    ) -> Type {
        Type::from_kind(TypeKind::Refined {
            inner: self.clone(),
            steps: vec![Refinement::new(f)],
            schema: Some(schema),
        })
    }

    /// Nominal branding: a pass-through refinement that gives this type its
    /// own identity without changing what it accepts.
    pub fn nominal(&self) -> Type {
        self.refined(Ok)
    }

    /// Numeric lower bound (inclusive).
    pub fn min(&self, bound: f64) -> Type {
        self.refined(move |v| match v.as_f64() {
            Some(x) if x >= bound => Ok(v),
            Some(x) => Err(format!("Expected a value >= {bound}, got {x}.")),
            None => Err(format!("Expected a number, got {}.", v.kind_name())),
        })
    }

    /// Numeric upper bound (inclusive).
    pub fn max(&self, bound: f64) -> Type {
        self.refined(move |v| match v.as_f64() {
            Some(x) if x <= bound => Ok(v),
            Some(x) => Err(format!("Expected a value <= {bound}, got {x}.")),
            None => Err(format!("Expected a number, got {}.", v.kind_name())),
        })
    }

    /// String regex constraint. Panics on an invalid pattern: that is a
    /// schema-authoring error.
    pub fn pattern(&self, pattern: &str) -> Type {
        let re = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("invalid pattern {pattern:?}: {e}"));
        let shown = re.as_str().to_string();
        self.refined_with_schema(
            move |v| match &v {
                Value::String(s) if re.is_match(s) => Ok(v),
                Value::String(s) => {
                    Err(format!("Expected a string matching /{}/, got {s:?}.", re.as_str()))
                }
                other => Err(format!("Expected a string, got {}.", other.kind_name())),
            },
            serde_json::json!({ "pattern": shown }),
        )
    }

    /// Minimum length for strings and arrays (inclusive).
    pub fn min_length(&self, n: usize) -> Type {
        self.refined(move |v| match &v {
            Value::String(s) if s.chars().count() >= n => Ok(v),
            Value::Array(items) if items.len() >= n => Ok(v),
            Value::String(_) | Value::Array(_) => {
                Err(format!("Expected a length of at least {n}."))
            }
            other => Err(format!(
                "Expected a string or an array, got {}.",
                other.kind_name()
            )),
        })
    }

    /// Maximum length for strings and arrays (inclusive).
    pub fn max_length(&self, n: usize) -> Type {
        self.refined(move |v| match &v {
            Value::String(s) if s.chars().count() <= n => Ok(v),
            Value::Array(items) if items.len() <= n => Ok(v),
            Value::String(_) | Value::Array(_) => {
                Err(format!("Expected a length of at most {n}."))
            }
            other => Err(format!(
                "Expected a string or an array, got {}.",
                other.kind_name()
            )),
        })
    }

    fn props(&self, operation: &str) -> &IndexMap<String, Type> {
        match self.kind() {
            TypeKind::Object(props) => props,
            _ => panic!("{operation} requires an object descriptor"),
        }
    }

    /// New object descriptor with additional (or overridden) properties.
    pub fn extend<K, I>(&self, extra: I) -> Type
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Type)>,
    {
        let mut props = self.props("extend").clone();
        for (name, ty) in extra {
            props.insert(name.into(), ty);
        }
        Type::from_kind(TypeKind::Object(props))
    }

    /// New object descriptor with every property optional.
    pub fn partial(&self) -> Type {
        let props = self
            .props("partial")
            .iter()
            .map(|(name, ty)| {
                let ty = match ty.kind() {
                    TypeKind::Optional(_) => ty.clone(),
                    _ => ty.optional(),
                };
                (name.clone(), ty)
            })
            .collect();
        Type::from_kind(TypeKind::Object(props))
    }

    /// New object descriptor keeping only the named properties.
    pub fn pick(&self, keys: &[&str]) -> Type {
        let props = self
            .props("pick")
            .iter()
            .filter(|(name, _)| keys.contains(&name.as_str()))
            .map(|(name, ty)| (name.clone(), ty.clone()))
            .collect();
        Type::from_kind(TypeKind::Object(props))
    }

    /// New object descriptor without the named properties.
    pub fn omit(&self, keys: &[&str]) -> Type {
        let props = self
            .props("omit")
            .iter()
            .filter(|(name, _)| !keys.contains(&name.as_str()))
            .map(|(name, ty)| (name.clone(), ty.clone()))
            .collect();
        Type::from_kind(TypeKind::Object(props))
    }

    fn describe(&self) -> String {
        match self.kind() {
            TypeKind::Atomic { atom, .. } => format!("atomic({})", atom.name()),
            TypeKind::Array(_) => "array".to_string(),
            TypeKind::Tuple(elems) => format!("tuple({})", elems.len()),
            TypeKind::Object(props) => format!("object({})", props.len()),
            TypeKind::Record { .. } => "record".to_string(),
            TypeKind::Optional(_) => "optional".to_string(),
            TypeKind::Union(members) => format!("union({})", members.len()),
            TypeKind::Intersection(members) => format!("intersection({})", members.len()),
            TypeKind::Recursive(_) => "recursive".to_string(),
            TypeKind::Refined { .. } => "refined".to_string(),
        }
    }
}

// Shallow on purpose: recursive descriptors are cyclic.
impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.describe())
    }
}

/// An atomic descriptor with explicit value constraints.
pub fn atomic(atom: Atomic, constraints: Vec<Refinement>) -> Type {
    Type::from_kind(TypeKind::Atomic { atom, constraints })
}

pub fn boolean() -> Type {
    atomic(Atomic::Boolean, Vec::new())
}

pub fn integer() -> Type {
    atomic(Atomic::Integer, Vec::new())
}

pub fn number() -> Type {
    atomic(Atomic::Number, Vec::new())
}

pub fn string() -> Type {
    atomic(Atomic::String, Vec::new())
}

pub fn timestamp() -> Type {
    atomic(Atomic::Timestamp, Vec::new())
}

/// One element descriptor applied to every index.
pub fn array(element: Type) -> Type {
    Type::from_kind(TypeKind::Array(element))
}

/// Fixed element list. Trailing `optional` elements widen the accepted arity.
pub fn tuple(elements: Vec<Type>) -> Type {
    Type::from_kind(TypeKind::Tuple(elements))
}

/// A property map. Entries keep their declaration order.
pub fn object<K, I>(properties: I) -> Type
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Type)>,
{
    Type::from_kind(TypeKind::Object(
        properties
            .into_iter()
            .map(|(name, ty)| (name.into(), ty))
            .collect(),
    ))
}

/// Key and value descriptors applied to every entry of a dictionary.
pub fn record(key: Type, value: Type) -> Type {
    Type::from_kind(TypeKind::Record { key, value })
}

/// Treats absence as trivially valid, delegates otherwise.
pub fn optional(inner: Type) -> Type {
    Type::from_kind(TypeKind::Optional(inner))
}

/// Ordered alternatives. Panics with fewer than 2 members.
pub fn union(members: Vec<Type>) -> Type {
    assert!(members.len() >= 2, "union requires at least 2 members");
    Type::from_kind(TypeKind::Union(members))
}

/// Conjunction with deep-merged results. Panics with fewer than 2 members.
pub fn intersection(members: Vec<Type>) -> Type {
    assert!(
        members.len() >= 2,
        "intersection requires at least 2 members"
    );
    Type::from_kind(TypeKind::Intersection(members))
}

/// A self-referential descriptor.
///
/// The builder receives a placeholder that may be embedded anywhere inside
/// the descriptor it returns; the placeholder forwards to the returned
/// descriptor once construction completes.
pub fn recursive(build: impl FnOnce(&Type) -> Type) -> Type {
    let placeholder = Type::from_kind(TypeKind::Recursive(OnceCell::new()));
    let resolved = build(&placeholder);
    match placeholder.kind() {
        TypeKind::Recursive(cell) => {
            if cell.set(resolved.clone()).is_err() {
                panic!("recursive descriptor initialized twice");
            }
        }
        _ => unreachable!(),
    }
    resolved
}

/// Equality against one literal value, over the matching atomic.
///
/// Supported literal kinds: booleans, integers, floats, strings. Anything
/// else panics: that is a schema-authoring error.
pub fn literal(value: impl Into<Value>) -> Type {
    let expected = value.into();
    let atom = match &expected {
        Value::Bool(_) => Atomic::Boolean,
        Value::Int(_) => Atomic::Integer,
        Value::Float(_) => Atomic::Number,
        Value::String(_) => Atomic::String,
        other => panic!("literal does not support {}", other.kind_name()),
    };
    let schema = expected
        .to_json()
        .map(|json| serde_json::json!({ "const": json }))
        .unwrap_or(serde_json::Value::Null);
    atomic(atom, Vec::new()).refined_with_schema(
        move |v| {
            if v == expected {
                Ok(v)
            } else {
                Err(format!("Expected exactly {expected}, got {v}."))
            }
        },
        schema,
    )
}

/// Accepted arity range of a tuple: `(min, max)`, both inclusive. `min` is
/// the index after the last required element.
pub(crate) fn tuple_arity(elements: &[Type]) -> (usize, usize) {
    let min = elements
        .iter()
        .rposition(|ty| !matches!(ty.kind(), TypeKind::Optional(_)))
        .map_or(0, |i| i + 1);
    (min, elements.len())
}
