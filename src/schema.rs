//! Read-only JSON Schema projection of a descriptor tree.
//!
//! Recursive descriptors project through a `$defs` table; the table is keyed
//! by descriptor identity and the exactness in force at the reference site,
//! since the same descriptor projects differently open and closed.

use crate::ty::{tuple_arity, Atomic, Type, TypeKind};
use serde_json::{json, Map, Value as Json};
use std::collections::HashMap;

struct SchemaContext {
    /// (descriptor identity, exact) -> definition name.
    names: HashMap<(usize, bool), String>,
    defs: Map<String, Json>,
}

/// Project a descriptor tree into a JSON Schema document.
pub fn json_schema(ty: &Type) -> Json {
    let mut ctx = SchemaContext {
        names: HashMap::new(),
        defs: Map::new(),
    };
    let body = project(ty, false, &mut ctx);
    if ctx.defs.is_empty() {
        body
    } else {
        let mut doc = Map::new();
        doc.insert("$defs".to_string(), Json::Object(ctx.defs));
        match body {
            Json::Object(map) => doc.extend(map),
            other => {
                doc.insert("allOf".to_string(), json!([other]));
            }
        }
        Json::Object(doc)
    }
}

fn atom_schema(atom: Atomic) -> Json {
    match atom {
        Atomic::Boolean => json!({ "type": "boolean" }),
        Atomic::Integer => json!({ "type": "integer" }),
        Atomic::Number => json!({ "type": "number" }),
        Atomic::String => json!({ "type": "string" }),
        Atomic::Timestamp => json!({ "type": "string", "format": "date-time" }),
    }
}

fn project(ty: &Type, exact: bool, ctx: &mut SchemaContext) -> Json {
    let exact = ty.exact_override().unwrap_or(exact);
    match ty.kind() {
        TypeKind::Atomic { atom, .. } => atom_schema(*atom),
        TypeKind::Array(element) => json!({
            "type": "array",
            "items": project(element, exact, ctx),
        }),
        TypeKind::Tuple(elements) => {
            let (min, max) = tuple_arity(elements);
            json!({
                "type": "array",
                "prefixItems": elements
                    .iter()
                    .map(|e| project(e, exact, ctx))
                    .collect::<Vec<_>>(),
                "minItems": min,
                "maxItems": max,
            })
        }
        TypeKind::Object(props) => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for (name, prop) in props {
                properties.insert(name.clone(), project(prop, exact, ctx));
                if !matches!(prop.kind(), TypeKind::Optional(_)) {
                    required.push(Json::String(name.clone()));
                }
            }
            let mut out = Map::new();
            out.insert("type".to_string(), json!("object"));
            out.insert("properties".to_string(), Json::Object(properties));
            if !required.is_empty() {
                out.insert("required".to_string(), Json::Array(required));
            }
            if exact {
                out.insert("additionalProperties".to_string(), json!(false));
            }
            Json::Object(out)
        }
        TypeKind::Record { key, value } => {
            let mut out = Map::new();
            out.insert("type".to_string(), json!("object"));
            out.insert(
                "additionalProperties".to_string(),
                project(value, exact, ctx),
            );
            // Bare string keys need no propertyNames clause.
            if !matches!(key.kind(), TypeKind::Atomic { atom: Atomic::String, constraints } if constraints.is_empty())
            {
                out.insert("propertyNames".to_string(), project(key, false, ctx));
            }
            Json::Object(out)
        }
        TypeKind::Optional(inner) => project(inner, exact, ctx),
        TypeKind::Union(members) => json!({
            "anyOf": members
                .iter()
                .map(|m| project(m, exact, ctx))
                .collect::<Vec<_>>(),
        }),
        TypeKind::Intersection(members) => json!({
            "allOf": members
                .iter()
                .map(|m| project(m, exact, ctx))
                .collect::<Vec<_>>(),
        }),
        TypeKind::Recursive(cell) => {
            let key = (ty.id(), exact);
            if let Some(name) = ctx.names.get(&key) {
                return json!({ "$ref": format!("#/$defs/{name}") });
            }
            let name = format!("def{}", ctx.names.len());
            ctx.names.insert(key, name.clone());
            let inner = cell
                .get()
                .unwrap_or_else(|| panic!("recursive descriptor used before construction completed"));
            let projected = project(inner, exact, ctx);
            ctx.defs.insert(name.clone(), projected);
            json!({ "$ref": format!("#/$defs/{name}") })
        }
        TypeKind::Refined { inner, schema, .. } => match schema {
            Some(fragment) => json!({
                "allOf": [project(inner, exact, ctx), fragment.clone()],
            }),
            None => project(inner, exact, ctx),
        },
    }
}
