//! Deep merge of intersection partial results.
//!
//! Each intersection constituent decodes its own partial view of the input;
//! the views are folded left-to-right into one value. Conflicting shapes mean
//! the schema author intersected mutually exclusive types, which is a
//! programmer error, not a data issue.

use crate::value::Value;
use indexmap::IndexMap;

/// Fold constituent partials into one value. Call only when no constituent
/// produced a non-deferrable issue.
pub(crate) fn merge_partials(parts: Vec<Value>) -> Value {
    let mut iter = parts.into_iter();
    let mut acc = match iter.next() {
        Some(first) => first,
        None => return Value::Absent,
    };
    for part in iter {
        acc = merge_pair(acc, part);
    }
    acc
}

fn merge_pair(a: Value, b: Value) -> Value {
    // Equal results need no merging.
    if a == b {
        return a;
    }
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            let mut out: IndexMap<String, Value> = IndexMap::new();
            let mut pending: IndexMap<String, Vec<Value>> = IndexMap::new();
            // Breadth-first pass: copy singles, defer keys present in both.
            let both: Vec<String> = left
                .keys()
                .filter(|k| right.contains_key(k.as_str()))
                .cloned()
                .collect();
            for (k, v) in left {
                if both.contains(&k) {
                    pending.entry(k).or_default().push(v);
                } else {
                    out.insert(k, v);
                }
            }
            for (k, v) in right {
                if let Some(values) = pending.get_mut(&k) {
                    values.push(v);
                } else {
                    out.insert(k, v);
                }
            }
            // Deferred keys merge depth-first after the top-level pass.
            for (k, values) in pending {
                out.insert(k, merge_partials(values));
            }
            Value::Object(out)
        }
        (Value::Array(left), Value::Array(right)) => {
            // Positional merge: keep the union of populated indices.
            let mut out = Vec::with_capacity(left.len().max(right.len()));
            let mut right_iter = right.into_iter();
            for l in left {
                match right_iter.next() {
                    Some(r) => out.push(merge_pair(l, r)),
                    None => out.push(l),
                }
            }
            out.extend(right_iter);
            Value::Array(out)
        }
        (a, b) => panic!(
            "cannot merge intersection results: {} vs {}",
            a.kind_name(),
            b.kind_name()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    #[test]
    fn merge_disjoint_objects() {
        let a = Value::Object(indexmap! {"foo".to_string() => Value::from("x")});
        let b = Value::Object(indexmap! {"bar".to_string() => Value::from(1_i64)});
        let merged = merge_partials(vec![a, b]);
        let map = merged.as_object().expect("object");
        assert_eq!(map.len(), 2);
        assert_eq!(map["foo"], Value::from("x"));
        assert_eq!(map["bar"], Value::from(1_i64));
    }

    #[test]
    fn merge_shared_keys_recursively() {
        let a = Value::Object(indexmap! {
            "nested".to_string() => Value::Object(indexmap! {"x".to_string() => Value::from(1_i64)}),
        });
        let b = Value::Object(indexmap! {
            "nested".to_string() => Value::Object(indexmap! {"y".to_string() => Value::from(2_i64)}),
        });
        let merged = merge_partials(vec![a, b]);
        let nested = merged.as_object().expect("object")["nested"]
            .as_object()
            .expect("nested object");
        assert_eq!(nested.len(), 2);
    }

    #[test]
    fn merge_arrays_positionally() {
        let a = Value::Array(vec![Value::from(1_i64)]);
        let b = Value::Array(vec![Value::from(1_i64), Value::from(2_i64)]);
        let merged = merge_partials(vec![a, b]);
        assert_eq!(
            merged,
            Value::Array(vec![Value::from(1_i64), Value::from(2_i64)])
        );
    }

    #[test]
    fn merge_equal_scalars() {
        assert_eq!(
            merge_partials(vec![Value::from("a"), Value::from("a")]),
            Value::from("a")
        );
    }

    #[test]
    #[should_panic(expected = "cannot merge")]
    fn merge_conflicting_scalars_panics() {
        merge_partials(vec![Value::from("a"), Value::from(1_i64)]);
    }
}
