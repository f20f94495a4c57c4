//! The generic traversal engine shared by every operation.
//!
//! Each descriptor kind implements only its shape recursion here; what
//! happens at atomic leaves (kind check, medium codec) and how refinements
//! run is supplied by the operation through [`Op`]. One recursion therefore
//! serves decode, encode, convert, diagnose, and sanitize.
//!
//! Issues are collected exhaustively across siblings: a failing child never
//! short-circuits its siblings, so one call reports every problem in the
//! value tree. Only the public operations decide whether the accumulated
//! list is fatal.

use crate::exact::{resolve_exactness, Exact, ExactContext, ExactRole, ResolvedExact};
use crate::issue::{has_fatal, Segment, TypeIssue, TypePath};
use crate::merge::merge_partials;
use crate::ty::{tuple_arity, Atomic, Refinement, Type, TypeKind};
use crate::value::Value;
use indexmap::IndexMap;

/// How a refined node treats its refinement steps.
pub(crate) enum RefineMode {
    /// Run steps on the inner traversal's output (decode, convert, diagnose,
    /// sanitize).
    Forward,
    /// Re-run steps on the incoming value as a stability check (encode): an
    /// already-refined value must survive its refinements unchanged.
    Stability,
}

/// What a missing key or index presents to its descriptor.
static ABSENT: Value = Value::Absent;

/// One operation's contribution to the traversal.
pub(crate) trait Op {
    /// Process an atomic leaf.
    fn atom(
        &mut self,
        atom: Atomic,
        constraints: &[Refinement],
        input: &Value,
        path: &TypePath,
    ) -> (Value, Vec<TypeIssue>);

    fn refine_mode(&self) -> RefineMode {
        RefineMode::Forward
    }

    /// Lenient composites drop failing properties/elements/entries instead of
    /// failing the whole node (sanitize).
    fn lenient(&self) -> bool {
        false
    }
}

/// Atomic kind check plus constraint evaluation, shared by the operations.
pub(crate) fn check_atom(
    atom: Atomic,
    constraints: &[Refinement],
    value: &Value,
    path: &TypePath,
) -> Vec<TypeIssue> {
    if !atom.admits(value) {
        return vec![TypeIssue::new(
            path.clone(),
            format!("Expected {}, got {}.", atom.expected(), value.kind_name()),
        )];
    }
    let mut issues = Vec::new();
    for constraint in constraints {
        if let Err(message) = (constraint.apply)(value.clone()) {
            issues.push(TypeIssue::new(path.clone(), message));
        }
    }
    issues
}

/// Diagnose-only consumer used for record keys: keys are checked in place,
/// never transcoded.
struct KeyProbe;

impl Op for KeyProbe {
    fn atom(
        &mut self,
        atom: Atomic,
        constraints: &[Refinement],
        input: &Value,
        path: &TypePath,
    ) -> (Value, Vec<TypeIssue>) {
        (input.clone(), check_atom(atom, constraints, input, path))
    }
}

fn unknown_keys_message(keys: &[String]) -> String {
    let listed = keys
        .iter()
        .map(|k| format!("{k:?}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Unknown key(s) {listed}.")
}

/// Exactness passed to descriptors of nested logical objects: the flag flows
/// down the whole subtree, but a shared context never crosses into a new
/// logical object.
fn flow(exact: &Exact) -> Exact {
    if exact.is_on() {
        Exact::On
    } else {
        Exact::Off
    }
}

/// Walk one descriptor over one input value.
pub(crate) fn walk(
    ty: &Type,
    input: &Value,
    path: &TypePath,
    exact: &Exact,
    op: &mut dyn Op,
) -> (Value, Vec<TypeIssue>) {
    // Per-node exactness override: `.open()` disables the check for the
    // whole subtree and tells any ancestor context to stand down; `.exact()`
    // turns the check on from here down.
    let effective;
    let exact = match ty.exact_override() {
        Some(false) => {
            if let Exact::Ctx(ctx) = exact {
                ctx.neutralize();
            }
            effective = Exact::Off;
            &effective
        }
        Some(true) if !exact.is_on() => {
            effective = Exact::On;
            &effective
        }
        _ => exact,
    };

    match ty.kind() {
        TypeKind::Atomic { atom, constraints } => op.atom(*atom, constraints, input, path),

        TypeKind::Optional(inner) => {
            if input.is_absent() {
                (Value::Absent, Vec::new())
            } else {
                walk(inner, input, path, exact, op)
            }
        }

        TypeKind::Recursive(cell) => {
            let inner = cell
                .get()
                .unwrap_or_else(|| panic!("recursive descriptor used before construction completed"));
            walk(inner, input, path, exact, op)
        }

        TypeKind::Refined { inner, steps, .. } => walk_refined(inner, steps, input, path, exact, op),

        TypeKind::Array(element) => {
            let Value::Array(items) = input else {
                return (
                    input.clone(),
                    vec![TypeIssue::new(
                        path.clone(),
                        format!("Expected an array, got {}.", input.kind_name()),
                    )],
                );
            };
            let child_exact = flow(exact);
            let mut out = Vec::with_capacity(items.len());
            let mut issues = Vec::new();
            for (i, item) in items.iter().enumerate() {
                let child_path = path.child(Segment::Index(i));
                let (o, is) = walk(element, item, &child_path, &child_exact, op);
                if op.lenient() && has_fatal(&is) {
                    issues.extend(is);
                    continue;
                }
                issues.extend(is);
                out.push(o);
            }
            (Value::Array(out), issues)
        }

        TypeKind::Tuple(elements) => {
            let (min, max) = tuple_arity(elements);
            let arity = if min == max {
                format!("{max} element(s)")
            } else {
                format!("{min} to {max} elements")
            };
            let Value::Array(items) = input else {
                return (
                    input.clone(),
                    vec![TypeIssue::new(
                        path.clone(),
                        format!("Expected a tuple of {arity}, got {}.", input.kind_name()),
                    )],
                );
            };
            if items.len() < min || items.len() > max {
                // Arity violations are one issue at this node, not per-element.
                return (
                    input.clone(),
                    vec![TypeIssue::new(
                        path.clone(),
                        format!("Expected a tuple of {arity}, got {} element(s).", items.len()),
                    )],
                );
            }
            let child_exact = flow(exact);
            let mut out = Vec::with_capacity(items.len());
            let mut issues = Vec::new();
            for (i, element) in elements.iter().enumerate() {
                let child_path = path.child(Segment::Index(i));
                let item = items.get(i).unwrap_or(&ABSENT);
                let (o, is) = walk(element, item, &child_path, &child_exact, op);
                issues.extend(is);
                if i < items.len() {
                    out.push(o);
                }
            }
            (Value::Array(out), issues)
        }

        TypeKind::Object(props) => {
            let Value::Object(map) = input else {
                return (
                    input.clone(),
                    vec![TypeIssue::new(
                        path.clone(),
                        format!("Expected an object, got {}.", input.kind_name()),
                    )],
                );
            };
            let resolved = resolve_exactness(exact, ExactRole::Managed);
            // Declared keys register before any unknown-key diffing at this
            // level.
            if let Some(ctx) = &resolved.ctx {
                ctx.add_keys(props.keys().map(String::as_str));
            }
            let child_exact = flow(exact);
            let mut out: IndexMap<String, Value> = IndexMap::with_capacity(props.len());
            let mut issues = Vec::new();
            for (name, prop_ty) in props {
                let child_path = path.child(Segment::Key(name.clone()));
                let value = map.get(name).unwrap_or(&ABSENT);
                let (o, is) = walk(prop_ty, value, &child_path, &child_exact, op);
                if op.lenient() && has_fatal(&is) {
                    issues.extend(is);
                    continue;
                }
                issues.extend(is);
                if !o.is_absent() {
                    out.insert(name.clone(), o);
                }
            }
            if resolved.owned {
                push_unknown_keys(&resolved, map, path, &mut issues);
            }
            (Value::Object(out), issues)
        }

        TypeKind::Record { key, value } => {
            let Value::Object(map) = input else {
                return (
                    input.clone(),
                    vec![TypeIssue::new(
                        path.clone(),
                        format!("Expected an object, got {}.", input.kind_name()),
                    )],
                );
            };
            // Unknown keys are the point of a record: any ancestor's
            // closed-object check must not fire from inside one.
            if let Exact::Ctx(ctx) = exact {
                ctx.neutralize();
            }
            let child_exact = flow(exact);
            let mut out: IndexMap<String, Value> = IndexMap::with_capacity(map.len());
            let mut issues = Vec::new();
            for (k, v) in map {
                let key_path = path.child(Segment::KeyOf(k.clone()));
                let (_, key_issues) = walk(
                    key,
                    &Value::String(k.clone()),
                    &key_path,
                    &Exact::Off,
                    &mut KeyProbe,
                );
                let value_path = path.child(Segment::Key(k.clone()));
                let (o, value_issues) = walk(value, v, &value_path, &child_exact, op);
                if op.lenient() && (has_fatal(&key_issues) || has_fatal(&value_issues)) {
                    issues.extend(key_issues);
                    issues.extend(value_issues);
                    continue;
                }
                issues.extend(key_issues);
                issues.extend(value_issues);
                out.insert(k.clone(), o);
            }
            (Value::Object(out), issues)
        }

        TypeKind::Union(members) => {
            let mut best: Option<(usize, Vec<TypeIssue>)> = None;
            for member in members {
                // Speculative branch context: a failing branch's key
                // observations must never leak into the parent.
                let branch_exact = match exact {
                    Exact::Ctx(_) => Exact::Ctx(ExactContext::new()),
                    other => flow(other),
                };
                let (o, is) = walk(member, input, path, &branch_exact, op);
                if !has_fatal(&is) {
                    if let (Exact::Ctx(shared), Exact::Ctx(branch)) = (exact, &branch_exact) {
                        if branch.touched() || branch.neutralized() {
                            shared.absorb(branch);
                        }
                    }
                    return (o, is);
                }
                let depth = is.iter().map(|issue| issue.path.len()).max().unwrap_or(0);
                // Deepest failure wins, first encountered on ties: a
                // heuristic for the branch the caller most likely intended.
                if best.as_ref().map_or(true, |(d, _)| depth > *d) {
                    best = Some((depth, is));
                }
            }
            let mut issues = vec![TypeIssue::new(
                path.clone(),
                "Value satisfies none of the union members.",
            )];
            if let Some((_, branch_issues)) = best {
                issues.extend(branch_issues);
            }
            (input.clone(), issues)
        }

        TypeKind::Intersection(members) => {
            let resolved = resolve_exactness(exact, ExactRole::Managed);
            // Every constituent pools keys into the same context, so the
            // permitted set is complete before the diff runs.
            let child_exact = match &resolved.ctx {
                Some(ctx) => Exact::Ctx(ctx.clone()),
                None => Exact::Off,
            };
            let mut outs = Vec::with_capacity(members.len());
            let mut issues = Vec::new();
            for member in members {
                let (o, is) = walk(member, input, path, &child_exact, op);
                issues.extend(is);
                outs.push(o);
            }
            let out = if has_fatal(&issues) {
                input.clone()
            } else {
                merge_partials(outs)
            };
            if resolved.owned {
                if let Value::Object(map) = input {
                    push_unknown_keys(&resolved, map, path, &mut issues);
                }
            }
            (out, issues)
        }
    }
}

fn push_unknown_keys(
    resolved: &ResolvedExact,
    map: &IndexMap<String, Value>,
    path: &TypePath,
    issues: &mut Vec<TypeIssue>,
) {
    if let Some(ctx) = &resolved.ctx {
        if let Some(unknown) = ctx.unknown_keys(map.keys().map(String::as_str)) {
            if !unknown.is_empty() {
                issues.push(TypeIssue::deferred(
                    path.clone(),
                    unknown_keys_message(&unknown),
                ));
            }
        }
    }
}

fn walk_refined(
    inner: &Type,
    steps: &[Refinement],
    input: &Value,
    path: &TypePath,
    exact: &Exact,
    op: &mut dyn Op,
) -> (Value, Vec<TypeIssue>) {
    match op.refine_mode() {
        RefineMode::Forward => {
            let (out, mut issues) = walk(inner, input, path, exact, op);
            if has_fatal(&issues) {
                return (out, issues);
            }
            let mut current = out;
            for step in steps {
                match (step.apply)(current.clone()) {
                    Ok(next) => current = next,
                    Err(message) => {
                        issues.push(TypeIssue::new(path.clone(), message));
                        return (current, issues);
                    }
                }
            }
            (current, issues)
        }
        RefineMode::Stability => {
            let (out, mut issues) = walk(inner, input, path, exact, op);
            if has_fatal(&issues) {
                return (out, issues);
            }
            // The incoming value was refined when it was decoded; if the
            // refinements now reject it or change it, encoding it would not
            // round-trip.
            let mut current = input.clone();
            let mut rejected = false;
            for step in steps {
                match (step.apply)(current.clone()) {
                    Ok(next) => current = next,
                    Err(message) => {
                        issues.push(TypeIssue::new(
                            path.clone(),
                            format!("Value is unstable under refinement when encoded: {message}"),
                        ));
                        rejected = true;
                        break;
                    }
                }
            }
            if !rejected && current != *input {
                issues.push(TypeIssue::new(
                    path.clone(),
                    "Value is unstable under refinement when encoded.",
                ));
            }
            (out, issues)
        }
    }
}
