//! The exactness (closed-object) protocol.
//!
//! Detecting unknown keys is non-local: the key set of one logical object may
//! be assembled from several composed descriptors (each branch of an
//! intersection, wrappers around an object). The pieces pool their declared
//! keys into a shared [`ExactContext`]; the node that created the context
//! diffs the input's keys against the pool once its whole subtree has run.
//!
//! Contexts are call-local accumulators: allocated fresh per managing node
//! within one top-level operation, shared by handle with the descriptors that
//! contribute keys to the same logical object, and discarded when that node
//! finishes. They never outlive a call, so descriptor trees stay shareable
//! across threads.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

#[derive(Debug, Default)]
struct ExactState {
    keys: HashSet<String>,
    /// Distinguishes "never registered any keys" from "registered an empty set".
    touched: bool,
    /// A descendant opted out of exactness entirely; key tracking continues
    /// but no unknown-key issue may be reported. Once set, stays set.
    neutralized: bool,
}

/// Shared handle onto one logical object's accumulated key set.
#[derive(Debug, Clone, Default)]
pub struct ExactContext(Rc<RefCell<ExactState>>);

impl ExactContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register keys declared by one contributing descriptor.
    pub fn add_keys<'a>(&self, keys: impl IntoIterator<Item = &'a str>) {
        let mut state = self.0.borrow_mut();
        state.touched = true;
        for key in keys {
            state.keys.insert(key.to_string());
        }
    }

    pub fn neutralize(&self) {
        self.0.borrow_mut().neutralized = true;
    }

    pub fn touched(&self) -> bool {
        self.0.borrow().touched
    }

    pub fn neutralized(&self) -> bool {
        self.0.borrow().neutralized
    }

    /// Merge a speculative branch context into this one (union branch commit).
    pub fn absorb(&self, other: &ExactContext) {
        let other = other.0.borrow();
        let mut state = self.0.borrow_mut();
        state.touched |= other.touched;
        state.neutralized |= other.neutralized;
        for key in &other.keys {
            state.keys.insert(key.clone());
        }
    }

    /// Diff the keys present in the input against the accumulated set.
    ///
    /// Returns `None` when no check applies (nothing registered, or the
    /// context was neutralized); otherwise the unknown keys in input order.
    pub fn unknown_keys<'a>(
        &self,
        present: impl IntoIterator<Item = &'a str>,
    ) -> Option<Vec<String>> {
        let state = self.0.borrow();
        if !state.touched || state.neutralized {
            return None;
        }
        Some(
            present
                .into_iter()
                .filter(|key| !state.keys.contains(*key))
                .map(|key| key.to_string())
                .collect(),
        )
    }
}

/// Exactness as it flows down a traversal.
#[derive(Debug, Clone, Default)]
pub enum Exact {
    /// Not checked.
    #[default]
    Off,
    /// Checked; no shared state yet. The next managing node allocates one.
    On,
    /// Checked, with a shared context already flowing in from an ancestor.
    Ctx(ExactContext),
}

impl Exact {
    pub fn is_on(&self) -> bool {
        !matches!(self, Exact::Off)
    }
}

/// How a composite node participates in the closed-object check.
pub(crate) enum ExactRole {
    /// Owns key collection for one logical object (object, intersection):
    /// creates a context when one is requested but not yet flowing in.
    Managed,
    /// Must propagate the request without owning key collection (union).
    Transparent,
}

pub(crate) struct ResolvedExact {
    /// Context this node registers keys into, if any.
    pub ctx: Option<ExactContext>,
    /// This node created the context and reports unknown keys when done.
    pub owned: bool,
}

/// Resolve a node's participation from the ambient exactness.
///
/// An already-flowing context is reused, never nested: checks compose outward
/// to the ancestor that is actively managing the logical object.
pub(crate) fn resolve_exactness(ambient: &Exact, role: ExactRole) -> ResolvedExact {
    match ambient {
        Exact::Ctx(ctx) => ResolvedExact {
            ctx: Some(ctx.clone()),
            owned: false,
        },
        Exact::On => match role {
            ExactRole::Managed => ResolvedExact {
                ctx: Some(ExactContext::new()),
                owned: true,
            },
            ExactRole::Transparent => ResolvedExact {
                ctx: None,
                owned: false,
            },
        },
        Exact::Off => ResolvedExact {
            ctx: None,
            owned: false,
        },
    }
}
